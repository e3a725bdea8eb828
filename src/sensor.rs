/// Ambient-condition sensing (temperature, humidity, pressure)
use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::models::AmbientSample;

#[derive(Debug, Error)]
pub enum SensorError {
    #[error("failed to read sensor channel {channel}: {source}")]
    Read {
        channel: &'static str,
        #[source]
        source: io::Error,
    },
    #[error("sensor channel {channel} returned unparsable value {value:?}")]
    Parse { channel: &'static str, value: String },
}

/// One-shot ambient reading capability.
///
/// A read either yields a full sample or fails transiently; the reporting
/// loop abandons the cycle on failure and tries again next period.
pub trait AmbientSensor: Send + Sync {
    fn read(&self) -> Result<AmbientSample, SensorError>;
}

/// BME280-class sensor exposed through the Linux kernel IIO sysfs interface.
///
/// Per the IIO ABI the channels report scaled integers/decimals:
/// `in_temp_input` in milli-°C, `in_humidityrelative_input` in milli-%,
/// `in_pressure_input` in kPa.
pub struct IioAmbientSensor {
    device_dir: PathBuf,
}

impl IioAmbientSensor {
    pub fn new(device_dir: impl Into<PathBuf>) -> Self {
        IioAmbientSensor {
            device_dir: device_dir.into(),
        }
    }

    fn read_channel(&self, channel: &'static str) -> Result<f64, SensorError> {
        let raw = std::fs::read_to_string(self.device_dir.join(channel))
            .map_err(|source| SensorError::Read { channel, source })?;

        raw.trim().parse().map_err(|_| SensorError::Parse {
            channel,
            value: raw.trim().to_string(),
        })
    }
}

impl AmbientSensor for IioAmbientSensor {
    fn read(&self) -> Result<AmbientSample, SensorError> {
        let temperature = self.read_channel("in_temp_input")? / 1000.0;
        let humidity = self.read_channel("in_humidityrelative_input")? / 1000.0;
        let pressure = self.read_channel("in_pressure_input")? * 10.0; // kPa -> hPa

        Ok(AmbientSample {
            temperature,
            humidity,
            pressure,
        })
    }
}
