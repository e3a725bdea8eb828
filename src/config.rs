use std::env;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} environment variable not set")]
    Missing(&'static str),
    #[error("{key} has invalid value {value:?}")]
    Invalid { key: &'static str, value: String },
}

/// Agent configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct AgentConfig {
    pub mqtt_host: String,
    pub mqtt_port: u16,
    pub device_id: String,
    pub telemetry_topic: String,
    pub serial_port: String,
    pub iio_device_dir: String,
    pub report_interval: Duration,
    pub retry_backoff: Duration,
    pub connect_timeout: Duration,
    pub pm_buffer_capacity: usize,
}

impl AgentConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load environment variables
        dotenv::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mqtt_host = lookup("MQTT_HOST").ok_or(ConfigError::Missing("MQTT_HOST"))?;
        let device_id = lookup("DEVICE_ID").ok_or(ConfigError::Missing("DEVICE_ID"))?;

        let telemetry_topic = lookup("TELEMETRY_TOPIC")
            .unwrap_or_else(|| format!("telemetry/{}", device_id));
        let serial_port =
            lookup("SDS011_PORT").unwrap_or_else(|| "/dev/ttyUSB0".to_string());
        let iio_device_dir = lookup("BME280_IIO_DIR")
            .unwrap_or_else(|| "/sys/bus/iio/devices/iio:device0".to_string());

        Ok(AgentConfig {
            mqtt_host,
            mqtt_port: parse_or(&lookup, "MQTT_PORT", 1883)?,
            device_id,
            telemetry_topic,
            serial_port,
            iio_device_dir,
            report_interval: Duration::from_secs(parse_or(&lookup, "REPORT_INTERVAL_SECS", 30)?),
            retry_backoff: Duration::from_secs(parse_or(&lookup, "RETRY_BACKOFF_SECS", 10)?),
            connect_timeout: Duration::from_secs(parse_or(&lookup, "CONNECT_TIMEOUT_SECS", 60)?),
            pm_buffer_capacity: parse_or(&lookup, "PM_BUFFER_CAPACITY", 20)?,
        })
    }
}

/// Parses an optional variable, falling back to `default` when unset.
/// A present but malformed value is a configuration error, not a default.
fn parse_or<T: FromStr>(
    lookup: impl Fn(&str) -> Option<String>,
    key: &'static str,
    default: T,
) -> Result<T, ConfigError> {
    match lookup(key) {
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { key, value }),
        None => Ok(default),
    }
}
