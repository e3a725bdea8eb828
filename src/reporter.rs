/// Periodic reporting loop: sample, average, assemble, publish
use std::time::Duration;

use log::{info, warn};
use thiserror::Error;
use tokio::time::interval;

use crate::buffer::SharedBuffer;
use crate::models::TelemetryReport;
use crate::net::session::{SessionError, SessionManager, TelemetryTransport};
use crate::sensor::{AmbientSensor, SensorError};

#[derive(Debug, Error)]
enum CycleError {
    #[error("ambient sensor read failed: {0}")]
    Sensor(#[from] SensorError),
    #[error("report not delivered: {0}")]
    Session(#[from] SessionError),
}

/// The agent's orchestrator: one report per period, for the lifetime of
/// the process.
pub struct Reporter<S, T> {
    sensor: S,
    session: SessionManager<T>,
    pm25: SharedBuffer,
    pm10: SharedBuffer,
    period: Duration,
}

impl<S: AmbientSensor, T: TelemetryTransport> Reporter<S, T> {
    pub fn new(
        sensor: S,
        session: SessionManager<T>,
        pm25: SharedBuffer,
        pm10: SharedBuffer,
        period: Duration,
    ) -> Self {
        Reporter {
            sensor,
            session,
            pm25,
            pm10,
            period,
        }
    }

    /// Runs until the process shuts down. A failed cycle is logged and
    /// absorbed; the next tick starts from scratch.
    pub async fn run(&self) {
        info!(
            "Starting telemetry reporting every {} seconds",
            self.period.as_secs()
        );
        let mut ticker = interval(self.period);

        loop {
            ticker.tick().await;

            match self.cycle().await {
                Ok(report) => {
                    info!(
                        "Report published: {:.2}°C, {:.2}%, {:.2} hPa, PM10 {:.1} µg/m³, PM2.5 {:.1} µg/m³",
                        report.temperature,
                        report.humidity,
                        report.pressure,
                        report.pm10,
                        report.pm25
                    );
                }
                Err(e) => warn!("Report cycle skipped: {}", e),
            }
        }
    }

    /// One reporting cycle: fresh ambient reading, current smoothed
    /// particulate averages, one publish. No intra-cycle retry anywhere.
    async fn cycle(&self) -> Result<TelemetryReport, CycleError> {
        let ambient = self.sensor.read()?;

        let pm25 = self.pm25.lock().await.average();
        let pm10 = self.pm10.lock().await.average();

        let report = TelemetryReport {
            temperature: ambient.temperature,
            humidity: ambient.humidity,
            pressure: ambient.pressure,
            pm10,
            pm25,
        };

        self.session.publish(&report).await?;
        Ok(report)
    }
}
