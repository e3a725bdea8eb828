mod buffer;
mod config;
mod models;
mod net;
mod reporter;
mod sds011;
mod sensor;

use log::{error, info};

use config::AgentConfig;
use net::link::{LinkManager, TcpProbeLink};
use net::mqtt::MqttTransport;
use net::retry::RetryPolicy;
use net::session::SessionManager;
use reporter::Reporter;
use sensor::IioAmbientSensor;

async fn run_agent(config: AgentConfig) -> Result<(), Box<dyn std::error::Error>> {
    info!("Starting air quality telemetry agent '{}'", config.device_id);

    let policy = RetryPolicy::unbounded(config.retry_backoff);

    // Smoothing buffers, one per particulate channel
    let pm25 = buffer::shared(config.pm_buffer_capacity)?;
    let pm10 = buffer::shared(config.pm_buffer_capacity)?;

    // Serial reader thread plus the async sampler feeding the buffers
    let runs = sds011::serial::spawn_reader(&config.serial_port)?;
    tokio::spawn(sds011::sampler::run(runs, pm25.clone(), pm10.clone()));

    // Bring the network link up; blocks until it succeeds
    let broker_addr = format!("{}:{}", config.mqtt_host, config.mqtt_port);
    let mut link = LinkManager::new(
        TcpProbeLink::new(broker_addr),
        policy,
        config.connect_timeout,
    );
    link.connect().await?;

    // Open the telemetry session, then watch for disconnects on a
    // dedicated task
    let (transport, status_rx) = MqttTransport::new(&config);
    let session = SessionManager::new(transport, policy);
    session.open().await?;
    {
        let session = session.clone();
        tokio::spawn(async move { session.run_reconnect(status_rx).await });
    }

    let sensor = IioAmbientSensor::new(&config.iio_device_dir);
    let reporter = Reporter::new(sensor, session, pm25, pm10, config.report_interval);
    reporter.run().await;

    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .format_timestamp_secs()
        .init();

    // Load configuration
    let config = match AgentConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            return Err(e.into());
        }
    };

    // Handle Ctrl+C gracefully
    let (tx, mut rx) = tokio::sync::oneshot::channel();
    tokio::spawn(async move {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to listen for Ctrl+C");
        let _ = tx.send(());
    });

    // Run the agent or wait for shutdown signal
    tokio::select! {
        result = run_agent(config) => {
            match result {
                Ok(_) => info!("Agent completed successfully"),
                Err(e) => error!("Fatal error: {}", e),
            }
        }
        _ = &mut rx => {
            info!("Agent terminated by user. Exiting gracefully.");
        }
    }

    Ok(())
}
