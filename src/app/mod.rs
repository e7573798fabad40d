pub mod config;
pub mod ingest;
pub mod logging_system;
pub mod service;
pub mod shutdown;

pub use config::{BindingFilter, Config, ConfigError, ForwarderConfig, LogLevel};
pub use ingest::{IngestSummary, ingest, spawn_reader};
pub use logging_system::{LoggingError, LoggingSystem, setup_logging_safe};
pub use service::{Forwarder, ServiceError, SubmitHandle, SubmitOutcome};

use crate::sender::DeliveryStats;
use std::process;
use tracing::{error, info, warn};

pub struct App {
    config: Config,
    forwarder: Forwarder,
}

impl App {
    pub async fn from_args<I, T>(args: I) -> Result<Self, Box<dyn std::error::Error + Send + Sync>>
    where
        I: IntoIterator<Item = T>,
        T: Into<std::ffi::OsString> + Clone,
    {
        let config = Config::from_args(args)?;
        Self::from_config(config).await
    }

    pub async fn from_config(
        config: Config,
    ) -> Result<Self, Box<dyn std::error::Error + Send + Sync>> {
        setup_logging_safe(config.log_level, config.log_json)?;
        info!("Starting wx-influx-forwarder v{}", env!("CARGO_PKG_VERSION"));
        if let Some(path) = &config.config_file {
            info!("Configuration loaded from {}", path.display());
        }

        let forwarder = Forwarder::start(config.to_forwarder_config()?).await?;
        Ok(Self { config, forwarder })
    }

    pub fn forwarder(&self) -> &Forwarder {
        &self.forwarder
    }

    /// Feeds records from the configured input until EOF or a termination
    /// signal, then shuts the forwarder down.
    pub async fn run(self) -> anyhow::Result<DeliveryStats> {
        let token = self.forwarder.shutdown_token();
        let signals = shutdown::spawn_signal_listener(token.clone());
        let reader = spawn_reader(
            self.config.input.clone(),
            self.config.input_binding,
            self.forwarder.handle(),
            token.clone(),
        )?;

        info!("wx-influx-forwarder is running. Press Ctrl+C to stop.");
        tokio::select! {
            result = reader => match result {
                Ok(Ok(summary)) => info!(
                    lines = summary.lines,
                    enqueued = summary.enqueued,
                    invalid = summary.invalid,
                    empty = summary.empty,
                    rejected = summary.rejected,
                    "Input exhausted"
                ),
                Ok(Err(e)) => error!("Failed to read input: {}", e),
                Err(_) => warn!("Input reader stopped without a result"),
            },
            _ = token.cancelled() => {}
        }

        let stats = self.forwarder.shutdown().await?;
        signals.abort();
        info!(
            acked = stats.payloads_acked,
            dropped = stats.payloads_dropped,
            discarded = stats.discarded_at_shutdown,
            "wx-influx-forwarder stopped."
        );
        Ok(stats)
    }
}

pub async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let app = match App::from_args(std::env::args_os()).await {
        Ok(app) => app,
        Err(e) => {
            // Logging may not be up yet.
            eprintln!("Configuration error: {e}");
            process::exit(1);
        }
    };

    if let Err(e) = app.run().await {
        error!("Application error: {:#}", e);
        process::exit(1);
    }

    Ok(())
}
