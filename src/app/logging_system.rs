use super::config::LogLevel;
use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Once};
use thiserror::Error;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Error, Debug)]
pub enum LoggingError {
    #[error("Invalid log filter '{filter}': {details}")]
    InvalidFilter { filter: String, details: String },
    #[error("Failed to install tracing subscriber: {0}")]
    InstallFailed(String),
    #[error("Logging was already initialized by an earlier call that failed")]
    PreviouslyFailed,
}

/// Per-target level overrides layered under the base level.
pub struct LoggingSystem {
    directives: Arc<RwLock<Vec<(String, LogLevel)>>>,
    json: bool,
}

impl LoggingSystem {
    pub fn new() -> Self {
        Self {
            directives: Arc::new(RwLock::new(Vec::new())),
            json: false,
        }
    }

    pub fn with_json(mut self, json: bool) -> Self {
        self.json = json;
        self
    }

    pub fn add_directive(&self, target: impl Into<String>, level: LogLevel) {
        self.directives.write().push((target.into(), level));
    }

    /// HTTP stack internals are only interesting when they fail.
    pub fn add_default_directives(&self) {
        for target in ["hyper", "hyper_util", "reqwest", "h2", "rustls"] {
            self.add_directive(target, LogLevel::Warn);
        }
    }

    pub fn build_filter_string(&self, default_level: LogLevel) -> String {
        let mut parts = vec![level_str(default_level).to_string()];
        parts.extend(
            self.directives
                .read()
                .iter()
                .map(|(target, level)| format!("{}={}", target, level_str(*level))),
        );
        parts.join(",")
    }

    pub fn directive_count(&self) -> usize {
        self.directives.read().len()
    }

    /// Installs the global subscriber. `RUST_LOG`, when set, replaces the
    /// configured filter.
    pub fn initialize_tracing(&self, default_level: LogLevel) -> Result<(), LoggingError> {
        let filter_string = match std::env::var("RUST_LOG") {
            Ok(env) if !env.trim().is_empty() => env,
            _ => self.build_filter_string(default_level),
        };
        let env_filter =
            EnvFilter::try_new(&filter_string).map_err(|e| LoggingError::InvalidFilter {
                filter: filter_string.clone(),
                details: e.to_string(),
            })?;

        let registry = tracing_subscriber::registry().with(env_filter);
        let result = if self.json {
            registry
                .with(fmt::layer().json().with_target(true).with_current_span(false))
                .try_init()
        } else {
            registry
                .with(fmt::layer().with_target(true).with_level(true).compact())
                .try_init()
        };

        result.map_err(|e| LoggingError::InstallFailed(e.to_string()))
    }
}

impl Default for LoggingSystem {
    fn default() -> Self {
        Self::new()
    }
}

fn level_str(level: LogLevel) -> &'static str {
    match level {
        LogLevel::Error => "error",
        LogLevel::Warn => "warn",
        LogLevel::Info => "info",
        LogLevel::Debug => "debug",
        LogLevel::Trace => "trace",
    }
}

/// Initializes logging once per process; later calls report the first result.
pub fn setup_logging_safe(level: LogLevel, json: bool) -> Result<(), LoggingError> {
    static INIT: Once = Once::new();
    static INIT_OK: AtomicBool = AtomicBool::new(false);

    INIT.call_once(|| {
        let logging = LoggingSystem::new().with_json(json);
        logging.add_default_directives();
        match logging.initialize_tracing(level) {
            Ok(()) => INIT_OK.store(true, Ordering::Release),
            Err(e) => eprintln!("Failed to initialize logging: {e}"),
        }
    });

    if INIT_OK.load(Ordering::Acquire) {
        Ok(())
    } else {
        Err(LoggingError::PreviouslyFailed)
    }
}
