use super::groups::BindingFilter;
use super::{ConfigError, LogLevel};
use crate::buffer::OverflowPolicy;
use crate::domain::Binding;
use crate::protocol::LineFormat;
use crate::reliability::{RetryStrategy, ShutdownPolicy};
use crate::sender::AuthMode;
use crate::transform::{ObsToUpload, ObservationSpec};
use crate::units::UnitSystem;
use clap::parser::ValueSource;
use clap::{ArgAction, ArgMatches, CommandFactory, FromArgMatches, Parser};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

#[derive(Parser, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[command(author, version, about = "Forwards weather records to InfluxDB", long_about = None)]
#[serde(default)]
pub struct Config {
    /// Full server URL, e.g. https://influx.example.com:8086 (conflicts with --host)
    #[arg(long, env = "INFLUX_SERVER_URL")]
    pub server_url: Option<String>,

    /// Server hostname, combined with --port into http://host:port
    #[arg(long, env = "INFLUX_HOST")]
    pub host: Option<String>,

    /// Server port, used with --host
    #[arg(long, env = "INFLUX_PORT", default_value = "8086")]
    pub port: u16,

    /// Target database
    #[arg(long, env = "INFLUX_DATABASE")]
    pub database: Option<String>,

    #[arg(long, env = "INFLUX_USERNAME")]
    pub username: Option<String>,

    #[arg(long, env = "INFLUX_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,

    /// Username for CREATE DATABASE; falls back to --username
    #[arg(long, env = "INFLUX_DBADMIN_USERNAME")]
    pub dbadmin_username: Option<String>,

    #[arg(long, env = "INFLUX_DBADMIN_PASSWORD", hide_env_values = true)]
    pub dbadmin_password: Option<String>,

    /// How credentials are sent
    #[arg(long, env = "INFLUX_AUTH_MODE", default_value = "basic")]
    pub auth_mode: AuthMode,

    /// Retention policy added to writes as rp=
    #[arg(long, env = "INFLUX_RETENTION_POLICY")]
    pub retention_policy: Option<String>,

    /// Issue CREATE DATABASE at startup
    #[arg(long, env = "CREATE_DATABASE", default_value_t = true, action = ArgAction::Set)]
    pub create_database: bool,

    /// Measurement name for single-line and dotted formats
    #[arg(long, env = "MEASUREMENT", default_value = "record")]
    pub measurement: String,

    /// Static tags, e.g. station=A,field=C
    #[arg(long, env = "TAGS")]
    pub tags: Option<String>,

    #[arg(long, env = "LINE_FORMAT", default_value = "single-line")]
    pub line_format: LineFormat,

    /// Which observations to upload
    #[arg(long, env = "OBS_TO_UPLOAD", default_value = "all")]
    pub obs_to_upload: ObsToUpload,

    /// Suffix field names with a unit label such as _F
    #[arg(long, env = "APPEND_UNITS_LABEL", default_value_t = true, action = ArgAction::Set)]
    pub append_units_label: bool,

    /// Convert records to this unit system before uploading
    #[arg(long, env = "UNIT_SYSTEM")]
    pub unit_system: Option<UnitSystem>,

    /// Derive dewpoint, windchill and heatindex when missing
    #[arg(long, env = "AUGMENT_RECORD")]
    pub augment_record: bool,

    /// Bindings to forward
    #[arg(long, env = "BINDING", default_value = "archive")]
    pub binding: BindingFilter,

    /// Maximum number of payloads waiting for delivery
    #[arg(long, env = "QUEUE_CAPACITY", default_value = "10")]
    pub queue_capacity: usize,

    #[arg(long, env = "OVERFLOW_POLICY", default_value = "reject")]
    pub overflow_policy: OverflowPolicy,

    /// Payloads coalesced into one request at most
    #[arg(long, env = "BATCH_MAX_ITEMS", default_value = "10")]
    pub batch_max_items: usize,

    /// Time to wait for more payloads before sending, in milliseconds
    #[arg(long, env = "BATCH_MAX_WAIT_MS", default_value = "100")]
    pub batch_max_wait_ms: u64,

    /// Retries per batch after the first attempt
    #[arg(long, env = "MAX_RETRIES", default_value = "3")]
    pub max_retries: u32,

    #[arg(long, env = "RETRY_BASE_DELAY_MS", default_value = "500")]
    pub retry_base_delay_ms: u64,

    #[arg(long, env = "RETRY_MAX_DELAY_MS", default_value = "60000")]
    pub retry_max_delay_ms: u64,

    #[arg(long, env = "RETRY_STRATEGY", default_value = "exponential")]
    pub retry_strategy: RetryStrategy,

    #[arg(long, env = "RETRY_JITTER", default_value_t = true, action = ArgAction::Set)]
    pub retry_jitter: bool,

    /// Per-request timeout in seconds
    #[arg(long, env = "TIMEOUT_SECS", default_value = "30")]
    pub timeout_secs: u64,

    #[arg(long, env = "CONNECT_TIMEOUT_SECS", default_value = "10")]
    pub connect_timeout_secs: u64,

    /// Upper bound for CREATE DATABASE at startup, in seconds
    #[arg(long, env = "PROVISION_TIMEOUT_SECS", default_value = "10")]
    pub provision_timeout_secs: u64,

    /// Gzip request bodies
    #[arg(long, env = "ENABLE_COMPRESSION")]
    pub compression: bool,

    /// Build and log payloads without sending them
    #[arg(long, env = "SKIP_UPLOAD")]
    pub skip_upload: bool,

    #[arg(long, env = "SHUTDOWN_POLICY", default_value = "drain")]
    pub shutdown_policy: ShutdownPolicy,

    /// Time allowed for draining the queue at shutdown, in milliseconds
    #[arg(long, env = "SHUTDOWN_DEADLINE_MS", default_value = "4000")]
    pub shutdown_deadline_ms: u64,

    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: LogLevel,

    /// Emit logs as JSON
    #[arg(long, env = "LOG_JSON")]
    pub log_json: bool,

    /// TOML configuration file; values given on the command line or in the
    /// environment take precedence over it
    #[arg(long, env = "CONFIG_FILE")]
    pub config_file: Option<PathBuf>,

    /// Newline-delimited JSON records to forward (stdin when absent)
    #[arg(long, env = "INPUT")]
    pub input: Option<PathBuf>,

    /// Binding assigned to records read from the input
    #[arg(long, env = "INPUT_BINDING", default_value = "archive")]
    pub input_binding: Binding,

    /// Per-observation overrides (`[inputs.<name>]`, file only)
    #[arg(skip)]
    pub inputs: BTreeMap<String, ObservationSpec>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_url: None,
            host: None,
            port: 8086,
            database: None,
            username: None,
            password: None,
            dbadmin_username: None,
            dbadmin_password: None,
            auth_mode: AuthMode::Basic,
            retention_policy: None,
            create_database: true,
            measurement: "record".to_string(),
            tags: None,
            line_format: LineFormat::SingleLine,
            obs_to_upload: ObsToUpload::All,
            append_units_label: true,
            unit_system: None,
            augment_record: false,
            binding: BindingFilter::Archive,
            queue_capacity: 10,
            overflow_policy: OverflowPolicy::Reject,
            batch_max_items: 10,
            batch_max_wait_ms: 100,
            max_retries: 3,
            retry_base_delay_ms: 500,
            retry_max_delay_ms: 60_000,
            retry_strategy: RetryStrategy::Exponential,
            retry_jitter: true,
            timeout_secs: 30,
            connect_timeout_secs: 10,
            provision_timeout_secs: 10,
            compression: false,
            skip_upload: false,
            shutdown_policy: ShutdownPolicy::Drain,
            shutdown_deadline_ms: 4_000,
            log_level: LogLevel::Info,
            log_json: false,
            config_file: None,
            input: None,
            input_binding: Binding::Archive,
            inputs: BTreeMap::new(),
        }
    }
}

impl Config {
    /// Parses the command line (and environment). When `--config-file` is
    /// given, the file is the base and explicit command-line values override it.
    pub fn from_args<I, T>(args: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = T>,
        T: Into<std::ffi::OsString> + Clone,
    {
        let matches = Config::command().get_matches_from(args);
        let cli = Config::from_arg_matches(&matches).unwrap_or_else(|e| e.exit());
        let mut config = match &cli.config_file {
            Some(path) => {
                let mut file = Self::read_file(path)?;
                file.overlay(cli, &matches);
                file
            }
            None => cli,
        };
        config.post_process()?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let mut config = Self::read_file(path.as_ref())?;
        config.post_process()?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let mut config: Config = toml::from_str(content)?;
        config.post_process()?;
        config.validate()?;
        Ok(config)
    }

    fn read_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let mut config: Config = toml::from_str(&content)?;
        config.config_file = Some(path.to_path_buf());
        Ok(config)
    }

    /// Copies every value set on the command line or through the
    /// environment, even when it equals the built-in default.
    fn overlay(&mut self, cli: Config, matches: &ArgMatches) {
        let explicit = |id: &str| {
            matches!(
                matches.value_source(id),
                Some(ValueSource::CommandLine | ValueSource::EnvVariable)
            )
        };
        macro_rules! overlay {
            ($($field:ident),* $(,)?) => {
                $(
                    if explicit(stringify!($field)) {
                        self.$field = cli.$field.clone();
                    }
                )*
            };
        }
        overlay!(
            server_url,
            host,
            port,
            database,
            username,
            password,
            dbadmin_username,
            dbadmin_password,
            auth_mode,
            retention_policy,
            create_database,
            measurement,
            tags,
            line_format,
            obs_to_upload,
            append_units_label,
            unit_system,
            augment_record,
            binding,
            queue_capacity,
            overflow_policy,
            batch_max_items,
            batch_max_wait_ms,
            max_retries,
            retry_base_delay_ms,
            retry_max_delay_ms,
            retry_strategy,
            retry_jitter,
            timeout_secs,
            connect_timeout_secs,
            provision_timeout_secs,
            compression,
            skip_upload,
            shutdown_policy,
            shutdown_deadline_ms,
            log_level,
            log_json,
            input,
            input_binding,
        );
    }

    /// Normalizes values before validation: blank strings count as unset.
    pub fn post_process(&mut self) -> Result<(), ConfigError> {
        for value in [
            &mut self.server_url,
            &mut self.host,
            &mut self.database,
            &mut self.username,
            &mut self.password,
            &mut self.dbadmin_username,
            &mut self.dbadmin_password,
            &mut self.retention_policy,
            &mut self.tags,
        ] {
            if value.as_deref().is_some_and(|v| v.trim().is_empty()) {
                *value = None;
            }
        }
        if let Some(url) = &mut self.server_url {
            *url = url.trim().trim_end_matches('/').to_string();
        }
        if let Some(host) = &mut self.host {
            *host = host.trim().to_string();
        }
        self.measurement = self.measurement.trim().to_string();
        Ok(())
    }
}
