use super::groups::ForwarderConfig;
use super::{Config, ConfigError};
use crate::domain::TagSet;
use crate::protocol::has_line_break;
use crate::reliability::{RetryPolicy, WorkerConfig};
use crate::sender::{ClientConfig, Credentials, default_user_agent};
use crate::transform::{ObservationMapper, RecordTransformer};
use std::str::FromStr;
use std::time::Duration;
use url::Url;

impl Config {
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.server_url()?;

        if self.database.as_deref().is_none_or(|db| db.trim().is_empty()) {
            return Err(ConfigError::Missing("database"));
        }

        if self.measurement.is_empty() {
            return Err(ConfigError::InvalidConfig(
                "Measurement name must not be empty".to_string(),
            ));
        }
        if has_line_break(&self.measurement) {
            return Err(ConfigError::InvalidConfig(format!(
                "Measurement name {:?} contains a line break",
                self.measurement
            )));
        }

        self.tag_set()?;
        self.mapper()?;

        if self.queue_capacity == 0 {
            return Err(ConfigError::InvalidConfig(
                "Queue capacity must be greater than 0".to_string(),
            ));
        }
        if self.batch_max_items == 0 {
            return Err(ConfigError::InvalidConfig(
                "Batch max items must be greater than 0".to_string(),
            ));
        }
        if self.timeout_secs == 0 || self.connect_timeout_secs == 0 {
            return Err(ConfigError::InvalidConfig(
                "Timeouts must be greater than 0".to_string(),
            ));
        }
        if self.provision_timeout_secs == 0 {
            return Err(ConfigError::InvalidConfig(
                "Provision timeout must be greater than 0".to_string(),
            ));
        }
        if self.retry_base_delay_ms > self.retry_max_delay_ms {
            return Err(ConfigError::InvalidConfig(format!(
                "Retry base delay ({} ms) exceeds max delay ({} ms)",
                self.retry_base_delay_ms, self.retry_max_delay_ms
            )));
        }
        if self.password.is_some() && self.username.is_none() {
            return Err(ConfigError::InvalidConfig(
                "Password given without username".to_string(),
            ));
        }
        if self.dbadmin_password.is_some() && self.dbadmin_username.is_none() {
            return Err(ConfigError::InvalidConfig(
                "Admin password given without admin username".to_string(),
            ));
        }

        Ok(())
    }

    /// Resolves `server_url` or `host`/`port`; exactly one must be set.
    pub fn server_url(&self) -> Result<Url, ConfigError> {
        let raw = match (&self.server_url, &self.host) {
            (Some(_), Some(_)) => {
                return Err(ConfigError::Conflict(
                    "server_url and host are mutually exclusive".to_string(),
                ));
            }
            (None, None) => return Err(ConfigError::Missing("host or server_url")),
            (Some(url), None) => url.clone(),
            (None, Some(host)) => {
                if host.contains("://") || host.contains('/') {
                    return Err(ConfigError::InvalidUrl(format!(
                        "host '{host}' must be a bare hostname; use server_url for full URLs"
                    )));
                }
                format!("http://{}:{}", host, self.port)
            }
        };

        let url = Url::parse(&raw)
            .map_err(|e| ConfigError::InvalidUrl(format!("Invalid server URL '{raw}': {e}")))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(ConfigError::InvalidUrl(format!(
                "Unsupported scheme '{}' in '{raw}'",
                url.scheme()
            )));
        }
        Ok(url)
    }

    pub fn tag_set(&self) -> Result<TagSet, ConfigError> {
        match &self.tags {
            Some(tags) => Ok(TagSet::from_str(tags)?),
            None => Ok(TagSet::new()),
        }
    }

    pub fn mapper(&self) -> Result<ObservationMapper, ConfigError> {
        Ok(ObservationMapper::new(
            self.obs_to_upload,
            self.append_units_label,
            &self.inputs,
        )?)
    }

    pub fn credentials(&self) -> Option<Credentials> {
        self.username.as_ref().map(|user| {
            Credentials::new(user, self.password.clone().unwrap_or_default())
        })
    }

    pub fn admin_credentials(&self) -> Option<Credentials> {
        self.dbadmin_username.as_ref().map(|user| {
            Credentials::new(user, self.dbadmin_password.clone().unwrap_or_default())
        })
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.max_retries,
            base_delay: Duration::from_millis(self.retry_base_delay_ms),
            max_delay: Duration::from_millis(self.retry_max_delay_ms),
            strategy: self.retry_strategy,
            jitter: self.retry_jitter,
        }
    }

    /// Compiles a validated configuration into the forwarder's settings.
    pub fn to_forwarder_config(&self) -> Result<ForwarderConfig, ConfigError> {
        self.validate()?;

        let database = self.database.clone().ok_or(ConfigError::Missing("database"))?;
        let client = ClientConfig {
            server_url: self.server_url()?,
            database,
            retention_policy: self.retention_policy.clone(),
            credentials: self.credentials(),
            auth_mode: self.auth_mode,
            timeout: Duration::from_secs(self.timeout_secs),
            connect_timeout: Duration::from_secs(self.connect_timeout_secs),
            user_agent: default_user_agent(),
            compression: self.compression,
        };

        let transformer = RecordTransformer::new(
            self.mapper()?,
            self.measurement.clone(),
            self.tag_set()?,
            self.unit_system,
            self.augment_record,
        );

        Ok(ForwarderConfig {
            client,
            admin_credentials: self.admin_credentials(),
            create_database: self.create_database,
            provision_timeout: Duration::from_secs(self.provision_timeout_secs),
            skip_upload: self.skip_upload,
            transformer,
            line_format: self.line_format,
            binding_filter: self.binding,
            queue_capacity: self.queue_capacity,
            overflow_policy: self.overflow_policy,
            worker: WorkerConfig {
                batch_max_items: self.batch_max_items,
                batch_max_wait: Duration::from_millis(self.batch_max_wait_ms),
                retry: self.retry_policy(),
                shutdown_policy: self.shutdown_policy,
                shutdown_deadline: Duration::from_millis(self.shutdown_deadline_ms),
            },
        })
    }
}
