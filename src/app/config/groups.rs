use crate::buffer::OverflowPolicy;
use crate::domain::Binding;
use crate::protocol::LineFormat;
use crate::reliability::WorkerConfig;
use crate::sender::{ClientConfig, Credentials};
use crate::transform::RecordTransformer;
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Which bindings are forwarded; the other is ignored at `submit`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BindingFilter {
    Loop,
    #[default]
    Archive,
    Both,
}

impl BindingFilter {
    pub fn accepts(self, binding: Binding) -> bool {
        matches!(
            (self, binding),
            (BindingFilter::Both, _)
                | (BindingFilter::Loop, Binding::Loop)
                | (BindingFilter::Archive, Binding::Archive)
        )
    }
}

/// Validated, immutable settings the forwarder runs with.
#[derive(Debug, Clone)]
pub struct ForwarderConfig {
    pub client: ClientConfig,
    /// Credentials for `CREATE DATABASE`, if different from the write ones.
    pub admin_credentials: Option<Credentials>,
    pub create_database: bool,
    pub provision_timeout: Duration,
    pub skip_upload: bool,
    pub transformer: RecordTransformer,
    pub line_format: LineFormat,
    pub binding_filter: BindingFilter,
    pub queue_capacity: usize,
    pub overflow_policy: OverflowPolicy,
    pub worker: WorkerConfig,
}

impl ForwarderConfig {
    pub fn new(client: ClientConfig, transformer: RecordTransformer) -> Self {
        Self {
            client,
            admin_credentials: None,
            create_database: true,
            provision_timeout: Duration::from_secs(10),
            skip_upload: false,
            transformer,
            line_format: LineFormat::default(),
            binding_filter: BindingFilter::default(),
            queue_capacity: 10,
            overflow_policy: OverflowPolicy::default(),
            worker: WorkerConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_binding_filter() {
        assert!(BindingFilter::Archive.accepts(Binding::Archive));
        assert!(!BindingFilter::Archive.accepts(Binding::Loop));
        assert!(BindingFilter::Loop.accepts(Binding::Loop));
        assert!(BindingFilter::Both.accepts(Binding::Loop));
        assert!(BindingFilter::Both.accepts(Binding::Archive));
    }
}
