pub mod client;
pub mod metrics;
pub mod provision;
pub mod transmission;

pub use client::{AuthMode, ClientConfig, ClientError, Credentials, HttpClient, default_user_agent};
pub use metrics::{DeliveryStats, MetricsCollector};
pub use provision::{DatabaseProvisioner, ProvisionError, create_database_statement};
pub use transmission::{BatchTransmitter, DeliveryError, SendOutcome, classify_failure};
