use super::client::{Credentials, HttpClient};
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;
use tokio::time::timeout;
use tracing::{debug, info};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProvisionError {
    #[error("Provisioning timed out after {0:?}")]
    Timeout(Duration),
    #[error("Network error: {0}")]
    Network(String),
    #[error("Server rejected CREATE DATABASE with HTTP {status}: {message}")]
    Rejected { status: u16, message: String },
    #[error("CREATE DATABASE failed: {0}")]
    Query(String),
}

// InfluxQL responses: {"results":[{"statement_id":0,"error":"..."}]} or
// {"error":"..."} for request-level failures.
#[derive(Debug, Default, Deserialize)]
struct QueryResponse {
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    results: Vec<StatementResult>,
}

#[derive(Debug, Default, Deserialize)]
struct StatementResult {
    #[serde(default)]
    error: Option<String>,
}

impl QueryResponse {
    fn first_error(self) -> Option<String> {
        self.error
            .or_else(|| self.results.into_iter().find_map(|r| r.error))
    }
}

/// Issues `CREATE DATABASE` once at startup.
#[derive(Debug, Clone)]
pub struct DatabaseProvisioner {
    client: HttpClient,
    admin: Option<Credentials>,
    timeout: Duration,
}

impl DatabaseProvisioner {
    pub fn new(client: HttpClient, admin: Option<Credentials>, timeout: Duration) -> Self {
        Self {
            client,
            admin,
            timeout,
        }
    }

    /// Admin credentials if configured, otherwise the write credentials.
    pub fn credentials(&self) -> Option<&Credentials> {
        self.admin.as_ref().or(self.client.credentials())
    }

    pub fn statement(&self) -> String {
        create_database_statement(self.client.database())
    }

    /// Creates the database if needed. "Already exists" counts as success.
    /// The whole exchange is bounded by the provisioning timeout.
    pub async fn ensure_database(&self) -> Result<(), ProvisionError> {
        match timeout(self.timeout, self.create()).await {
            Ok(result) => result,
            Err(_) => Err(ProvisionError::Timeout(self.timeout)),
        }
    }

    async fn create(&self) -> Result<(), ProvisionError> {
        let statement = self.statement();
        debug!(url = %self.client.query_url(), "{}", statement);

        let request = self
            .client
            .inner()
            .post(self.client.query_url().clone())
            .query(&[("q", statement.as_str())]);
        let request = self.client.authorize(request, self.credentials());

        let response = request
            .send()
            .await
            .map_err(|e| ProvisionError::Network(e.to_string()))?;
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ProvisionError::Network(e.to_string()))?;

        let error = serde_json::from_str::<QueryResponse>(&body)
            .ok()
            .and_then(QueryResponse::first_error);

        if let Some(message) = &error {
            if message.contains("already exists") {
                info!(database = self.client.database(), "Database already exists");
                return Ok(());
            }
        }

        if !status.is_success() {
            return Err(ProvisionError::Rejected {
                status: status.as_u16(),
                message: error.unwrap_or_else(|| body.trim().to_string()),
            });
        }
        if let Some(message) = error {
            return Err(ProvisionError::Query(message));
        }

        info!(database = self.client.database(), "Database ready");
        Ok(())
    }
}

/// `CREATE DATABASE "name"` with embedded quotes and backslashes escaped.
pub fn create_database_statement(database: &str) -> String {
    let escaped = database.replace('\\', "\\\\").replace('"', "\\\"");
    format!("CREATE DATABASE \"{escaped}\"")
}
