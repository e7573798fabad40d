use clap::ValueEnum;
use reqwest::{Client, ClientBuilder, RequestBuilder};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use thiserror::Error;
use url::Url;

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),
    #[error("Failed to build HTTP client: {0}")]
    Build(#[from] reqwest::Error),
}

/// Username/password pair. The password never appears in `Debug` output.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

/// How credentials travel with a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthMode {
    /// `Authorization: Basic ...`
    #[default]
    Basic,
    /// `u=` and `p=` query parameters.
    Query,
}

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub server_url: Url,
    pub database: String,
    pub retention_policy: Option<String>,
    pub credentials: Option<Credentials>,
    pub auth_mode: AuthMode,
    pub timeout: Duration,
    pub connect_timeout: Duration,
    pub user_agent: String,
    pub compression: bool,
}

impl ClientConfig {
    pub fn new(server_url: Url, database: impl Into<String>) -> Self {
        Self {
            server_url,
            database: database.into(),
            retention_policy: None,
            credentials: None,
            auth_mode: AuthMode::default(),
            timeout: Duration::from_secs(10),
            connect_timeout: Duration::from_secs(5),
            user_agent: default_user_agent(),
            compression: false,
        }
    }
}

pub fn default_user_agent() -> String {
    format!("wx-influx-forwarder/{}", env!("CARGO_PKG_VERSION"))
}

/// Shared HTTP client for the write and query endpoints.
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
    config: ClientConfig,
    write_url: Url,
    query_url: Url,
}

impl HttpClient {
    pub fn new(config: ClientConfig) -> Result<Self, ClientError> {
        if config.database.trim().is_empty() {
            return Err(ClientError::InvalidConfiguration(
                "database name is empty".to_string(),
            ));
        }
        if config.server_url.cannot_be_a_base() {
            return Err(ClientError::InvalidConfiguration(format!(
                "server URL '{}' cannot carry a path",
                config.server_url
            )));
        }

        let mut write_url = endpoint(&config.server_url, "write");
        {
            let mut query = write_url.query_pairs_mut();
            query.append_pair("db", &config.database);
            if let Some(rp) = &config.retention_policy {
                query.append_pair("rp", rp);
            }
        }
        let query_url = endpoint(&config.server_url, "query");

        let client = ClientBuilder::new()
            .timeout(config.timeout)
            .connect_timeout(config.connect_timeout)
            .user_agent(&config.user_agent)
            .build()?;

        Ok(Self {
            client,
            config,
            write_url,
            query_url,
        })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn inner(&self) -> &Client {
        &self.client
    }

    pub fn write_url(&self) -> &Url {
        &self.write_url
    }

    pub fn query_url(&self) -> &Url {
        &self.query_url
    }

    pub fn database(&self) -> &str {
        &self.config.database
    }

    pub fn credentials(&self) -> Option<&Credentials> {
        self.config.credentials.as_ref()
    }

    /// Attaches `credentials` to `request` according to the configured mode.
    pub fn authorize(
        &self,
        request: RequestBuilder,
        credentials: Option<&Credentials>,
    ) -> RequestBuilder {
        match (credentials, self.config.auth_mode) {
            (None, _) => request,
            (Some(c), AuthMode::Basic) => request.basic_auth(&c.username, Some(&c.password)),
            (Some(c), AuthMode::Query) => {
                request.query(&[("u", c.username.as_str()), ("p", c.password.as_str())])
            }
        }
    }
}

// Appends `segment` to the base path so servers mounted under a prefix work.
fn endpoint(base: &Url, segment: &str) -> Url {
    let mut url = base.clone();
    let path = format!("{}/{}", base.path().trim_end_matches('/'), segment);
    url.set_path(&path);
    url.set_query(None);
    url.set_fragment(None);
    url
}
