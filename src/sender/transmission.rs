use super::client::HttpClient;
use super::metrics::MetricsCollector;
use bytes::Bytes;
use flate2::Compression;
use flate2::write::GzEncoder;
use reqwest::StatusCode;
use reqwest::header::{CONTENT_ENCODING, CONTENT_TYPE, HeaderMap, HeaderValue};
use std::io::Write;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, trace};

/// Response bodies are cut to this many characters in errors and logs.
const MAX_ERROR_BODY: usize = 512;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DeliveryError {
    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },
    #[error("Database '{database}' not found")]
    DatabaseNotFound { database: String },
    #[error("Request timed out after {0:?}")]
    Timeout(Duration),
    #[error("Network error: {0}")]
    Network(String),
    #[error("Request could not be built: {0}")]
    Request(String),
}

impl DeliveryError {
    /// Permanent errors are not retried.
    pub fn is_permanent(&self) -> bool {
        match self {
            DeliveryError::Status { status, .. } => (400..500).contains(status),
            DeliveryError::DatabaseNotFound { .. } | DeliveryError::Request(_) => true,
            DeliveryError::Timeout(_) | DeliveryError::Network(_) => false,
        }
    }
}

/// Result of one POST attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendOutcome {
    Acked,
    Retrying(DeliveryError),
    Dropped(DeliveryError),
}

impl SendOutcome {
    fn from_error(error: DeliveryError) -> Self {
        if error.is_permanent() {
            SendOutcome::Dropped(error)
        } else {
            SendOutcome::Retrying(error)
        }
    }
}

#[derive(Debug, Clone)]
pub struct BatchTransmitter {
    client: HttpClient,
    metrics: MetricsCollector,
    skip_upload: bool,
}

impl BatchTransmitter {
    pub fn new(client: HttpClient, metrics: MetricsCollector) -> Self {
        Self {
            client,
            metrics,
            skip_upload: false,
        }
    }

    /// Dry-run mode: bodies are logged and reported as acknowledged.
    pub fn with_skip_upload(mut self, skip_upload: bool) -> Self {
        self.skip_upload = skip_upload;
        self
    }

    pub fn client(&self) -> &HttpClient {
        &self.client
    }

    pub fn metrics(&self) -> &MetricsCollector {
        &self.metrics
    }

    /// POSTs `body` to the write endpoint once and classifies the response.
    pub async fn send(&self, body: &Bytes) -> SendOutcome {
        if self.skip_upload {
            debug!(
                bytes = body.len(),
                "skip_upload set, not sending:\n{}",
                String::from_utf8_lossy(body)
            );
            return SendOutcome::Acked;
        }

        let config = self.client.config();
        let (payload, compressed) = if config.compression {
            match gzip(body) {
                Ok(compressed) => (compressed, true),
                Err(e) => return SendOutcome::Dropped(DeliveryError::Request(e.to_string())),
            }
        } else {
            (body.clone(), false)
        };

        let request = self
            .client
            .inner()
            .post(self.client.write_url().clone())
            .headers(build_headers(compressed))
            .body(payload.clone());
        let request = self.client.authorize(request, self.client.credentials());

        let start = Instant::now();
        let result = request.send().await;
        let latency = start.elapsed();
        self.metrics.record_attempt(payload.len(), latency);

        let response = match result {
            Ok(response) => response,
            Err(e) if e.is_timeout() => {
                return SendOutcome::Retrying(DeliveryError::Timeout(config.timeout));
            }
            Err(e) if e.is_builder() => {
                return SendOutcome::Dropped(DeliveryError::Request(e.to_string()));
            }
            Err(e) => return SendOutcome::Retrying(DeliveryError::Network(e.to_string())),
        };

        let status = response.status();
        trace!(status = status.as_u16(), ?latency, "write response");
        if status.is_success() {
            return SendOutcome::Acked;
        }

        let body = response.text().await.unwrap_or_default();
        classify_failure(status, &body, self.client.database())
    }
}

/// Maps a non-2xx response to an outcome. A "database not found" body is
/// permanent whatever the status class; other 4xx are permanent; the rest
/// are retried.
pub fn classify_failure(status: StatusCode, body: &str, database: &str) -> SendOutcome {
    if body.contains("database not found") {
        return SendOutcome::Dropped(DeliveryError::DatabaseNotFound {
            database: database.to_string(),
        });
    }
    SendOutcome::from_error(DeliveryError::Status {
        status: status.as_u16(),
        body: truncate(body.trim(), MAX_ERROR_BODY),
    })
}

fn build_headers(compressed: bool) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(
        CONTENT_TYPE,
        HeaderValue::from_static("text/plain; charset=utf-8"),
    );
    if compressed {
        headers.insert(CONTENT_ENCODING, HeaderValue::from_static("gzip"));
    }
    headers
}

fn gzip(body: &[u8]) -> std::io::Result<Bytes> {
    let mut encoder = GzEncoder::new(Vec::with_capacity(body.len() / 2), Compression::default());
    encoder.write_all(body)?;
    Ok(Bytes::from(encoder.finish()?))
}

fn truncate(s: &str, max_chars: usize) -> String {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &s[..idx]),
        None => s.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::read::GzDecoder;
    use std::io::Read;

    #[test]
    fn test_classify_statuses() {
        assert!(matches!(
            classify_failure(StatusCode::BAD_REQUEST, "unable to parse", "weewx"),
            SendOutcome::Dropped(DeliveryError::Status { status: 400, .. })
        ));
        assert!(matches!(
            classify_failure(StatusCode::SERVICE_UNAVAILABLE, "", "weewx"),
            SendOutcome::Retrying(DeliveryError::Status { status: 503, .. })
        ));
        assert_eq!(
            classify_failure(
                StatusCode::INTERNAL_SERVER_ERROR,
                r#"{"error":"database not found: \"weewx\""}"#,
                "weewx"
            ),
            SendOutcome::Dropped(DeliveryError::DatabaseNotFound {
                database: "weewx".to_string()
            })
        );
    }

    #[test]
    fn test_transient_errors_are_not_permanent() {
        assert!(!DeliveryError::Timeout(Duration::from_secs(1)).is_permanent());
        assert!(!DeliveryError::Network("reset".to_string()).is_permanent());
        assert!(DeliveryError::Request("bad header".to_string()).is_permanent());
    }

    #[test]
    fn test_gzip_round_trip() {
        let compressed = gzip(b"weewx outTemp=72.5 1").unwrap();
        let mut out = String::new();
        GzDecoder::new(compressed.as_ref())
            .read_to_string(&mut out)
            .unwrap();
        assert_eq!(out, "weewx outTemp=72.5 1");
    }

    #[test]
    fn test_truncate_long_bodies() {
        let long = "x".repeat(600);
        let cut = truncate(&long, MAX_ERROR_BODY);
        assert_eq!(cut.len(), MAX_ERROR_BODY + 3);
        assert_eq!(truncate("short", MAX_ERROR_BODY), "short");
    }
}
