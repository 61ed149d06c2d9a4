//! The byte-fetcher contract (§4.1): a pluggable transport the caches
//! delegate to, plus a default implementation over `reqwest`.
//!
//! The core crate never talks to the network directly outside of this
//! module; callers that want to share a connection pool, inject a mock, or
//! run inside an environment without direct socket access substitute their
//! own [`ByteFetcher`].

use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::error::VerifierError;

/// What kind of payload a fetch is expected to return, so the fetcher can
/// apply the right content-type validation. JWKS documents are JSON;
/// ALB's per-kid endpoint returns `text/plain` PEM (§9, resolved open
/// question).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchKind {
    Json,
    Text,
}

/// Per-call timeout options (§4.1).
#[derive(Debug, Clone, Copy)]
pub struct FetchOptions {
    pub socket_idle_timeout: Duration,
    pub response_timeout: Duration,
    pub kind: FetchKind,
}

impl Default for FetchOptions {
    fn default() -> Self {
        FetchOptions {
            socket_idle_timeout: Duration::from_secs(10),
            response_timeout: Duration::from_secs(5),
            kind: FetchKind::Json,
        }
    }
}

impl FetchOptions {
    pub fn json() -> Self {
        FetchOptions {
            kind: FetchKind::Json,
            ..Default::default()
        }
    }

    pub fn text() -> Self {
        FetchOptions {
            kind: FetchKind::Text,
            ..Default::default()
        }
    }
}

/// The external transport collaborator. Out of scope per the spec's §1, but
/// the contract it must honor (one retry, content-type validation, UTF-8
/// validation) lives here so the caches above it can rely on it uniformly.
#[async_trait]
pub trait ByteFetcher: Send + Sync {
    /// Fetch `uri` and return its raw bytes, already validated against
    /// `options.kind`'s expected content type and UTF-8-ness.
    async fn fetch(&self, uri: &str, options: FetchOptions) -> Result<Vec<u8>, VerifierError>;
}

/// Default [`ByteFetcher`] over a pooled `reqwest::Client`, implementing the
/// one-retry/content-type/timeout contract of §4.1.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new() -> Self {
        HttpFetcher {
            client: reqwest::Client::new(),
        }
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        HttpFetcher { client }
    }

    async fn fetch_once(&self, uri: &str, options: FetchOptions) -> Result<Vec<u8>, VerifierError> {
        let response = self
            .client
            .get(uri)
            .timeout(options.response_timeout)
            .send()
            .await
            .map_err(|e| retryable_or_not(uri, &e))?;

        let status = response.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(VerifierError::FetchError {
                uri: uri.to_string(),
                reason: "HTTP 429".into(),
            });
        }
        if !status.is_success() {
            return Err(VerifierError::NonRetryableFetchError {
                uri: uri.to_string(),
                reason: format!("HTTP {status}"),
            });
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_string();

        match options.kind {
            FetchKind::Json if !content_type.starts_with("application/json") => {
                return Err(VerifierError::NonRetryableFetchError {
                    uri: uri.to_string(),
                    reason: format!("unexpected content-type '{content_type}', expected application/json"),
                });
            }
            _ => {}
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| VerifierError::NonRetryableFetchError {
                uri: uri.to_string(),
                reason: e.to_string(),
            })?;

        if std::str::from_utf8(&bytes).is_err() {
            return Err(VerifierError::NonRetryableFetchError {
                uri: uri.to_string(),
                reason: "response body is not valid UTF-8".into(),
            });
        }

        if options.kind == FetchKind::Json {
            serde_json::from_slice::<serde_json::Value>(&bytes).map_err(|e| {
                VerifierError::NonRetryableFetchError {
                    uri: uri.to_string(),
                    reason: format!("invalid JSON: {e}"),
                }
            })?;
        }

        Ok(bytes.to_vec())
    }
}

impl Default for HttpFetcher {
    fn default() -> Self {
        Self::new()
    }
}

fn retryable_or_not(uri: &str, err: &reqwest::Error) -> VerifierError {
    VerifierError::FetchError {
        uri: uri.to_string(),
        reason: err.to_string(),
    }
}

#[async_trait]
impl ByteFetcher for HttpFetcher {
    async fn fetch(&self, uri: &str, options: FetchOptions) -> Result<Vec<u8>, VerifierError> {
        match self.fetch_once(uri, options).await {
            Ok(bytes) => Ok(bytes),
            Err(VerifierError::FetchError { uri, reason }) => {
                warn!(uri = %uri, reason = %reason, "retryable fetch failed, retrying once");
                match self.fetch_once(&uri, options).await {
                    Ok(bytes) => {
                        debug!(uri = %uri, "retry succeeded");
                        Ok(bytes)
                    }
                    Err(e) => {
                        warn!(uri = %uri, "retry also failed");
                        Err(e)
                    }
                }
            }
            Err(e) => Err(e),
        }
    }
}
