//! HTTP transport seam.
//!
//! The page loop consumes the [`Transport`] trait rather than reqwest
//! directly so tests can script responses and the HTTP engine stays
//! swappable. [`HttpTransport`] is the production implementation.

use crate::config::GitHubConfig;
use crate::{ReconError, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::time::Duration;

/// A raw HTTP response as seen by the classifier.
///
/// Header names are stored lower-cased; [`RawResponse::header`] lookups are
/// case-insensitive.
#[derive(Debug, Clone)]
pub struct RawResponse {
    pub status: u16,
    headers: HashMap<String, String>,
    pub body: String,
}

impl RawResponse {
    /// Build a response, lower-casing header names.
    pub fn new(
        status: u16,
        headers: impl IntoIterator<Item = (String, String)>,
        body: impl Into<String>,
    ) -> Self {
        Self {
            status,
            headers: headers
                .into_iter()
                .map(|(k, v)| (k.to_ascii_lowercase(), v))
                .collect(),
            body: body.into(),
        }
    }

    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Capability to issue a GET with headers, query parameters, and a
/// per-request deadline.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn get(
        &self,
        url: &str,
        headers: &[(String, String)],
        params: &[(String, String)],
        timeout: Duration,
    ) -> Result<RawResponse>;
}

/// reqwest-backed transport.
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    /// Create a transport with the default user agent.
    pub fn new() -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(GitHubConfig::USER_AGENT)
            .build()
            .map_err(|e| ReconError::Network {
                message: format!("Failed to create HTTP client: {}", e),
                cause: None,
            })?;

        Ok(Self { client })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn get(
        &self,
        url: &str,
        headers: &[(String, String)],
        params: &[(String, String)],
        timeout: Duration,
    ) -> Result<RawResponse> {
        let mut request = self.client.get(url).query(params).timeout(timeout);
        for (key, value) in headers {
            request = request.header(key.as_str(), value.as_str());
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                ReconError::Timeout(timeout)
            } else {
                ReconError::Network {
                    message: format!("GET {} failed: {}", url, e),
                    cause: Some(e.to_string()),
                }
            }
        })?;

        let status = response.status().as_u16();
        let headers: Vec<(String, String)> = response
            .headers()
            .iter()
            .filter_map(|(k, v)| {
                v.to_str()
                    .ok()
                    .map(|value| (k.as_str().to_string(), value.to_string()))
            })
            .collect();

        let body = response.text().await.map_err(|e| ReconError::Network {
            message: format!("Failed to read response body from {}: {}", url, e),
            cause: Some(e.to_string()),
        })?;

        Ok(RawResponse::new(status, headers, body))
    }
}
