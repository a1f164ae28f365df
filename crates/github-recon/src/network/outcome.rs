//! HTTP outcome classification.
//!
//! Maps a raw response to one of four semantic outcomes so every call site
//! handles each case explicitly. Quota headers are fed to the limiter
//! before classification, for error responses included.

use crate::network::limiter::QuotaLimiter;
use crate::network::transport::RawResponse;
use crate::{ReconError, Result};
use serde_json::Value;

/// Semantic outcome of one API response.
#[derive(Debug, Clone)]
pub enum Outcome {
    /// 2xx with the parsed JSON body.
    Success(Value),
    /// 404: zero results, not an error.
    Empty,
    /// 403. GitHub answers 403 both for quota exhaustion and for plain
    /// forbidden resources; the two are indistinguishable here and both get
    /// the cooldown-and-retry treatment.
    RateLimited,
    /// Any other non-2xx status: abort and surface.
    Fatal {
        message: String,
        status: u16,
        payload: Value,
    },
}

/// Classify a response, updating the limiter from its headers first.
///
/// Returns `Err` only when a 2xx body fails to parse as JSON, which is a
/// failure below the HTTP layer, not a `Fatal` outcome.
pub fn classify(limiter: &mut QuotaLimiter, response: &RawResponse) -> Result<Outcome> {
    limiter.update_from_headers(response);

    match response.status {
        404 => Ok(Outcome::Empty),
        403 => Ok(Outcome::RateLimited),
        status if response.is_success() => {
            let value: Value =
                serde_json::from_str(&response.body).map_err(|e| ReconError::Json {
                    message: format!("Failed to parse response body (status {}): {}", status, e),
                    source: Some(e),
                })?;
            Ok(Outcome::Success(value))
        }
        status => {
            let payload: Value = serde_json::from_str(&response.body).unwrap_or(Value::Null);
            let message = payload
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("Unknown error")
                .to_string();
            Ok(Outcome::Fatal {
                message,
                status,
                payload,
            })
        }
    }
}
