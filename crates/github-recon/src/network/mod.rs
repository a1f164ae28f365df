//! Network plumbing for the access layer.
//!
//! This module provides:
//! - The transport seam over reqwest
//! - Quota-aware throttling from server-reported rate-limit headers
//! - Backoff for transient transport failures
//! - Response classification into semantic outcomes
//! - The paginating, caching API client

mod client;
mod limiter;
mod outcome;
mod retry;
mod transport;

pub use client::{ApiClient, FetchOptions, Fetched};
pub use limiter::QuotaLimiter;
pub use outcome::{classify, Outcome};
pub use retry::RetryPolicy;
pub use transport::{HttpTransport, RawResponse, Transport};
