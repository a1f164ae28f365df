//! Adaptive throttling against the server-reported request quota.
//!
//! GitHub reports the remaining budget and the reset time on every
//! response; the limiter spreads the remaining budget across the time left
//! once it drops below a low-water mark, and otherwise enforces a small
//! fixed spacing between requests.
//!
//! A limiter is an explicitly constructed value owned by one client, never
//! ambient state. `update`/`wait_if_needed` take `&mut self`, so concurrent
//! fetches sharing an instance must serialize through a mutex (the client
//! wraps its limiter in `tokio::sync::Mutex`).

use crate::config::QuotaConfig;
use crate::network::transport::RawResponse;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tracing::debug;

/// Tracks remaining quota and computes the pre-request delay.
#[derive(Debug)]
pub struct QuotaLimiter {
    remaining: u64,
    reset_epoch: u64,
    /// Epoch seconds of the last issued request.
    last_request_at: f64,
    min_delay: Duration,
}

impl QuotaLimiter {
    pub fn new() -> Self {
        Self {
            remaining: QuotaConfig::DEFAULT_REMAINING,
            reset_epoch: 0,
            last_request_at: 0.0,
            min_delay: QuotaConfig::MIN_DELAY,
        }
    }

    /// Record the latest quota snapshot. Absent fields leave prior values
    /// unchanged.
    pub fn update(&mut self, remaining: Option<u64>, reset_epoch: Option<u64>) {
        if let Some(remaining) = remaining {
            self.remaining = remaining;
        }
        if let Some(reset_epoch) = reset_epoch {
            self.reset_epoch = reset_epoch;
        }
    }

    /// Update from the `x-ratelimit-remaining` / `x-ratelimit-reset`
    /// response headers. Missing or unparseable headers are ignored.
    pub fn update_from_headers(&mut self, response: &RawResponse) {
        let remaining = response
            .header("x-ratelimit-remaining")
            .and_then(|v| v.parse::<u64>().ok());
        let reset = response
            .header("x-ratelimit-reset")
            .and_then(|v| v.parse::<u64>().ok());
        self.update(remaining, reset);
    }

    pub fn remaining(&self) -> u64 {
        self.remaining
    }

    pub fn reset_epoch(&self) -> u64 {
        self.reset_epoch
    }

    /// Required spacing before the next request, given the current time in
    /// epoch seconds.
    ///
    /// Below the low-water mark the remaining budget is spread evenly across
    /// the time left before reset, with a 2-second floor against bursty
    /// retries near exhaustion.
    pub fn required_delay(&self, now: f64) -> f64 {
        if self.remaining < QuotaConfig::LOW_WATER_MARK {
            let until_reset = self.reset_epoch as f64 - now;
            let spread = until_reset / self.remaining.max(1) as f64;
            spread.max(QuotaConfig::EXHAUSTION_FLOOR.as_secs_f64())
        } else {
            self.min_delay.as_secs_f64()
        }
    }

    /// Sleep until the required spacing since the last request has elapsed.
    ///
    /// `last_request_at` is refreshed on every call, even when no sleep was
    /// needed, so the spacing is enforced on every subsequent call.
    pub async fn wait_if_needed(&mut self) {
        let now = epoch_now();
        let delay = self.required_delay(now);
        let since_last = now - self.last_request_at;

        if since_last < delay {
            let sleep_for = delay - since_last;
            debug!(
                remaining = self.remaining,
                sleep_secs = sleep_for,
                "Throttling before next request"
            );
            tokio::time::sleep(Duration::from_secs_f64(sleep_for)).await;
        }

        self.last_request_at = epoch_now();
    }

    pub fn last_request_at(&self) -> f64 {
        self.last_request_at
    }
}

impl Default for QuotaLimiter {
    fn default() -> Self {
        Self::new()
    }
}

fn epoch_now() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs_f64()
}
