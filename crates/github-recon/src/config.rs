//! Centralized configuration for the access layer.
//!
//! Constants for the GitHub endpoint, quota throttling, and local storage.

use std::time::Duration;

/// GitHub API endpoint configuration.
pub struct GitHubConfig;

impl GitHubConfig {
    pub const API_BASE: &'static str = "https://api.github.com";
    pub const ACCEPT_HEADER: &'static str = "application/vnd.github.v3+json";
    pub const USER_AGENT: &'static str = "github-recon/0.3";
    /// Items requested per page.
    pub const PER_PAGE: u32 = 100;
    /// Per-request deadline handed to the transport.
    pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
    /// Fixed pause after a 403 before the single same-page retry.
    pub const RATE_LIMIT_COOLDOWN: Duration = Duration::from_secs(60);
}

/// Quota throttling configuration.
pub struct QuotaConfig;

impl QuotaConfig {
    /// Assumed remaining budget until the server reports real numbers.
    pub const DEFAULT_REMAINING: u64 = 5_000;
    /// Below this remaining count the limiter spreads budget until reset.
    pub const LOW_WATER_MARK: u64 = 100;
    /// Minimum spacing between requests while quota is healthy.
    pub const MIN_DELAY: Duration = Duration::from_millis(100);
    /// Delay floor near exhaustion.
    pub const EXHAUSTION_FLOOR: Duration = Duration::from_secs(2);
}

/// Local storage configuration.
pub struct StorageConfig;

impl StorageConfig {
    pub const DB_FILE_NAME: &'static str = "recon.sqlite";
    pub const BUSY_TIMEOUT_MS: u32 = 5_000;
    /// Default freshness window for cached responses.
    pub const CACHE_TTL_HOURS: u64 = 24;
    /// Default age threshold for `sweep`.
    pub const SWEEP_MAX_AGE_DAYS: u64 = 7;
    /// Freshness window for stored repository entities.
    pub const ENTITY_FRESHNESS: Duration = Duration::from_secs(24 * 60 * 60);
    /// Result cap for local searches.
    pub const SEARCH_PAGE_SIZE: u32 = 100;
}
