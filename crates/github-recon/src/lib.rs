//! github-recon - Rate-limited, cached GitHub API access layer for OSINT
//! reconnaissance.
//!
//! This crate fronts the GitHub REST API for a reconnaissance console:
//! it throttles requests against the server-reported quota, deduplicates
//! work through a persisted response cache, walks `Link`-header
//! pagination, classifies HTTP outcomes explicitly, and normalizes raw
//! records into a canonical repository store with upsert semantics.
//!
//! # Example
//!
//! ```rust,ignore
//! use github_recon::{FetchOptions, GitHubRecon};
//!
//! #[tokio::main]
//! async fn main() -> github_recon::Result<()> {
//!     let recon = GitHubRecon::new("./recon-data", std::env::var("GITHUB_TOKEN").ok())?;
//!
//!     // Remote search; results are normalized and persisted.
//!     let repos = recon
//!         .search_repositories("vulnerability scanner", Some("Rust"), &FetchOptions::default())
//!         .await?;
//!     println!("Found {} repositories", repos.len());
//!
//!     // Later lookups hit the local store while it is fresh.
//!     let stats = recon.statistics()?;
//!     println!("{} repositories stored", stats.total);
//!
//!     Ok(())
//! }
//! ```
//!
//! # Architecture
//!
//! - [`network`] - transport seam, quota limiter, outcome classification,
//!   and the paginating client
//! - [`store`] - SQLite response cache and repository entity store
//! - [`models`] - normalized entity types
//! - [`GitHubRecon`] - facade composing the above
//!
//! The crate emits `tracing` events but never installs a subscriber; that
//! belongs to the host application, along with credential storage and the
//! command loop.

pub mod config;
pub mod error;
pub mod models;
pub mod network;
pub mod store;

mod api;

// Re-export commonly used types
pub use api::GitHubRecon;
pub use error::{ReconError, Result};
pub use models::{LanguageCount, Repo, RepoStats, StarCount};
pub use network::{
    classify, ApiClient, FetchOptions, Fetched, HttpTransport, Outcome, QuotaLimiter,
    RawResponse, RetryPolicy, Transport,
};
pub use store::{request_signature, RepoStore, ResponseCache};
