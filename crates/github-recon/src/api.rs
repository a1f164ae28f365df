//! High-level reconnaissance facade.
//!
//! Wires the paginating client and the entity store together for the
//! operations a recon module actually runs: remote repository search,
//! single-repository lookup with a freshness window, local search over
//! the stored entities, statistics, and cache sweeping.

use crate::config::StorageConfig;
use crate::models::{Repo, RepoStats};
use crate::network::{ApiClient, FetchOptions, Fetched, HttpTransport, Transport};
use crate::store::{RepoStore, ResponseCache};
use crate::Result;
use serde_json::Value;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// GitHub reconnaissance API over a local SQLite database.
pub struct GitHubRecon {
    client: ApiClient,
    repos: RepoStore,
    cache: Arc<ResponseCache>,
}

impl GitHubRecon {
    /// Create a facade storing its database under `data_dir`.
    ///
    /// The token, when present, authenticates every request; obtaining and
    /// storing it is the host application's concern.
    pub fn new(data_dir: impl AsRef<Path>, token: Option<String>) -> Result<Self> {
        let transport = Arc::new(HttpTransport::new()?);
        Self::with_transport(transport, data_dir, token)
    }

    /// Create a facade over a custom transport.
    pub fn with_transport(
        transport: Arc<dyn Transport>,
        data_dir: impl AsRef<Path>,
        token: Option<String>,
    ) -> Result<Self> {
        let db_path = data_dir.as_ref().join(StorageConfig::DB_FILE_NAME);
        let cache = Arc::new(ResponseCache::open(&db_path)?);
        let repos = RepoStore::open(&db_path)?;
        let client = ApiClient::new(transport, cache.clone(), token);

        Ok(Self {
            client,
            repos,
            cache,
        })
    }

    /// Search GitHub repositories and persist every normalized result.
    ///
    /// Best-effort: when the page loop stops early but some repositories
    /// were already accumulated, they are stored and returned and the
    /// aborting error is logged; an abort with nothing accumulated
    /// propagates the error.
    pub async fn search_repositories(
        &self,
        query: &str,
        language: Option<&str>,
        options: &FetchOptions,
    ) -> Result<Vec<Repo>> {
        let mut search_query = query.to_string();
        if let Some(language) = language {
            search_query.push_str(&format!(" language:{}", language));
        }

        info!(query = %search_query, "Searching GitHub repositories");

        let params = vec![
            ("q".to_string(), search_query),
            ("sort".to_string(), "stars".to_string()),
            ("order".to_string(), "desc".to_string()),
        ];

        let Fetched { items, error, .. } = self
            .client
            .fetch("/search/repositories", &params, options)
            .await?;

        let mut repos = Vec::new();
        for item in &items {
            for raw in search_items(item) {
                match Repo::from_raw(raw) {
                    Some(mut repo) => {
                        self.repos.upsert(&mut repo)?;
                        repos.push(repo);
                    }
                    None => debug!("Skipping record without owner/name"),
                }
            }
        }

        match error {
            Some(e) if repos.is_empty() => Err(e),
            Some(e) => {
                warn!(error = %e, stored = repos.len(), "Search degraded to partial results");
                Ok(repos)
            }
            None => Ok(repos),
        }
    }

    /// Get one repository, preferring the stored copy while it is fresh.
    ///
    /// A stored entity younger than the freshness window is returned
    /// without network activity unless `force_refresh` is set; otherwise
    /// the repository is re-fetched and upserted.
    pub async fn repository(
        &self,
        owner: &str,
        name: &str,
        force_refresh: bool,
    ) -> Result<Option<Repo>> {
        let full_name = format!("{}/{}", owner, name);

        if !force_refresh {
            if let Some(repo) = self.repos.get(&full_name)? {
                if repo.is_fresh(StorageConfig::ENTITY_FRESHNESS) {
                    debug!(full_name = %full_name, "Using stored repository");
                    return Ok(Some(repo));
                }
            }
        }

        let endpoint = format!("/repos/{}/{}", owner, name);
        let Fetched { items, error, .. } = self
            .client
            .fetch(&endpoint, &[], &FetchOptions::default())
            .await?;

        if let Some(e) = error {
            if items.is_empty() {
                return Err(e);
            }
            warn!(full_name = %full_name, error = %e, "Repository fetch degraded");
        }

        let Some(raw) = items.first() else {
            return Ok(None);
        };
        match Repo::from_raw(raw) {
            Some(mut repo) => {
                self.repos.upsert(&mut repo)?;
                Ok(Some(repo))
            }
            None => Ok(None),
        }
    }

    /// Search the locally stored repositories. No network activity.
    pub fn search_local(&self, query: &str, language: Option<&str>) -> Result<Vec<Repo>> {
        self.repos.search(query, language)
    }

    /// Aggregate statistics over the stored repositories.
    pub fn statistics(&self) -> Result<RepoStats> {
        self.repos.statistics()
    }

    /// Remove cached responses older than `max_age_days`.
    pub fn sweep_cache(&self, max_age_days: u64) -> Result<usize> {
        self.cache.sweep(max_age_days)
    }
}

/// Search responses wrap records in an `items` array; plain endpoints
/// return the record directly.
fn search_items(item: &Value) -> Vec<&Value> {
    match item.get("items").and_then(Value::as_array) {
        Some(wrapped) => wrapped.iter().collect(),
        None => vec![item],
    }
}
