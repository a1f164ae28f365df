//! Repository entity and payload normalization.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

/// A normalized GitHub repository record.
///
/// `full_name` is the unique key and is always derived as
/// `owner + "/" + name` at normalization time, regardless of what the raw
/// payload's own `full_name` field says.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Repo {
    pub owner: String,
    pub name: String,
    pub full_name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub clone_url: String,
    #[serde(default)]
    pub ssh_url: String,
    #[serde(default)]
    pub language: String,
    #[serde(default)]
    pub stars: i64,
    #[serde(default)]
    pub forks: i64,
    #[serde(default)]
    pub created_at: String,
    #[serde(default)]
    pub updated_at: String,
    #[serde(default)]
    pub pushed_at: String,
    /// Set by the store on upsert.
    #[serde(default)]
    pub cached_at: String,
}

impl Repo {
    /// Normalize a raw API record into an entity.
    ///
    /// Returns `None` only when the identifying fields (`owner.login`,
    /// `name`) are missing. Every other field falls back to an explicit
    /// default so partial payloads never fail normalization.
    pub fn from_raw(raw: &Value) -> Option<Self> {
        let owner = raw
            .get("owner")
            .and_then(|o| o.get("login"))
            .and_then(Value::as_str)?
            .to_string();
        let name = raw.get("name").and_then(Value::as_str)?.to_string();
        let full_name = format!("{}/{}", owner, name);

        Some(Self {
            owner,
            name,
            full_name,
            description: str_field(raw, "description"),
            url: str_field(raw, "html_url"),
            clone_url: str_field(raw, "clone_url"),
            ssh_url: str_field(raw, "ssh_url"),
            language: str_field(raw, "language"),
            stars: int_field(raw, "stargazers_count"),
            forks: int_field(raw, "forks_count"),
            created_at: str_field(raw, "created_at"),
            updated_at: str_field(raw, "updated_at"),
            pushed_at: str_field(raw, "pushed_at"),
            cached_at: String::new(),
        })
    }

    /// Check whether the stored copy is within the caller's age window.
    ///
    /// An empty or unparseable `cached_at` counts as stale.
    pub fn is_fresh(&self, max_age: Duration) -> bool {
        let Ok(cached_at) = DateTime::parse_from_rfc3339(&self.cached_at) else {
            return false;
        };
        let age = Utc::now().signed_duration_since(cached_at.with_timezone(&Utc));
        age.num_seconds() >= 0 && (age.num_seconds() as u64) < max_age.as_secs()
    }
}

fn str_field(raw: &Value, key: &str) -> String {
    raw.get(key)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

fn int_field(raw: &Value, key: &str) -> i64 {
    raw.get(key).and_then(Value::as_i64).unwrap_or_default()
}

/// Language frequency entry for [`RepoStats`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LanguageCount {
    pub language: String,
    pub count: u64,
}

/// Star-count entry for [`RepoStats`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StarCount {
    pub full_name: String,
    pub stars: i64,
}

/// Aggregate statistics over the stored repositories.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepoStats {
    pub total: u64,
    /// Top 10 languages by frequency.
    pub top_languages: Vec<LanguageCount>,
    /// Top 10 repositories by stars.
    pub most_starred: Vec<StarCount>,
}
