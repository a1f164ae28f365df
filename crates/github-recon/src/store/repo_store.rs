//! SQLite-backed store for normalized repository entities.
//!
//! Upsert-by-full-name semantics: every successful re-fetch of the same
//! repository overwrites the stored row in place, never duplicates it.
//! Rows are never deleted by this crate.

use crate::config::StorageConfig;
use crate::models::{LanguageCount, Repo, RepoStats, StarCount};
use crate::{ReconError, Result};
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;
use std::sync::{Arc, Mutex};
use tracing::debug;

/// Entity store for repository records.
pub struct RepoStore {
    conn: Arc<Mutex<Connection>>,
}

impl RepoStore {
    /// Open the store at the given database path.
    ///
    /// Creates the database, parent directories, and tables if they don't
    /// exist.
    pub fn open(db_path: impl AsRef<Path>) -> Result<Self> {
        let db_path = db_path.as_ref();

        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| ReconError::io_with_path(e, parent))?;
        }

        let conn = Connection::open(db_path).map_err(|e| ReconError::Database {
            message: format!("Failed to open entity database: {}", e),
            source: Some(e),
        })?;

        conn.execute_batch(&format!(
            "PRAGMA journal_mode=WAL;\n\
             PRAGMA busy_timeout={};\n\
             PRAGMA synchronous=NORMAL;",
            StorageConfig::BUSY_TIMEOUT_MS,
        ))?;

        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS repos (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                owner TEXT NOT NULL,
                name TEXT NOT NULL,
                full_name TEXT UNIQUE NOT NULL,
                description TEXT NOT NULL DEFAULT '',
                url TEXT NOT NULL DEFAULT '',
                clone_url TEXT NOT NULL DEFAULT '',
                ssh_url TEXT NOT NULL DEFAULT '',
                language TEXT NOT NULL DEFAULT '',
                stars INTEGER NOT NULL DEFAULT 0,
                forks INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL DEFAULT '',
                updated_at TEXT NOT NULL DEFAULT '',
                pushed_at TEXT NOT NULL DEFAULT '',
                cached_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_repos_full_name
                ON repos(full_name);
            CREATE INDEX IF NOT EXISTS idx_repos_language
                ON repos(language);
            "#,
        )?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn lock_conn(&self) -> Result<std::sync::MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| ReconError::Database {
            message: "Failed to acquire store connection lock".to_string(),
            source: None,
        })
    }

    /// Insert or overwrite a repository, keyed on `full_name`.
    ///
    /// Stamps `cached_at` on the passed entity and returns the stored row
    /// id.
    pub fn upsert(&self, repo: &mut Repo) -> Result<i64> {
        repo.cached_at = Utc::now().to_rfc3339();

        let conn = self.lock_conn()?;
        conn.execute(
            "INSERT OR REPLACE INTO repos
             (owner, name, full_name, description, url, clone_url, ssh_url,
              language, stars, forks, created_at, updated_at, pushed_at, cached_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
            params![
                repo.owner,
                repo.name,
                repo.full_name,
                repo.description,
                repo.url,
                repo.clone_url,
                repo.ssh_url,
                repo.language,
                repo.stars,
                repo.forks,
                repo.created_at,
                repo.updated_at,
                repo.pushed_at,
                repo.cached_at,
            ],
        )?;

        debug!(full_name = %repo.full_name, "Upserted repository");
        Ok(conn.last_insert_rowid())
    }

    /// Retrieve a repository by its unique full name.
    pub fn get(&self, full_name: &str) -> Result<Option<Repo>> {
        let conn = self.lock_conn()?;
        let repo = conn
            .query_row(
                "SELECT owner, name, full_name, description, url, clone_url,
                        ssh_url, language, stars, forks, created_at,
                        updated_at, pushed_at, cached_at
                 FROM repos WHERE full_name = ?1",
                params![full_name],
                repo_from_row,
            )
            .optional()?;
        Ok(repo)
    }

    /// Search stored repositories by substring in full name or description,
    /// optionally filtered by language, ordered by stars descending and
    /// bounded to a fixed page size.
    pub fn search(&self, query: &str, language: Option<&str>) -> Result<Vec<Repo>> {
        let pattern = format!("%{}%", query);
        let conn = self.lock_conn()?;

        let mut sql = String::from(
            "SELECT owner, name, full_name, description, url, clone_url,
                    ssh_url, language, stars, forks, created_at,
                    updated_at, pushed_at, cached_at
             FROM repos
             WHERE (full_name LIKE ?1 OR description LIKE ?1)",
        );
        if language.is_some() {
            sql.push_str(" AND language = ?2");
        }
        sql.push_str(" ORDER BY stars DESC LIMIT ");
        sql.push_str(&StorageConfig::SEARCH_PAGE_SIZE.to_string());

        let mut stmt = conn.prepare(&sql)?;
        let rows = match language {
            Some(language) => stmt.query_map(params![pattern, language], repo_from_row)?,
            None => stmt.query_map(params![pattern], repo_from_row)?,
        };

        let mut repos = Vec::new();
        for row in rows {
            repos.push(row?);
        }
        Ok(repos)
    }

    /// Aggregate statistics over the stored repositories.
    pub fn statistics(&self) -> Result<RepoStats> {
        let conn = self.lock_conn()?;

        let total: i64 = conn.query_row("SELECT COUNT(*) FROM repos", [], |row| row.get(0))?;

        let mut stmt = conn.prepare(
            "SELECT language, COUNT(*) as count
             FROM repos
             WHERE language != ''
             GROUP BY language
             ORDER BY count DESC
             LIMIT 10",
        )?;
        let top_languages = stmt
            .query_map([], |row| {
                Ok(LanguageCount {
                    language: row.get(0)?,
                    count: row.get::<_, i64>(1)? as u64,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let mut stmt = conn.prepare(
            "SELECT full_name, stars
             FROM repos
             ORDER BY stars DESC
             LIMIT 10",
        )?;
        let most_starred = stmt
            .query_map([], |row| {
                Ok(StarCount {
                    full_name: row.get(0)?,
                    stars: row.get(1)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(RepoStats {
            total: total as u64,
            top_languages,
            most_starred,
        })
    }
}

fn repo_from_row(row: &Row<'_>) -> rusqlite::Result<Repo> {
    Ok(Repo {
        owner: row.get(0)?,
        name: row.get(1)?,
        full_name: row.get(2)?,
        description: row.get(3)?,
        url: row.get(4)?,
        clone_url: row.get(5)?,
        ssh_url: row.get(6)?,
        language: row.get(7)?,
        stars: row.get(8)?,
        forks: row.get(9)?,
        created_at: row.get(10)?,
        updated_at: row.get(11)?,
        pushed_at: row.get(12)?,
        cached_at: row.get(13)?,
    })
}
