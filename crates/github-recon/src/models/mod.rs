//! Data types for normalized GitHub records.

mod repo;

pub use repo::{LanguageCount, Repo, RepoStats, StarCount};
