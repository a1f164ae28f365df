//! SQLite persistence: response cache and entity store.
//!
//! Both stores own their connection behind `Arc<Mutex<_>>` and run in WAL
//! mode, so concurrent readers and writers across connections are safe.
//! All writes are idempotent single-row upserts keyed by signature or
//! full name.

mod repo_store;
mod response_cache;

pub use repo_store::RepoStore;
pub use response_cache::{request_signature, ResponseCache};
