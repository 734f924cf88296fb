//! SQLite Storage Adapter
//!
//! Persists tokens, signatures and holders with the uniqueness constraints
//! the crawler relies on for idempotent re-runs.

mod store;

pub use store::SqliteStore;
