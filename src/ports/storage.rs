//! Storage Port
//!
//! Append-only persistence of tokens, signatures and holders. Every write is
//! keyed by its natural unique key (signature string; address + token id),
//! so overlapping or concurrent crawler runs are absorbed by uniqueness
//! constraints instead of locks.

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::domain::{Holder, SignatureRecord, Token};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StorageError {
    /// A uniqueness constraint rejected the write; nothing from the write was applied
    #[error("Duplicate {table} row: {key}")]
    Duplicate { table: &'static str, key: String },

    #[error("{0} not found")]
    NotFound(String),

    #[error("Value out of range: {0}")]
    OutOfRange(String),

    #[error("Database error: {0}")]
    Database(String),
}

impl StorageError {
    pub fn is_duplicate(&self) -> bool {
        matches!(self, StorageError::Duplicate { .. })
    }
}

pub trait StoragePort: Send + Sync {
    /// Return the token with this address, inserting it first if needed
    fn get_or_create_token(&self, address: &str) -> Result<Token, StorageError>;

    fn find_token(&self, address: &str) -> Result<Option<Token>, StorageError>;

    fn list_tokens(&self) -> Result<Vec<Token>, StorageError>;

    fn set_update_authority(&self, token_id: i64, authority: &str) -> Result<(), StorageError>;

    fn set_deploy_signature(&self, token_id: i64, signature: &str) -> Result<(), StorageError>;

    /// Insert a batch as one unit. On any duplicate the whole batch is
    /// rolled back and `Duplicate` names the first conflicting signature.
    fn insert_signatures(&self, batch: &[SignatureRecord]) -> Result<usize, StorageError>;

    /// Stored signatures of a token, oldest first (slot, then signature)
    fn signatures_chronological(&self, token_id: i64) -> Result<Vec<SignatureRecord>, StorageError>;

    fn insert_holder(&self, holder: &Holder) -> Result<(), StorageError>;

    /// Holders of a token in discovery order
    fn holders(&self, token_id: i64) -> Result<Vec<Holder>, StorageError>;

    /// Record a fresh balance and clear the stale flag
    fn update_holder_balance(
        &self,
        address: &str,
        token_id: i64,
        balance: u64,
        checked_at: DateTime<Utc>,
    ) -> Result<(), StorageError>;

    /// Flag a holder whose refresh failed, keeping its prior balance
    fn mark_holder_stale(
        &self,
        address: &str,
        token_id: i64,
        checked_at: DateTime<Utc>,
    ) -> Result<(), StorageError>;
}
