use thiserror::Error;

use crate::ports::{LedgerError, StorageError};

/// Errors surfaced by crawler components to their caller
#[derive(Debug, Error)]
pub enum CrawlerError {
    /// Gateway call failed permanently, or stayed transient through every attempt
    #[error("{operation} failed after {attempts} attempt(s): {source}")]
    Rpc {
        operation: &'static str,
        attempts: u32,
        #[source]
        source: LedgerError,
    },

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Not a token mint: {0}")]
    NotAToken(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid account data: {0}")]
    InvalidAccountData(String),

    #[error("Balance of {0} exceeds u64")]
    BalanceOverflow(String),
}

impl CrawlerError {
    /// The underlying gateway error, if this failure came from the ledger
    pub fn ledger_error(&self) -> Option<&LedgerError> {
        match self {
            CrawlerError::Rpc { source, .. } => Some(source),
            _ => None,
        }
    }
}
