//! Ledger Port
//!
//! Capability surface of the remote RPC gateway consumed by the crawler.

use async_trait::async_trait;
use thiserror::Error;

#[cfg(test)]
use mockall::automock;

use super::models::{SignatureInfo, TransactionRecord};

/// Ledger gateway error type
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    #[error("Rate limited by RPC endpoint")]
    RateLimited,

    #[error("RPC request timed out")]
    Timeout,

    #[error("Network error: {0}")]
    Network(String),

    #[error("Invalid parameters: {0}")]
    InvalidParams(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("RPC error: {0}")]
    Rpc(String),

    #[error("Failed to parse response: {0}")]
    Parse(String),
}

impl LedgerError {
    /// Whether a single retry after a pause is worth attempting
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            LedgerError::RateLimited | LedgerError::Timeout | LedgerError::Network(_)
        )
    }
}

/// Ledger RPC gateway
#[cfg_attr(test, automock)]
#[async_trait]
pub trait LedgerPort: Send + Sync {
    /// Signatures touching `address`, newest first, strictly older than `before`
    async fn signatures_for_address(
        &self,
        address: &str,
        before: Option<String>,
        limit: usize,
    ) -> Result<Vec<SignatureInfo>, LedgerError>;

    /// Full transaction by signature
    async fn transaction(&self, signature: &str) -> Result<TransactionRecord, LedgerError>;

    /// Raw account payload
    async fn account_data(&self, address: &str) -> Result<Vec<u8>, LedgerError>;

    /// Token accounts of `owner` holding `mint`
    async fn token_accounts_by_owner(
        &self,
        owner: &str,
        mint: &str,
    ) -> Result<Vec<String>, LedgerError>;

    /// Balance of one token account in base units
    async fn token_account_balance(&self, account: &str) -> Result<u64, LedgerError>;

    /// Total supply of a mint; `NotFound` or `InvalidParams` when the address is not a mint
    async fn token_supply(&self, mint: &str) -> Result<u64, LedgerError>;
}
