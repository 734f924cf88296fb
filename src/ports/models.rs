//! Ledger Models
//!
//! Protocol-neutral views of what the RPC gateway returns.

use serde::{Deserialize, Serialize};

/// One entry of a reverse-chronological signature page
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignatureInfo {
    pub signature: String,
    pub slot: u64,
    pub block_time: Option<i64>,
    /// Ledger-reported error, set for failed transactions
    pub err: Option<String>,
}

impl SignatureInfo {
    pub fn is_confirmed_ok(&self) -> bool {
        self.err.is_none()
    }
}

/// Token balance of one account owner for one mint, in base units
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenBalanceEntry {
    pub owner: String,
    pub mint: String,
    pub amount: u64,
}

/// A fetched transaction reduced to what the crawler reads
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionRecord {
    pub signature: String,
    pub slot: u64,
    /// Static account keys in message order; index 0 is the fee payer
    pub account_keys: Vec<String>,
    pub err: Option<String>,
    pub pre_token_balances: Vec<TokenBalanceEntry>,
    pub post_token_balances: Vec<TokenBalanceEntry>,
    pub log_messages: Vec<String>,
}

impl TransactionRecord {
    /// The fee payer, which is always the first signer
    pub fn primary_signer(&self) -> Option<&str> {
        self.account_keys.first().map(String::as_str)
    }

    pub fn is_failed(&self) -> bool {
        self.err.is_some()
    }
}
