use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A discovered first buyer of a token
///
/// Keyed by (address, token_id). Balances are raw base units.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Holder {
    pub address: String,
    pub token_id: i64,
    /// Post-transaction balance at the first qualifying buy
    pub initial_balance: u64,
    /// Sum over all of the holder's token accounts at the last successful refresh
    pub current_balance: u64,
    pub last_checked: DateTime<Utc>,
    /// Set when the most recent refresh failed; `current_balance` is then the prior value
    pub stale: bool,
}

impl Holder {
    /// Create a freshly discovered holder whose current balance equals the initial one
    pub fn discovered(
        address: impl Into<String>,
        token_id: i64,
        balance: u64,
        discovered_at: DateTime<Utc>,
    ) -> Self {
        Self {
            address: address.into(),
            token_id,
            initial_balance: balance,
            current_balance: balance,
            last_checked: discovered_at,
            stale: false,
        }
    }
}
