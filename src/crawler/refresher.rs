//! Balance Refresher
//!
//! Re-reads the current balance of known holders. A holder's balance is the
//! sum over every token account it owns for the mint, since balances may
//! move between accounts after the first buy.
//!
//! Each holder gets its own outcome. A holder whose lookups fail keeps a
//! `Failed` entry instead of a zero balance, and never stops the others.

use std::sync::Arc;

use super::error::CrawlerError;
use super::retry::{with_retry, RetryPolicy};
use crate::ports::LedgerPort;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BalanceOutcome {
    /// Summed balance across all of the holder's token accounts
    Current(u64),
    /// Lookup failed; the reason is kept for logs
    Failed(String),
}

impl BalanceOutcome {
    pub fn balance(&self) -> Option<u64> {
        match self {
            BalanceOutcome::Current(amount) => Some(*amount),
            BalanceOutcome::Failed(_) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HolderRefresh {
    pub address: String,
    pub outcome: BalanceOutcome,
}

pub struct BalanceRefresher<L> {
    ledger: Arc<L>,
    retry: Arc<dyn RetryPolicy>,
}

impl<L: LedgerPort> BalanceRefresher<L> {
    pub fn new(ledger: Arc<L>, retry: Arc<dyn RetryPolicy>) -> Self {
        Self { ledger, retry }
    }

    /// One outcome per input address, in input order
    pub async fn refresh(&self, mint: &str, holders: &[String]) -> Vec<HolderRefresh> {
        let mut results = Vec::with_capacity(holders.len());

        for address in holders {
            let outcome = match self.current_balance(mint, address).await {
                Ok(amount) => BalanceOutcome::Current(amount),
                Err(e) => {
                    tracing::warn!("Balance refresh failed for {}: {}", address, e);
                    BalanceOutcome::Failed(e.to_string())
                }
            };
            results.push(HolderRefresh {
                address: address.clone(),
                outcome,
            });
        }

        results
    }

    /// Sum of all token accounts `owner` holds for `mint`
    pub async fn current_balance(&self, mint: &str, owner: &str) -> Result<u64, CrawlerError> {
        let ledger = &self.ledger;
        let accounts = with_retry(self.retry.as_ref(), "getTokenAccountsByOwner", || {
            ledger.token_accounts_by_owner(owner, mint)
        })
        .await?;

        let mut total: u64 = 0;
        for account in &accounts {
            let amount = with_retry(self.retry.as_ref(), "getTokenAccountBalance", || {
                ledger.token_account_balance(account)
            })
            .await?;
            total = total
                .checked_add(amount)
                .ok_or_else(|| CrawlerError::BalanceOverflow(owner.to_string()))?;
        }

        tracing::debug!("{} holds {} across {} account(s)", owner, total, accounts.len());
        Ok(total)
    }
}
