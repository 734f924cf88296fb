//! Holder Discoverer
//!
//! Walks a mint's transactions in the order given and records the first
//! `quota` distinct owners that bought the token with a transaction they
//! signed themselves. Callers must pass signatures oldest-first
//! (see `StoragePort::signatures_chronological`) for "first buyer" to mean
//! the earliest buyer on the ledger; membership and order of the result
//! follow the input order exactly.

use std::collections::HashSet;
use std::sync::Arc;

use super::error::CrawlerError;
use super::retry::{with_retry, RetryPolicy};
use crate::domain::self_funded_buys;
use crate::ports::LedgerPort;

/// Number of first buyers tracked per token
pub const DEFAULT_HOLDER_QUOTA: usize = 50;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredHolder {
    pub address: String,
    /// Post-transaction balance of the first qualifying buy
    pub initial_balance: u64,
    /// Transaction of that buy
    pub signature: String,
}

#[derive(Debug, Clone, Default)]
pub struct DiscoveryOutcome {
    /// Holders in discovery order, at most `quota`
    pub holders: Vec<DiscoveredHolder>,
    /// Transactions fetched
    pub scanned: usize,
    /// Fetched transactions the ledger marked as failed
    pub skipped_failed: usize,
}

pub struct HolderDiscoverer<L> {
    ledger: Arc<L>,
    retry: Arc<dyn RetryPolicy>,
    quota: usize,
}

impl<L: LedgerPort> HolderDiscoverer<L> {
    pub fn new(ledger: Arc<L>, retry: Arc<dyn RetryPolicy>) -> Self {
        Self {
            ledger,
            retry,
            quota: DEFAULT_HOLDER_QUOTA,
        }
    }

    pub fn with_quota(mut self, quota: usize) -> Self {
        self.quota = quota;
        self
    }

    pub fn quota(&self) -> usize {
        self.quota
    }

    /// Scan `signatures` in order until `quota` holders are found or the input ends.
    ///
    /// A fatal gateway error aborts the whole call; no partial outcome is returned.
    pub async fn discover(
        &self,
        mint: &str,
        signatures: &[String],
    ) -> Result<DiscoveryOutcome, CrawlerError> {
        let mut outcome = DiscoveryOutcome::default();
        if self.quota == 0 {
            return Ok(outcome);
        }
        let mut seen: HashSet<String> = HashSet::new();

        for signature in signatures {
            let ledger = &self.ledger;
            let tx = with_retry(self.retry.as_ref(), "getTransaction", || {
                ledger.transaction(signature)
            })
            .await?;
            outcome.scanned += 1;

            if tx.is_failed() {
                outcome.skipped_failed += 1;
                continue;
            }

            for (owner, balance) in self_funded_buys(&tx, mint) {
                if !seen.insert(owner.clone()) {
                    continue;
                }
                tracing::debug!("Holder #{} of {}: {} ({})", seen.len(), mint, owner, balance);
                outcome.holders.push(DiscoveredHolder {
                    address: owner,
                    initial_balance: balance,
                    signature: signature.clone(),
                });

                if outcome.holders.len() >= self.quota {
                    tracing::info!(
                        "Holder quota {} reached for {} after {} transactions",
                        self.quota,
                        mint,
                        outcome.scanned
                    );
                    return Ok(outcome);
                }
            }
        }

        tracing::info!(
            "Found {} holder(s) for {} in {} transactions",
            outcome.holders.len(),
            mint,
            outcome.scanned
        );
        Ok(outcome)
    }
}
