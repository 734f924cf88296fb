//! Deploy Locator
//!
//! Finds the transaction that initialized a mint by scanning the newest
//! page of its update authority's history for an SPL Token
//! `InitializeMint` instruction that references the mint.

use std::sync::Arc;

use super::collector::DEFAULT_PAGE_SIZE;
use super::error::CrawlerError;
use super::retry::{with_retry, RetryPolicy};
use crate::ports::{LedgerPort, TransactionRecord};

/// SPL Token program
pub const SPL_TOKEN_PROGRAM_ID: &str = "TokenkegQfeZyiNwAJbNbGKPFXCWuBvf9Ss623VQ5DA";

/// Log line prefix emitted for both InitializeMint and InitializeMint2
pub const INITIALIZE_MINT_LOG: &str = "Instruction: InitializeMint";

pub struct DeployLocator<L> {
    ledger: Arc<L>,
    retry: Arc<dyn RetryPolicy>,
}

impl<L: LedgerPort> DeployLocator<L> {
    pub fn new(ledger: Arc<L>, retry: Arc<dyn RetryPolicy>) -> Self {
        Self { ledger, retry }
    }

    /// Signature of the mint initialization, if it is within the authority's newest page
    pub async fn locate(
        &self,
        mint: &str,
        authority: &str,
    ) -> Result<Option<String>, CrawlerError> {
        let ledger = &self.ledger;
        let page = with_retry(self.retry.as_ref(), "getSignaturesForAddress", || {
            ledger.signatures_for_address(authority, None, DEFAULT_PAGE_SIZE)
        })
        .await?;

        for info in page.iter().filter(|s| s.is_confirmed_ok()) {
            let tx = with_retry(self.retry.as_ref(), "getTransaction", || {
                ledger.transaction(&info.signature)
            })
            .await?;

            if is_mint_initialization(&tx, mint) {
                tracing::info!("Mint {} initialized in {}", mint, info.signature);
                return Ok(Some(info.signature.clone()));
            }
        }

        tracing::info!(
            "No initialization of {} among {} signatures of {}",
            mint,
            page.len(),
            authority
        );
        Ok(None)
    }
}

fn is_mint_initialization(tx: &TransactionRecord, mint: &str) -> bool {
    !tx.is_failed()
        && tx.log_messages.iter().any(|line| line.contains(INITIALIZE_MINT_LOG))
        && tx.account_keys.iter().any(|key| key == mint)
        && tx.account_keys.iter().any(|key| key == SPL_TOKEN_PROGRAM_ID)
}
