//! Signature Collector
//!
//! Pages backwards through an address's signature history. The gateway
//! returns newest-first pages; the oldest signature of each page becomes the
//! exclusive `before` cursor of the next request, so pages within one run
//! never overlap. Every run starts from the newest signature.

use std::sync::Arc;

use super::error::CrawlerError;
use super::retry::{with_retry, RetryPolicy};
use crate::ports::{LedgerPort, SignatureInfo};

/// Maximum page size accepted by the gateway
pub const DEFAULT_PAGE_SIZE: usize = 1000;

pub struct SignatureCollector<L> {
    ledger: Arc<L>,
    retry: Arc<dyn RetryPolicy>,
    page_size: usize,
}

impl<L: LedgerPort> SignatureCollector<L> {
    pub fn new(ledger: Arc<L>, retry: Arc<dyn RetryPolicy>) -> Self {
        Self {
            ledger,
            retry,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.clamp(1, DEFAULT_PAGE_SIZE);
        self
    }

    /// Lazily page through the history of `address`, newest first
    pub fn pages(&self, address: &str) -> SignaturePager<'_, L> {
        SignaturePager {
            collector: self,
            address: address.to_string(),
            cursor: None,
            done: false,
            pages_fetched: 0,
        }
    }
}

/// Cursor over one collection run
pub struct SignaturePager<'a, L> {
    collector: &'a SignatureCollector<L>,
    address: String,
    cursor: Option<String>,
    done: bool,
    pages_fetched: usize,
}

impl<L: LedgerPort> SignaturePager<'_, L> {
    /// Fetch the next page and return its successful signatures.
    ///
    /// Returns `Ok(None)` once the gateway hands back an empty page. A batch
    /// may be empty when every transaction of a page failed. After an error
    /// the pager is finished; a new run restarts from the newest signature.
    pub async fn next_batch(&mut self) -> Result<Option<Vec<SignatureInfo>>, CrawlerError> {
        if self.done {
            return Ok(None);
        }

        let ledger = &self.collector.ledger;
        let address = self.address.as_str();
        let cursor = &self.cursor;
        let limit = self.collector.page_size;

        let page = with_retry(self.collector.retry.as_ref(), "getSignaturesForAddress", || {
            ledger.signatures_for_address(address, cursor.clone(), limit)
        })
        .await;

        let page = match page {
            Ok(page) => page,
            Err(e) => {
                self.done = true;
                return Err(e);
            }
        };

        let Some(oldest) = page.last() else {
            self.done = true;
            tracing::debug!(
                "Signature history of {} exhausted after {} page(s)",
                self.address,
                self.pages_fetched
            );
            return Ok(None);
        };

        self.cursor = Some(oldest.signature.clone());
        self.pages_fetched += 1;

        let fetched = page.len();
        let batch: Vec<SignatureInfo> = page
            .into_iter()
            .filter(SignatureInfo::is_confirmed_ok)
            .collect();
        tracing::debug!(
            "Page {} for {}: {} signatures, {} failed dropped",
            self.pages_fetched,
            self.address,
            fetched,
            fetched - batch.len()
        );

        Ok(Some(batch))
    }

    /// Oldest signature seen so far
    pub fn cursor(&self) -> Option<&str> {
        self.cursor.as_deref()
    }

    pub fn pages_fetched(&self) -> usize {
        self.pages_fetched
    }
}
