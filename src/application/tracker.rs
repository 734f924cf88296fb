//! Token Tracker
//!
//! Coordinates the crawler components with storage: onboarding a token,
//! collecting its signature history, discovering its first buyers and
//! periodically refreshing their balances.
//!
//! Every write goes through the store's uniqueness constraints, so
//! overlapping runs for the same token are safe: duplicates are counted
//! and skipped, never fatal.

use std::slice;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::{Notify, RwLock};

use crate::crawler::{
    with_retry, BalanceOutcome, BalanceRefresher, CrawlerError, DeployLocator, HolderDiscoverer,
    RetryPolicy, SignatureCollector, DEFAULT_HOLDER_QUOTA, DEFAULT_PAGE_SIZE,
};
use crate::domain::{authority_from_mint_data, sort_chronologically, Holder, SignatureRecord, Token};
use crate::ports::{LedgerPort, StoragePort};

/// Tunables of the crawler pipeline
#[derive(Debug, Clone)]
pub struct TrackerSettings {
    pub page_size: usize,
    pub holder_quota: usize,
    pub refresh_interval: Duration,
}

impl Default for TrackerSettings {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            holder_quota: DEFAULT_HOLDER_QUOTA,
            refresh_interval: Duration::from_secs(300),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CollectSummary {
    pub pages: usize,
    /// Successful signatures yielded by the collector
    pub fetched: usize,
    pub inserted: usize,
    /// Signatures already stored by an earlier or concurrent run
    pub duplicates: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiscoverySummary {
    pub scanned: usize,
    pub found: usize,
    pub inserted: usize,
    pub duplicates: usize,
    /// Holders found but rejected by the store; logged and skipped
    pub failed: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RefreshSummary {
    pub refreshed: usize,
    /// Holders whose lookup or write failed; their prior balance is kept and flagged stale
    pub failed: usize,
}

/// Holder tracking pipeline over a ledger and a store
pub struct TokenTracker<L, S> {
    ledger: Arc<L>,
    store: Arc<S>,
    retry: Arc<dyn RetryPolicy>,
    collector: Arc<SignatureCollector<L>>,
    discoverer: Arc<HolderDiscoverer<L>>,
    refresher: Arc<BalanceRefresher<L>>,
    locator: Arc<DeployLocator<L>>,
    settings: TrackerSettings,
    is_running: Arc<RwLock<bool>>,
    /// Wakes the refresh loop out of its interval sleep
    shutdown: Arc<Notify>,
}

impl<L, S> TokenTracker<L, S>
where
    L: LedgerPort + 'static,
    S: StoragePort + 'static,
{
    pub fn new(
        ledger: Arc<L>,
        store: Arc<S>,
        retry: Arc<dyn RetryPolicy>,
        settings: TrackerSettings,
    ) -> Self {
        let collector = SignatureCollector::new(Arc::clone(&ledger), Arc::clone(&retry))
            .with_page_size(settings.page_size);
        let discoverer = HolderDiscoverer::new(Arc::clone(&ledger), Arc::clone(&retry))
            .with_quota(settings.holder_quota);
        let refresher = BalanceRefresher::new(Arc::clone(&ledger), Arc::clone(&retry));
        let locator = DeployLocator::new(Arc::clone(&ledger), Arc::clone(&retry));

        Self {
            ledger,
            store,
            retry,
            collector: Arc::new(collector),
            discoverer: Arc::new(discoverer),
            refresher: Arc::new(refresher),
            locator: Arc::new(locator),
            settings,
            is_running: Arc::new(RwLock::new(false)),
            shutdown: Arc::new(Notify::new()),
        }
    }

    /// Register a token, validating first that the address is a mint.
    ///
    /// Already registered tokens are returned without touching the ledger.
    pub async fn onboard(&self, address: &str) -> Result<Token, CrawlerError> {
        if let Some(token) = self.store.find_token(address)? {
            return Ok(token);
        }

        let ledger = &self.ledger;
        let supply = with_retry(self.retry.as_ref(), "getTokenSupply", || {
            ledger.token_supply(address)
        })
        .await;
        match supply {
            Ok(supply) => tracing::debug!("{} is a mint with supply {}", address, supply),
            Err(CrawlerError::Rpc { source, .. }) if !source.is_transient() => {
                tracing::error!("{} is not a token mint: {}", address, source);
                return Err(CrawlerError::NotAToken(format!("{}: {}", address, source)));
            }
            Err(e) => return Err(e),
        }

        let token = self.store.get_or_create_token(address)?;
        tracing::info!("Tracking token {} as #{}", token.address, token.id);
        Ok(token)
    }

    /// Read the mint account and store its update authority
    pub async fn resolve_update_authority(&self, address: &str) -> Result<String, CrawlerError> {
        let token = self.require_token(address)?;
        tracing::info!("Searching update authority for {}...", token.address);

        let ledger = &self.ledger;
        let data = with_retry(self.retry.as_ref(), "getAccountInfo", || {
            ledger.account_data(&token.address)
        })
        .await?;
        let authority = authority_from_mint_data(&data)
            .map_err(|e| CrawlerError::InvalidAccountData(format!("{}: {}", token.address, e)))?;

        self.store.set_update_authority(token.id, &authority)?;
        tracing::info!("Update authority of {}: {}", token.address, authority);
        Ok(authority)
    }

    /// Find and store the mint initialization signature
    pub async fn locate_deploy_signature(
        &self,
        address: &str,
    ) -> Result<Option<String>, CrawlerError> {
        let token = self.require_token(address)?;
        let authority = match token.update_authority.clone() {
            Some(authority) => authority,
            None => self.resolve_update_authority(address).await?,
        };

        let found = self.locator.locate(&token.address, &authority).await?;
        if let Some(signature) = &found {
            self.store.set_deploy_signature(token.id, signature)?;
        }
        Ok(found)
    }

    /// Page through the whole signature history and persist every batch
    pub async fn collect_signatures(&self, address: &str) -> Result<CollectSummary, CrawlerError> {
        let token = self.require_token(address)?;
        let mut summary = CollectSummary::default();
        let mut pager = self.collector.pages(&token.address);

        while let Some(batch) = pager.next_batch().await? {
            summary.pages += 1;
            summary.fetched += batch.len();

            let records: Vec<SignatureRecord> = batch
                .into_iter()
                .map(|s| SignatureRecord::new(s.signature, s.slot, s.block_time, token.id))
                .collect();
            let (inserted, duplicates) = self.persist_signatures(&records)?;
            summary.inserted += inserted;
            summary.duplicates += duplicates;

            tracing::info!(
                "{}: page {} stored {} new, {} known ({} total)",
                token.address,
                summary.pages,
                inserted,
                duplicates,
                summary.fetched
            );
        }

        Ok(summary)
    }

    /// Insert a batch; if it conflicts, fall back to row-by-row so the
    /// disjoint remainder still lands. Returns (inserted, duplicates).
    fn persist_signatures(
        &self,
        records: &[SignatureRecord],
    ) -> Result<(usize, usize), CrawlerError> {
        if records.is_empty() {
            return Ok((0, 0));
        }

        match self.store.insert_signatures(records) {
            Ok(inserted) => Ok((inserted, 0)),
            Err(e) if e.is_duplicate() => {
                tracing::debug!(
                    "Batch of {} rejected ({}), inserting row by row",
                    records.len(),
                    e
                );
                let (mut inserted, mut duplicates) = (0, 0);
                for record in records {
                    match self.store.insert_signatures(slice::from_ref(record)) {
                        Ok(n) => inserted += n,
                        Err(e) if e.is_duplicate() => duplicates += 1,
                        Err(e) => return Err(e.into()),
                    }
                }
                Ok((inserted, duplicates))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Discover first buyers from the stored history, oldest transaction first
    pub async fn discover_holders(&self, address: &str) -> Result<DiscoverySummary, CrawlerError> {
        let token = self.require_token(address)?;
        let mut summary = DiscoverySummary::default();

        let known = self.store.holders(token.id)?.len();
        if known >= self.discoverer.quota() {
            tracing::info!("{} already has {} holders, skipping discovery", token.address, known);
            return Ok(summary);
        }

        let mut records = self.store.signatures_chronological(token.id)?;
        sort_chronologically(&mut records);
        let signatures: Vec<String> = records
            .into_iter()
            .map(|record| record.signature)
            .collect();
        tracing::info!(
            "Scanning {} stored signatures of {} for holders",
            signatures.len(),
            token.address
        );

        let outcome = self.discoverer.discover(&token.address, &signatures).await?;
        summary.scanned = outcome.scanned;
        summary.found = outcome.holders.len();

        let discovered_at = Utc::now();
        for found in outcome.holders {
            let holder =
                Holder::discovered(found.address, token.id, found.initial_balance, discovered_at);
            match self.store.insert_holder(&holder) {
                Ok(()) => summary.inserted += 1,
                Err(e) if e.is_duplicate() => summary.duplicates += 1,
                Err(e) => {
                    tracing::warn!(
                        "Could not store holder {} of {}: {}",
                        holder.address,
                        token.address,
                        e
                    );
                    summary.failed += 1;
                }
            }
        }

        Ok(summary)
    }

    /// Re-read every stored holder's balance
    pub async fn refresh_balances(&self, address: &str) -> Result<RefreshSummary, CrawlerError> {
        let token = self.require_token(address)?;
        let addresses: Vec<String> = self
            .store
            .holders(token.id)?
            .into_iter()
            .map(|holder| holder.address)
            .collect();

        let mut summary = RefreshSummary::default();
        for result in self.refresher.refresh(&token.address, &addresses).await {
            let checked_at = Utc::now();
            let reason = match result.outcome {
                BalanceOutcome::Current(balance) => {
                    match self.store.update_holder_balance(
                        &result.address,
                        token.id,
                        balance,
                        checked_at,
                    ) {
                        Ok(()) => {
                            summary.refreshed += 1;
                            continue;
                        }
                        Err(e) => format!("storing balance {} failed: {}", balance, e),
                    }
                }
                BalanceOutcome::Failed(reason) => reason,
            };

            tracing::warn!(
                "Keeping previous balance of {} for {}: {}",
                result.address,
                token.address,
                reason
            );
            if let Err(e) = self.store.mark_holder_stale(&result.address, token.id, checked_at) {
                tracing::warn!("Could not flag {} as stale: {}", result.address, e);
            }
            summary.failed += 1;
        }

        tracing::info!(
            "Refreshed {} holder(s) of {}, {} failed",
            summary.refreshed,
            token.address,
            summary.failed
        );
        Ok(summary)
    }

    /// Stored holders of a registered token, in discovery order
    pub fn holders(&self, address: &str) -> Result<(Token, Vec<Holder>), CrawlerError> {
        let token = self.require_token(address)?;
        let holders = self.store.holders(token.id)?;
        Ok((token, holders))
    }

    pub fn tracked_tokens(&self) -> Result<Vec<Token>, CrawlerError> {
        Ok(self.store.list_tokens()?)
    }

    /// Full onboarding: register, resolve the authority, collect history, discover holders
    pub async fn track(&self, address: &str) -> Result<DiscoverySummary, CrawlerError> {
        let token = self.onboard(address).await?;

        if token.update_authority.is_none() {
            if let Err(e) = self.resolve_update_authority(address).await {
                tracing::warn!("Could not resolve update authority of {}: {}", address, e);
            }
        }

        let collected = self.collect_signatures(address).await?;
        tracing::info!(
            "Collected {} signatures of {} ({} new)",
            collected.fetched,
            address,
            collected.inserted
        );

        self.discover_holders(address).await
    }

    /// Refresh every registered token each interval until `stop` is called
    pub async fn run_refresh_loop(&self) -> Result<(), CrawlerError> {
        *self.is_running.write().await = true;
        tracing::info!("Starting refresh loop, interval {:?}", self.settings.refresh_interval);

        while *self.is_running.read().await {
            if let Err(e) = self.refresh_all().await {
                tracing::error!("Refresh cycle error: {}", e);
                // Continue running despite errors
            }
            tokio::select! {
                _ = tokio::time::sleep(self.settings.refresh_interval) => {}
                _ = self.shutdown.notified() => {}
            }
        }

        tracing::info!("Refresh loop stopped");
        Ok(())
    }

    async fn refresh_all(&self) -> Result<(), CrawlerError> {
        for token in self.store.list_tokens()? {
            if !*self.is_running.read().await {
                break;
            }
            if let Err(e) = self.refresh_balances(&token.address).await {
                tracing::error!("Refresh of {} failed: {}", token.address, e);
            }
        }
        Ok(())
    }

    pub async fn stop(&self) {
        *self.is_running.write().await = false;
        self.shutdown.notify_one();
        tracing::info!("Stop signal sent to refresh loop");
    }

    pub async fn is_running(&self) -> bool {
        *self.is_running.read().await
    }

    fn require_token(&self, address: &str) -> Result<Token, CrawlerError> {
        self.store
            .find_token(address)?
            .ok_or_else(|| CrawlerError::NotFound(format!("token {}", address)))
    }
}

impl<L, S> Clone for TokenTracker<L, S> {
    fn clone(&self) -> Self {
        Self {
            ledger: Arc::clone(&self.ledger),
            store: Arc::clone(&self.store),
            retry: Arc::clone(&self.retry),
            collector: Arc::clone(&self.collector),
            discoverer: Arc::clone(&self.discoverer),
            refresher: Arc::clone(&self.refresher),
            locator: Arc::clone(&self.locator),
            settings: self.settings.clone(),
            is_running: Arc::clone(&self.is_running),
            shutdown: Arc::clone(&self.shutdown),
        }
    }
}
