//! Token Tracker Integration Tests
//!
//! Integration tests that drive the whole pipeline against a scripted ledger
//! and a real in-memory SQLite store:
//! 1. Onboarding and update authority resolution
//! 2. Signature collection, including re-runs and overlapping batches
//! 3. First-buyer discovery in chronological order
//! 4. Balance refresh with failed lookups kept as stale
//! 5. Per-holder storage failures that must not stop the rest of a run
//!
//! All tests are deterministic (no real network calls).

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};

use holder_crawler::adapters::SqliteStore;
use holder_crawler::application::{TokenTracker, TrackerSettings};
use holder_crawler::crawler::{CrawlerError, FixedDelay, RetryPolicy};
use holder_crawler::domain::{Holder, RetentionStatus, RetentionSummary, SignatureRecord, Token};
use holder_crawler::ports::mocks::{self, MockLedger};
use holder_crawler::ports::{
    LedgerError, SignatureInfo, StorageError, StoragePort, TokenBalanceEntry, TransactionRecord,
};

// ============================================================================
// Test Fixtures
// ============================================================================

const MINT: &str = "Mint1111111111111111111111111111111111111111";
const TOKEN_PROGRAM: &str = "TokenkegQfeZyiNwAJbNbGKPFXCWuBvf9Ss623VQ5DA";

fn no_wait() -> Arc<dyn RetryPolicy> {
    Arc::new(FixedDelay {
        delay: Duration::ZERO,
        max_attempts: 2,
    })
}

fn sig(signature: &str, slot: u64, err: Option<&str>) -> SignatureInfo {
    SignatureInfo {
        signature: signature.to_string(),
        slot,
        block_time: Some(1_700_000_000 + slot as i64),
        err: err.map(str::to_string),
    }
}

fn entry(owner: &str, amount: u64) -> TokenBalanceEntry {
    TokenBalanceEntry {
        owner: owner.to_string(),
        mint: MINT.to_string(),
        amount,
    }
}

/// A successful transaction signed by `signer`
fn buy(
    signature: &str,
    slot: u64,
    signer: &str,
    pre: Vec<TokenBalanceEntry>,
    post: Vec<TokenBalanceEntry>,
) -> TransactionRecord {
    TransactionRecord {
        signature: signature.to_string(),
        slot,
        account_keys: vec![signer.to_string(), MINT.to_string()],
        err: None,
        pre_token_balances: pre,
        post_token_balances: post,
        log_messages: Vec::new(),
    }
}

/// Mint with four history entries, newest first:
/// s4 (A buys again), s3 (B buys, C receives), s2 (failed), s1 (A buys first)
fn launched_token() -> MockLedger {
    MockLedger::new()
        .with_supply(MINT, 1_000_000_000)
        .with_history(
            MINT,
            vec![
                sig("s4", 40, None),
                sig("s3", 30, None),
                sig("s2", 20, Some("InstructionError")),
                sig("s1", 10, None),
            ],
        )
        .with_transaction(buy("s1", 10, "A", vec![], vec![entry("A", 100)]))
        .with_transaction(buy(
            "s3",
            30,
            "B",
            vec![entry("A", 100)],
            vec![entry("A", 100), entry("B", 50), entry("C", 10)],
        ))
        .with_transaction(buy(
            "s4",
            40,
            "A",
            vec![entry("A", 100), entry("B", 50)],
            vec![entry("A", 300), entry("B", 50)],
        ))
}

fn tracker_with(
    ledger: &MockLedger,
    settings: TrackerSettings,
) -> (TokenTracker<MockLedger, SqliteStore>, Arc<SqliteStore>) {
    let store = Arc::new(SqliteStore::open_in_memory().unwrap());
    let tracker = TokenTracker::new(
        Arc::new(ledger.clone()),
        Arc::clone(&store),
        no_wait(),
        settings,
    );
    (tracker, store)
}

fn tracker(ledger: &MockLedger) -> (TokenTracker<MockLedger, SqliteStore>, Arc<SqliteStore>) {
    tracker_with(ledger, TrackerSettings::default())
}

// ============================================================================
// Onboarding
// ============================================================================

mod onboarding {
    use super::*;

    #[tokio::test]
    async fn test_onboard_registers_mint_once() {
        let ledger = launched_token();
        let (tracker, store) = tracker(&ledger);

        let first = tracker.onboard(MINT).await.unwrap();
        let second = tracker.onboard(MINT).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(store.list_tokens().unwrap().len(), 1);
        // The second onboarding is answered from storage
        assert_eq!(ledger.call_count(mocks::SUPPLY), 1);
    }

    #[tokio::test]
    async fn test_onboard_rejects_non_mint() {
        let ledger = MockLedger::new();
        let (tracker, store) = tracker(&ledger);

        let err = tracker.onboard("Wallet111").await.unwrap_err();

        assert!(matches!(err, CrawlerError::NotAToken(_)));
        assert!(store.list_tokens().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_onboard_transient_failure_is_not_a_verdict() {
        let ledger = MockLedger::new()
            .with_failure(mocks::SUPPLY, MINT, LedgerError::Timeout)
            .with_failure(mocks::SUPPLY, MINT, LedgerError::Timeout);
        let (tracker, store) = tracker(&ledger);

        let err = tracker.onboard(MINT).await.unwrap_err();

        assert!(matches!(err, CrawlerError::Rpc { attempts: 2, .. }));
        assert!(store.find_token(MINT).unwrap().is_none());
    }

    #[tokio::test]
    async fn test_resolve_update_authority_stores_it() {
        let mut data = vec![1, 0, 0, 0];
        data.extend_from_slice(&[7u8; 32]);
        data.extend_from_slice(&[0u8; 46]);
        let ledger = launched_token().with_account_data(MINT, data);
        let (tracker, store) = tracker(&ledger);
        tracker.onboard(MINT).await.unwrap();

        let authority = tracker.resolve_update_authority(MINT).await.unwrap();

        assert_eq!(authority, bs58::encode([7u8; 32]).into_string());
        let token = store.find_token(MINT).unwrap().unwrap();
        assert_eq!(token.update_authority, Some(authority));
    }

    #[tokio::test]
    async fn test_short_mint_data_is_rejected() {
        let ledger = launched_token().with_account_data(MINT, vec![0u8; 20]);
        let (tracker, _store) = tracker(&ledger);
        tracker.onboard(MINT).await.unwrap();

        let err = tracker.resolve_update_authority(MINT).await.unwrap_err();
        assert!(matches!(err, CrawlerError::InvalidAccountData(_)));
    }

    #[tokio::test]
    async fn test_locate_deploy_signature() {
        let mut data = vec![1, 0, 0, 0];
        data.extend_from_slice(&[9u8; 32]);
        let authority = bs58::encode([9u8; 32]).into_string();

        let deploy = TransactionRecord {
            signature: "deploy".to_string(),
            slot: 5,
            account_keys: vec![authority.clone(), MINT.to_string(), TOKEN_PROGRAM.to_string()],
            err: None,
            pre_token_balances: vec![],
            post_token_balances: vec![],
            log_messages: vec![
                format!("Program {} invoke [1]", TOKEN_PROGRAM),
                "Program log: Instruction: InitializeMint2".to_string(),
            ],
        };
        let transfer = TransactionRecord {
            signature: "transfer".to_string(),
            log_messages: vec!["Program log: Instruction: Transfer".to_string()],
            ..deploy.clone()
        };
        let ledger = launched_token()
            .with_account_data(MINT, data)
            .with_history(&authority, vec![sig("transfer", 9, None), sig("deploy", 5, None)])
            .with_transaction(deploy)
            .with_transaction(transfer);
        let (tracker, store) = tracker(&ledger);
        tracker.onboard(MINT).await.unwrap();

        let found = tracker.locate_deploy_signature(MINT).await.unwrap();

        assert_eq!(found.as_deref(), Some("deploy"));
        let token = store.find_token(MINT).unwrap().unwrap();
        assert_eq!(token.deploy_signature.as_deref(), Some("deploy"));
        assert_eq!(token.update_authority, Some(authority));
    }

    #[tokio::test]
    async fn test_unknown_token_operations_fail() {
        let ledger = launched_token();
        let (tracker, _store) = tracker(&ledger);

        assert!(matches!(tracker.holders(MINT).unwrap_err(), CrawlerError::NotFound(_)));
        assert!(matches!(
            tracker.collect_signatures(MINT).await.unwrap_err(),
            CrawlerError::NotFound(_)
        ));
        assert_eq!(ledger.call_count(mocks::SIGNATURES), 0);
    }
}

// ============================================================================
// Signature Collection
// ============================================================================

mod collection {
    use super::*;

    #[tokio::test]
    async fn test_collect_stores_successful_signatures() {
        let ledger = launched_token();
        let (tracker, store) = tracker_with(
            &ledger,
            TrackerSettings {
                page_size: 2,
                ..TrackerSettings::default()
            },
        );
        let token = tracker.onboard(MINT).await.unwrap();

        let summary = tracker.collect_signatures(MINT).await.unwrap();

        assert_eq!(summary.pages, 2);
        assert_eq!(summary.fetched, 3);
        assert_eq!(summary.inserted, 3);
        assert_eq!(summary.duplicates, 0);

        let stored: Vec<String> = store
            .signatures_chronological(token.id)
            .unwrap()
            .into_iter()
            .map(|r| r.signature)
            .collect();
        assert_eq!(stored, vec!["s1", "s3", "s4"]);
    }

    #[tokio::test]
    async fn test_collect_rerun_only_finds_duplicates() {
        let ledger = launched_token();
        let (tracker, _store) = tracker(&ledger);
        tracker.onboard(MINT).await.unwrap();

        tracker.collect_signatures(MINT).await.unwrap();
        let rerun = tracker.collect_signatures(MINT).await.unwrap();

        assert_eq!(rerun.fetched, 3);
        assert_eq!(rerun.inserted, 0);
        assert_eq!(rerun.duplicates, 3);
    }

    #[tokio::test]
    async fn test_collect_keeps_disjoint_part_of_overlapping_batch() {
        let ledger = launched_token();
        let (tracker, store) = tracker(&ledger);
        let token = tracker.onboard(MINT).await.unwrap();
        store
            .insert_signatures(&[SignatureRecord::new("s3".to_string(), 30, None, token.id)])
            .unwrap();

        let summary = tracker.collect_signatures(MINT).await.unwrap();

        assert_eq!(summary.inserted, 2);
        assert_eq!(summary.duplicates, 1);
        assert_eq!(store.signatures_chronological(token.id).unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_collect_retries_rate_limited_page() {
        let ledger =
            launched_token().with_failure(mocks::SIGNATURES, MINT, LedgerError::RateLimited);
        let (tracker, _store) = tracker(&ledger);
        tracker.onboard(MINT).await.unwrap();

        let summary = tracker.collect_signatures(MINT).await.unwrap();

        assert_eq!(summary.inserted, 3);
        // failed attempt + first page + terminating empty page
        assert_eq!(ledger.call_count(mocks::SIGNATURES), 3);
    }
}

// ============================================================================
// Holder Discovery
// ============================================================================

mod discovery {
    use super::*;

    #[tokio::test]
    async fn test_track_discovers_self_funded_buyers_in_order() {
        let ledger = launched_token();
        let (tracker, _store) = tracker(&ledger);

        let summary = tracker.track(MINT).await.unwrap();

        assert_eq!(summary.scanned, 3);
        assert_eq!(summary.found, 2);
        assert_eq!(summary.inserted, 2);

        let (_token, holders) = tracker.holders(MINT).unwrap();
        let found: Vec<(&str, u64)> = holders
            .iter()
            .map(|h| (h.address.as_str(), h.initial_balance))
            .collect();
        // C received tokens without signing; A's later buy keeps the first balance
        assert_eq!(found, vec![("A", 100), ("B", 50)]);
        assert!(holders.iter().all(|h| h.current_balance == h.initial_balance && !h.stale));
        // Failed signature never reaches discovery
        assert!(!ledger.get_calls().contains(&"transaction:s2".to_string()));
    }

    #[tokio::test]
    async fn test_discovery_reads_oldest_transaction_first() {
        let ledger = launched_token();
        let (tracker, _store) = tracker_with(
            &ledger,
            TrackerSettings {
                holder_quota: 1,
                ..TrackerSettings::default()
            },
        );

        let summary = tracker.track(MINT).await.unwrap();

        assert_eq!(summary.scanned, 1);
        let (_token, holders) = tracker.holders(MINT).unwrap();
        assert_eq!(holders.len(), 1);
        assert_eq!(holders[0].address, "A");
        assert_eq!(holders[0].initial_balance, 100);
    }

    #[tokio::test]
    async fn test_full_quota_skips_rescan() {
        let ledger = launched_token();
        let (tracker, _store) = tracker_with(
            &ledger,
            TrackerSettings {
                holder_quota: 2,
                ..TrackerSettings::default()
            },
        );
        tracker.track(MINT).await.unwrap();
        let fetched = ledger.call_count(mocks::TRANSACTION);

        let rerun = tracker.discover_holders(MINT).await.unwrap();

        assert_eq!(rerun.scanned, 0);
        assert_eq!(ledger.call_count(mocks::TRANSACTION), fetched);
    }

    #[tokio::test]
    async fn test_rediscovery_counts_duplicates() {
        let ledger = launched_token();
        let (tracker, _store) = tracker(&ledger);
        tracker.track(MINT).await.unwrap();

        let rerun = tracker.discover_holders(MINT).await.unwrap();

        assert_eq!(rerun.found, 2);
        assert_eq!(rerun.inserted, 0);
        assert_eq!(rerun.duplicates, 2);
        assert_eq!(tracker.holders(MINT).unwrap().1.len(), 2);
    }
}

// ============================================================================
// Balance Refresh
// ============================================================================

mod refresh {
    use super::*;

    #[tokio::test]
    async fn test_refresh_updates_and_marks_failures_stale() {
        let ledger = launched_token()
            .with_token_accounts("A", MINT, &["A-ata", "A-aux"])
            .with_balance("A-ata", 60)
            .with_balance("A-aux", 20)
            .with_failure(mocks::TOKEN_ACCOUNTS, "B", LedgerError::Timeout)
            .with_failure(mocks::TOKEN_ACCOUNTS, "B", LedgerError::Timeout);
        let (tracker, _store) = tracker(&ledger);
        tracker.track(MINT).await.unwrap();

        let summary = tracker.refresh_balances(MINT).await.unwrap();

        assert_eq!(summary.refreshed, 1);
        assert_eq!(summary.failed, 1);

        let (_token, holders) = tracker.holders(MINT).unwrap();
        let a = holders.iter().find(|h| h.address == "A").unwrap();
        let b = holders.iter().find(|h| h.address == "B").unwrap();
        assert_eq!(a.current_balance, 80);
        assert!(!a.stale);
        assert_eq!(RetentionStatus::of(a), RetentionStatus::Partial);
        // Failed lookup keeps the prior balance instead of zeroing it
        assert_eq!(b.current_balance, 50);
        assert!(b.stale);
        assert_eq!(RetentionStatus::of(b), RetentionStatus::Unknown);

        let buckets = RetentionSummary::from_holders(&holders);
        assert_eq!(buckets.partial, 1);
        assert_eq!(buckets.unknown, 1);
    }

    #[tokio::test]
    async fn test_successful_refresh_clears_stale() {
        let ledger = launched_token()
            .with_token_accounts("A", MINT, &["A-ata"])
            .with_balance("A-ata", 100)
            .with_failure(mocks::TOKEN_ACCOUNTS, "B", LedgerError::Timeout)
            .with_failure(mocks::TOKEN_ACCOUNTS, "B", LedgerError::Timeout);
        let (tracker, _store) = tracker(&ledger);
        tracker.track(MINT).await.unwrap();
        tracker.refresh_balances(MINT).await.unwrap();

        // Scripted failures are used up; B now has no token accounts at all
        let summary = tracker.refresh_balances(MINT).await.unwrap();

        assert_eq!(summary.refreshed, 2);
        let (_token, holders) = tracker.holders(MINT).unwrap();
        let b = holders.iter().find(|h| h.address == "B").unwrap();
        assert!(!b.stale);
        assert_eq!(b.current_balance, 0);
        assert_eq!(RetentionStatus::of(b), RetentionStatus::Sold);
    }

    #[tokio::test]
    async fn test_refresh_loop_stops_during_interval() {
        let ledger = launched_token()
            .with_token_accounts("A", MINT, &["A-ata"])
            .with_balance("A-ata", 100);
        // The loop is asleep for an hour when stop arrives
        let (tracker, _store) = tracker_with(
            &ledger,
            TrackerSettings {
                refresh_interval: Duration::from_secs(3600),
                ..TrackerSettings::default()
            },
        );
        tracker.track(MINT).await.unwrap();

        let handle = tracker.clone();
        let task = tokio::spawn(async move { handle.run_refresh_loop().await });

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(tracker.is_running().await);
        tracker.stop().await;

        let result = tokio::time::timeout(Duration::from_secs(1), task)
            .await
            .expect("refresh loop did not stop")
            .unwrap();
        assert!(result.is_ok());
        assert!(!tracker.is_running().await);
        assert!(ledger.call_count(mocks::BALANCE) >= 1);
    }

    #[tokio::test]
    async fn test_tracked_tokens_lists_registered_mints() {
        let ledger = launched_token();
        let (tracker, _store) = tracker(&ledger);
        assert!(tracker.tracked_tokens().unwrap().is_empty());

        tracker.onboard(MINT).await.unwrap();

        let tokens = tracker.tracked_tokens().unwrap();
        assert_eq!(tokens.len(), 1);
        assert_eq!(tokens[0].address, MINT);
    }
}

// ============================================================================
// Storage Failures
// ============================================================================

mod storage_failures {
    use super::*;

    /// 10^19 base units, above i64::MAX but a valid token amount
    const HUGE: u64 = 10_000_000_000_000_000_000;

    /// SQLite store that rejects writes for chosen holders
    struct FlakyStore {
        inner: SqliteStore,
        reject_insert: Option<&'static str>,
        reject_update: Option<&'static str>,
    }

    impl FlakyStore {
        fn new() -> Self {
            Self {
                inner: SqliteStore::open_in_memory().unwrap(),
                reject_insert: None,
                reject_update: None,
            }
        }

        fn rejected(address: &str) -> StorageError {
            StorageError::Database(format!("disk I/O error writing {}", address))
        }
    }

    impl StoragePort for FlakyStore {
        fn get_or_create_token(&self, address: &str) -> Result<Token, StorageError> {
            self.inner.get_or_create_token(address)
        }

        fn find_token(&self, address: &str) -> Result<Option<Token>, StorageError> {
            self.inner.find_token(address)
        }

        fn list_tokens(&self) -> Result<Vec<Token>, StorageError> {
            self.inner.list_tokens()
        }

        fn set_update_authority(&self, token_id: i64, authority: &str) -> Result<(), StorageError> {
            self.inner.set_update_authority(token_id, authority)
        }

        fn set_deploy_signature(&self, token_id: i64, signature: &str) -> Result<(), StorageError> {
            self.inner.set_deploy_signature(token_id, signature)
        }

        fn insert_signatures(&self, batch: &[SignatureRecord]) -> Result<usize, StorageError> {
            self.inner.insert_signatures(batch)
        }

        fn signatures_chronological(
            &self,
            token_id: i64,
        ) -> Result<Vec<SignatureRecord>, StorageError> {
            self.inner.signatures_chronological(token_id)
        }

        fn insert_holder(&self, holder: &Holder) -> Result<(), StorageError> {
            if self.reject_insert == Some(holder.address.as_str()) {
                return Err(Self::rejected(&holder.address));
            }
            self.inner.insert_holder(holder)
        }

        fn holders(&self, token_id: i64) -> Result<Vec<Holder>, StorageError> {
            self.inner.holders(token_id)
        }

        fn update_holder_balance(
            &self,
            address: &str,
            token_id: i64,
            balance: u64,
            checked_at: DateTime<Utc>,
        ) -> Result<(), StorageError> {
            if self.reject_update == Some(address) {
                return Err(Self::rejected(address));
            }
            self.inner
                .update_holder_balance(address, token_id, balance, checked_at)
        }

        fn mark_holder_stale(
            &self,
            address: &str,
            token_id: i64,
            checked_at: DateTime<Utc>,
        ) -> Result<(), StorageError> {
            self.inner.mark_holder_stale(address, token_id, checked_at)
        }
    }

    fn flaky_tracker(
        ledger: &MockLedger,
        store: FlakyStore,
    ) -> TokenTracker<MockLedger, FlakyStore> {
        TokenTracker::new(
            Arc::new(ledger.clone()),
            Arc::new(store),
            no_wait(),
            TrackerSettings::default(),
        )
    }

    fn holder<'a>(holders: &'a [Holder], address: &str) -> &'a Holder {
        holders.iter().find(|h| h.address == address).unwrap()
    }

    #[tokio::test]
    async fn test_refresh_stores_balance_beyond_i64() {
        let ledger = launched_token()
            .with_token_accounts("A", MINT, &["A-ata"])
            .with_balance("A-ata", HUGE)
            .with_token_accounts("B", MINT, &["B-ata"])
            .with_balance("B-ata", 77);
        let (tracker, _store) = tracker(&ledger);
        tracker.track(MINT).await.unwrap();

        let summary = tracker.refresh_balances(MINT).await.unwrap();

        assert_eq!(summary.refreshed, 2);
        assert_eq!(summary.failed, 0);
        let (_token, holders) = tracker.holders(MINT).unwrap();
        let a = holder(&holders, "A");
        assert_eq!(a.current_balance, HUGE);
        assert!(!a.stale);
        assert_eq!(RetentionStatus::of(a), RetentionStatus::Increased);
        assert_eq!(holder(&holders, "B").current_balance, 77);
    }

    #[tokio::test]
    async fn test_discovery_stores_initial_balance_beyond_i64() {
        let ledger = MockLedger::new()
            .with_supply(MINT, u64::MAX)
            .with_history(MINT, vec![sig("s2", 20, None), sig("s1", 10, None)])
            .with_transaction(buy("s1", 10, "A", vec![], vec![entry("A", HUGE)]))
            .with_transaction(buy(
                "s2",
                20,
                "B",
                vec![entry("A", HUGE)],
                vec![entry("A", HUGE), entry("B", 50)],
            ));
        let (tracker, _store) = tracker(&ledger);

        let summary = tracker.track(MINT).await.unwrap();

        assert_eq!(summary.inserted, 2);
        assert_eq!(summary.failed, 0);
        let (_token, holders) = tracker.holders(MINT).unwrap();
        let found: Vec<(&str, u64)> = holders
            .iter()
            .map(|h| (h.address.as_str(), h.initial_balance))
            .collect();
        assert_eq!(found, vec![("A", HUGE), ("B", 50)]);
    }

    #[tokio::test]
    async fn test_rejected_balance_write_marks_holder_stale_and_continues() {
        let ledger = launched_token()
            .with_token_accounts("A", MINT, &["A-ata"])
            .with_balance("A-ata", 90)
            .with_token_accounts("B", MINT, &["B-ata"])
            .with_balance("B-ata", 77);
        let store = FlakyStore {
            reject_update: Some("A"),
            ..FlakyStore::new()
        };
        let tracker = flaky_tracker(&ledger, store);
        tracker.track(MINT).await.unwrap();

        let summary = tracker.refresh_balances(MINT).await.unwrap();

        assert_eq!(summary.refreshed, 1);
        assert_eq!(summary.failed, 1);
        let (_token, holders) = tracker.holders(MINT).unwrap();
        let a = holder(&holders, "A");
        assert_eq!(a.current_balance, 100);
        assert!(a.stale);
        let b = holder(&holders, "B");
        assert_eq!(b.current_balance, 77);
        assert!(!b.stale);
    }

    #[tokio::test]
    async fn test_rejected_holder_insert_keeps_remaining_holders() {
        let ledger = launched_token();
        let store = FlakyStore {
            reject_insert: Some("A"),
            ..FlakyStore::new()
        };
        let tracker = flaky_tracker(&ledger, store);

        let summary = tracker.track(MINT).await.unwrap();

        assert_eq!(summary.found, 2);
        assert_eq!(summary.inserted, 1);
        assert_eq!(summary.failed, 1);
        let (_token, holders) = tracker.holders(MINT).unwrap();
        assert_eq!(holders.len(), 1);
        assert_eq!(holders[0].address, "B");
    }
}
