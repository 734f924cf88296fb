//! Crawler - ledger history crawling and holder tracking
//!
//! - `collector`: pages backwards through a mint's signature history
//! - `discoverer`: finds the first self-funded buyers of a mint
//! - `refresher`: re-sums holders' balances across their token accounts
//! - `deploy`: locates the mint initialization transaction
//! - `retry`: bounded retry of transient gateway failures

pub mod error;
pub mod retry;
pub mod collector;
pub mod discoverer;
pub mod refresher;
pub mod deploy;

pub use error::CrawlerError;
pub use retry::{with_retry, ExponentialBackoff, FixedDelay, RetryPolicy};
pub use collector::{SignatureCollector, SignaturePager, DEFAULT_PAGE_SIZE};
pub use discoverer::{DiscoveredHolder, DiscoveryOutcome, HolderDiscoverer, DEFAULT_HOLDER_QUOTA};
pub use refresher::{BalanceOutcome, BalanceRefresher, HolderRefresh};
pub use deploy::DeployLocator;
