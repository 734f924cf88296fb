//! Ports Layer - Trait definitions for external dependencies
//!
//! This module defines the interfaces (ports) that adapters must implement.
//! Following hexagonal architecture, these traits abstract:
//! - The ledger RPC gateway (signatures, transactions, token accounts)
//! - Persistence of tokens, signatures and holders

pub mod ledger;
pub mod storage;
pub mod models;
pub mod mocks;

pub use ledger::{LedgerError, LedgerPort};
pub use storage::{StorageError, StoragePort};
pub use models::{SignatureInfo, TokenBalanceEntry, TransactionRecord};
