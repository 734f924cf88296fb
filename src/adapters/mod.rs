//! Adapters Layer - External System Implementations
//!
//! This module contains implementations of the port traits:
//! - Solana: RPC client implementing the ledger port
//! - SQLite: persistent store implementing the storage port
//! - CLI: Command-line argument definitions

pub mod solana;
pub mod sqlite;
pub mod cli;

pub use solana::SolanaClient;
pub use sqlite::SqliteStore;
pub use cli::CliApp;
