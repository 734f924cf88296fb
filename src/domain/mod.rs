//! Domain Layer - Core types and pure logic for holder tracking
//!
//! This module contains pure domain types and logic with no I/O.
//! All ledger and storage interactions happen through the ports layer.
//!
//! - `token`: Tracked token identity
//! - `signature`: Persisted transaction references and their chronological order
//! - `holder`: Discovered first buyers and their balance snapshots
//! - `balance_delta`: Self-funded buy extraction from token balance changes
//! - `update_authority`: Mint account payload decoding
//! - `retention`: How much of the initial buy a holder still holds

pub mod token;
pub mod signature;
pub mod holder;
pub mod balance_delta;
pub mod update_authority;
pub mod retention;

pub use token::Token;
pub use signature::{SignatureRecord, sort_chronologically};
pub use holder::Holder;
pub use balance_delta::self_funded_buys;
pub use update_authority::{authority_from_mint_data, MintDataError};
pub use retention::{RetentionStatus, RetentionSummary};
