//! Holder Crawler Library
//!
//! Discovers the first self-funded buyers of a Solana SPL token and tracks
//! how much of their initial buy they still hold.
//!
//! # Modules
//!
//! - `domain`: Core data and pure logic (Token, Holder, balance deltas, retention)
//! - `ports`: Trait abstractions (LedgerPort, StoragePort) and test doubles
//! - `crawler`: Signature paging, holder discovery, balance refresh, retry policy
//! - `adapters`: External implementations (Solana RPC, SQLite, CLI)
//! - `config`: Configuration loading and validation
//! - `application`: Token tracker orchestrating the pipeline

pub mod domain;
pub mod ports;
pub mod crawler;
pub mod adapters;
pub mod config;
pub mod application;
