//! CLI Commands
//!
//! Argument definitions for the holder crawler binary.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Holder Crawler - first-buyer discovery and balance tracking for Solana tokens
#[derive(Parser, Debug)]
#[command(
    name = "holder-crawler",
    version = env!("CARGO_PKG_VERSION"),
    author = env!("CARGO_PKG_AUTHORS"),
    about = "First-buyer discovery and balance tracking for Solana SPL tokens",
    long_about = "Holder Crawler walks a token's transaction history, records the first \
                  self-funded buyers and keeps their balances current."
)]
pub struct CliApp {
    /// The command to execute
    #[command(subcommand)]
    pub command: Command,

    /// Path to configuration file
    #[arg(short, long, value_name = "FILE", default_value = "config/crawler.toml", global = true)]
    pub config: PathBuf,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Enable debug logging
    #[arg(long, global = true)]
    pub debug: bool,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Register a token and run the full pipeline: authority, history, first buyers
    Track(MintArg),

    /// Collect the token's signature history into the database
    Collect(MintArg),

    /// Discover first buyers from already collected signatures
    Discover(MintArg),

    /// Refresh holder balances once (all tokens when no mint is given)
    Refresh(RefreshCmd),

    /// Refresh every tracked token periodically until Ctrl+C
    Watch,

    /// Show stored holders of a token
    Holders(HoldersCmd),

    /// Resolve and store the token's update authority
    Authority(MintArg),

    /// Locate the token's deploy transaction
    Deploy(MintArg),
}

/// A single token mint address
#[derive(Parser, Debug)]
pub struct MintArg {
    /// Token mint address (base58)
    #[arg(value_name = "MINT")]
    pub mint: String,
}

/// Refresh holder balances
#[derive(Parser, Debug)]
pub struct RefreshCmd {
    /// Token mint address; omitted refreshes every tracked token
    #[arg(value_name = "MINT")]
    pub mint: Option<String>,
}

/// Show stored holders
#[derive(Parser, Debug)]
pub struct HoldersCmd {
    /// Token mint address (base58)
    #[arg(value_name = "MINT")]
    pub mint: String,

    /// Print JSON instead of a table
    #[arg(long)]
    pub json: bool,
}
