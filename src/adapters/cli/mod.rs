//! CLI Adapter
//!
//! Command-line interface for the holder crawler.
//! Uses clap derive macros for argument parsing.

mod commands;

pub use commands::{CliApp, Command, HoldersCmd, MintArg, RefreshCmd};

/// Initialize the CLI application
pub fn init() -> CliApp {
    use clap::Parser;
    CliApp::parse()
}
