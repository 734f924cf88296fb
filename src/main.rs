//! Holder Crawler - first-buyer discovery and balance tracking for Solana tokens

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing_subscriber::{fmt, EnvFilter};

use holder_crawler::adapters::cli::{self, Command, HoldersCmd, RefreshCmd};
use holder_crawler::adapters::{SolanaClient, SqliteStore};
use holder_crawler::application::{TokenTracker, TrackerSettings};
use holder_crawler::config::{load_config, Config};
use holder_crawler::domain::{RetentionStatus, RetentionSummary};

type Tracker = TokenTracker<SolanaClient, SqliteStore>;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if it exists (RPC keys go here, not in the config file)
    dotenvy::dotenv().ok();

    let app = cli::init();
    let config = load_config(&app.config)
        .with_context(|| format!("Failed to load configuration from {}", app.config.display()))?;
    init_logging(app.verbose, app.debug, &config.logging.level)?;

    let tracker = build_tracker(&config)?;

    match app.command {
        Command::Track(cmd) => track_command(&tracker, &cmd.mint).await,
        Command::Collect(cmd) => collect_command(&tracker, &cmd.mint).await,
        Command::Discover(cmd) => discover_command(&tracker, &cmd.mint).await,
        Command::Refresh(cmd) => refresh_command(&tracker, cmd).await,
        Command::Watch => watch_command(tracker).await,
        Command::Holders(cmd) => holders_command(&tracker, cmd),
        Command::Authority(cmd) => authority_command(&tracker, &cmd.mint).await,
        Command::Deploy(cmd) => deploy_command(&tracker, &cmd.mint).await,
    }
}

fn init_logging(verbose: bool, debug: bool, config_level: &str) -> Result<()> {
    let filter = if debug {
        EnvFilter::new("debug")
    } else if verbose {
        EnvFilter::new("info")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(config_level))
    };

    fmt().with_env_filter(filter).with_target(false).init();
    Ok(())
}

fn build_tracker(config: &Config) -> Result<Tracker> {
    let solana = SolanaClient::new(
        config.rpc.get_url(),
        &config.rpc.commitment,
        config.rpc.timeout(),
    );

    let db_path = config.storage.get_database_path();
    let store = SqliteStore::open(&db_path)
        .with_context(|| format!("Failed to open database {}", db_path))?;
    tracing::info!("Using database {}", db_path);

    Ok(TokenTracker::new(
        Arc::new(solana),
        Arc::new(store),
        config.retry.policy(),
        TrackerSettings::from(config),
    ))
}

async fn track_command(tracker: &Tracker, mint: &str) -> Result<()> {
    tracing::info!("Tracking {}", mint);

    let summary = tracker
        .track(mint)
        .await
        .with_context(|| format!("Failed to track {}", mint))?;

    println!("Tracked {}", mint);
    println!("  Transactions scanned: {}", summary.scanned);
    println!("  First buyers found:   {}", summary.found);
    println!("  New holders stored:   {}", summary.inserted);
    if summary.failed > 0 {
        println!("  Rejected by store:    {}", summary.failed);
    }
    Ok(())
}

async fn collect_command(tracker: &Tracker, mint: &str) -> Result<()> {
    tracker
        .onboard(mint)
        .await
        .with_context(|| format!("Failed to register {}", mint))?;
    let summary = tracker
        .collect_signatures(mint)
        .await
        .context("Signature collection failed")?;

    println!("Collected {} signatures over {} pages", summary.fetched, summary.pages);
    println!("  New: {}  Already stored: {}", summary.inserted, summary.duplicates);
    Ok(())
}

async fn discover_command(tracker: &Tracker, mint: &str) -> Result<()> {
    let summary = tracker
        .discover_holders(mint)
        .await
        .context("Holder discovery failed")?;

    println!("Scanned {} transactions, found {} first buyers", summary.scanned, summary.found);
    println!(
        "  New: {}  Already stored: {}  Rejected: {}",
        summary.inserted, summary.duplicates, summary.failed
    );
    Ok(())
}

async fn refresh_command(tracker: &Tracker, cmd: RefreshCmd) -> Result<()> {
    let mints = match cmd.mint {
        Some(mint) => vec![mint],
        None => tracker.tracked_tokens()?.into_iter().map(|t| t.address).collect(),
    };

    for mint in mints {
        let summary = tracker
            .refresh_balances(&mint)
            .await
            .with_context(|| format!("Failed to refresh {}", mint))?;
        println!("{}: {} refreshed, {} failed", mint, summary.refreshed, summary.failed);
    }
    Ok(())
}

async fn watch_command(tracker: Tracker) -> Result<()> {
    // Setup Ctrl+C handler
    let handle = tracker.clone();
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        tracing::info!("Shutdown signal received");
        handle.stop().await;
    });

    tracker.run_refresh_loop().await?;
    tracing::info!("Holder crawler stopped");
    Ok(())
}

fn holders_command(tracker: &Tracker, cmd: HoldersCmd) -> Result<()> {
    let (token, holders) = tracker.holders(&cmd.mint)?;
    let summary = RetentionSummary::from_holders(&holders);

    if cmd.json {
        let rows: Vec<_> = holders
            .iter()
            .map(|h| {
                serde_json::json!({
                    "address": h.address,
                    "initial_balance": h.initial_balance,
                    "current_balance": h.current_balance,
                    "last_checked": h.last_checked.to_rfc3339(),
                    "status": RetentionStatus::of(h).to_string(),
                })
            })
            .collect();
        let out = serde_json::json!({
            "token": token.address,
            "update_authority": token.update_authority,
            "deploy_signature": token.deploy_signature,
            "holders": rows,
            "summary": summary,
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    println!("Token: {}", token.address);
    if let Some(ref authority) = token.update_authority {
        println!("Update authority: {}", authority);
    }
    println!();
    println!("{:<4} {:<44} {:>20} {:>20} {:<10}", "#", "Holder", "Initial", "Current", "Status");
    for (i, h) in holders.iter().enumerate() {
        println!(
            "{:<4} {:<44} {:>20} {:>20} {:<10}",
            i + 1,
            h.address,
            h.initial_balance,
            h.current_balance,
            RetentionStatus::of(h).to_string()
        );
    }
    println!();
    println!(
        "{} holders: {} increased, {} holding >90%, {} holding >50%, {} reduced, {} sold, {} unknown",
        summary.total(),
        summary.increased,
        summary.holding,
        summary.partial,
        summary.reduced,
        summary.sold,
        summary.unknown
    );
    Ok(())
}

async fn authority_command(tracker: &Tracker, mint: &str) -> Result<()> {
    tracker
        .onboard(mint)
        .await
        .with_context(|| format!("Failed to register {}", mint))?;
    let authority = tracker
        .resolve_update_authority(mint)
        .await
        .context("Failed to resolve update authority")?;

    println!("Update authority of {}: {}", mint, authority);
    Ok(())
}

async fn deploy_command(tracker: &Tracker, mint: &str) -> Result<()> {
    let found = tracker
        .locate_deploy_signature(mint)
        .await
        .context("Failed to locate deploy transaction")?;
    match found {
        Some(signature) => println!("Deploy transaction of {}: {}", mint, signature),
        None => println!("No deploy transaction found in the authority's recent history"),
    }
    Ok(())
}
