// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # Strata Devnet Node
//!
//! Entry point for the `strata-node` binary. Parses CLI arguments,
//! initializes logging, bootstraps an in-memory ledger whose single block
//! authority lives in a mock HSM, and runs the block generator until
//! SIGINT or SIGTERM.
//!
//! Subcommands:
//!
//! - `run`    : start the generator
//! - `version`: print build version information

mod cli;
mod logging;

use anyhow::{Context, Result};
use clap::Parser;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tokio::sync::watch;

use strata_protocol::config::LedgerConfig;
use strata_protocol::consensus::{BlockSigner, Generator, GeneratorConfig};
use strata_protocol::crypto::Hash;
use strata_protocol::identity::{KeyService, MockHsm, Registry};
use strata_protocol::storage::{Ledger, MemStore, StateSnapshot};
use strata_protocol::transaction::{
    finalize, sign_template_with, Action, AssetAmount, ReferenceData, TemplateBuilder,
};

use cli::{Commands, StrataNodeCli};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = StrataNodeCli::parse();

    match cli.command {
        Commands::Run(args) => run_node(args).await,
        Commands::Version => {
            print_version();
            Ok(())
        }
    }
}

async fn run_node(args: cli::RunArgs) -> Result<()> {
    logging::init_logging(&args.log_level, args.log_format.into());

    tracing::info!(
        block_period_ms = args.block_period_ms,
        max_txs_per_block = args.max_txs_per_block,
        empty_blocks = args.empty_blocks,
        "starting strata-node"
    );

    // --- Block authority ---
    let hsm = Arc::new(MockHsm::new());
    let authority = hsm
        .create_key()
        .context("failed to create block authority key")?;
    tracing::info!(authority = %authority, "block authority key created");

    // --- Ledger ---
    let ledger = Arc::new(Ledger::with_config(
        Arc::new(MemStore::new()),
        LedgerConfig {
            block_authority: Some(authority),
            ..LedgerConfig::default()
        },
    ));

    // --- Generator ---
    let config = GeneratorConfig {
        max_txs_per_block: args.max_txs_per_block,
        produce_empty_blocks: args.empty_blocks,
        block_period: Duration::from_millis(args.block_period_ms),
    };
    let generator = Generator::bootstrap(
        Arc::clone(&ledger),
        BlockSigner::with_service(hsm.clone(), authority),
        &StateSnapshot::new(),
        now_millis(),
        config,
    )
    .context("failed to bootstrap the ledger")?;

    if args.demo {
        issue_demo_asset(&ledger, &hsm).context("demo issuance failed")?;
    }

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let generator_task = tokio::spawn(Arc::new(generator).run(shutdown_rx));

    shutdown_signal().await?;
    tracing::info!("shutdown signal received");

    // The generator may already have stopped; a closed channel is fine.
    let _ = shutdown_tx.send(true);
    generator_task.await.context("generator task panicked")?;

    let height = ledger.current_height().context("failed to read height")?;
    tracing::info!(height = ?height, "strata-node stopped");
    Ok(())
}

/// Register an account and asset held by `hsm`, then issue 1000 units to
/// the account through the full build, sign and finalize pipeline.
fn issue_demo_asset(ledger: &Ledger, hsm: &MockHsm) -> Result<()> {
    let registry = Registry::new();
    let key = hsm.create_key()?;

    let mut definition = serde_json::Map::new();
    definition.insert("name".into(), "devnet credit".into());
    let asset = registry.create_asset(
        vec![key],
        1,
        ReferenceData::from_map(&definition)?,
        Hash::ZERO,
        Some("credit"),
    )?;
    let account = registry.create_account(vec![key], 1, Some("treasury"))?;

    let amount = AssetAmount::new(asset, 1_000);
    let mut template = TemplateBuilder::new(&registry, ledger)
        .build(&[Action::issue(amount), Action::control(amount, account.clone())])?;
    sign_template_with(&mut template, hsm)?;
    let tx = finalize(ledger, &template)?;

    tracing::info!(
        tx_id = %tx.hash(),
        asset = %asset,
        account = %account,
        amount = 1_000u64,
        "demo asset issued"
    );
    Ok(())
}

fn now_millis() -> u64 {
    u64::try_from(chrono::Utc::now().timestamp_millis()).unwrap_or(0)
}

fn print_version() {
    println!("strata-node {}", env!("CARGO_PKG_VERSION"));
    println!("tx encoding {}", strata_protocol::config::TX_VERSION);
}

/// Waits for SIGINT (Ctrl+C) or SIGTERM, whichever comes first.
///
/// On non-Unix platforms, only Ctrl+C is supported.
async fn shutdown_signal() -> Result<()> {
    #[cfg(unix)]
    {
        let mut terminate = signal::unix::signal(signal::unix::SignalKind::terminate())
            .context("failed to install SIGTERM handler")?;
        tokio::select! {
            res = signal::ctrl_c() => res.context("failed to listen for Ctrl+C")?,
            _ = terminate.recv() => {}
        }
    }

    #[cfg(not(unix))]
    signal::ctrl_c()
        .await
        .context("failed to listen for Ctrl+C")?;

    Ok(())
}
