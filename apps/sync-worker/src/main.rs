//! # DealerHub Sync Worker
//!
//! Runs the EasyCars stock and lead sync for every auto-sync dealership
//! on a fixed interval.
//!
//! ## Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Sync Worker                                     │
//! │                                                                         │
//! │  startup:  config ─► vault key (fail fast) ─► SQLite ─► client         │
//! │                                                                         │
//! │  loop:     tick ─► Stock pass ─► Lead pass ─► wait for next tick        │
//! │                                                                         │
//! │  shutdown: Ctrl+C / SIGTERM ─► no new dealership syncs start,           │
//! │            in-flight ones finish and write their log                    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::sync::Arc;

use anyhow::Context;
use tokio::sync::watch;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use dealerhub_core::SyncType;
use dealerhub_db::{Database, DbConfig};
use dealerhub_sync::{
    CredentialVault, DatabaseSettingsProvider, EasyCarsClient, SyncConfig, SyncRunner,
    SyncScheduler,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,dealerhub_sync=debug")),
        )
        .with_target(true)
        .init();

    info!("Starting DealerHub sync worker...");

    let config = SyncConfig::load(None).context("Failed to load configuration")?;
    info!(
        interval_secs = config.sync.interval_secs,
        max_concurrent = config.sync.max_concurrent_dealerships,
        "Configuration loaded"
    );

    // No sync may run with a missing or broken key
    let vault = CredentialVault::from_configured_key(config.security.encryption_key.as_deref())
        .context("EasyCars encryption key is missing or invalid")?;

    if let Some(dir) = config.database.path.parent() {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create database directory {}", dir.display()))?;
    }
    let db = Database::new(
        DbConfig::new(&config.database.path).max_connections(config.database.max_connections),
    )
    .await
    .context("Failed to open database")?;
    info!(path = %config.database.path.display(), "Database ready");

    let client = EasyCarsClient::new(config.easycars.clone())
        .context("Failed to build EasyCars client")?;
    let runner = Arc::new(SyncRunner::new(
        db.clone(),
        Arc::new(vault),
        Arc::new(client),
        &config.sync,
    ));
    let scheduler = SyncScheduler::new(
        Arc::new(DatabaseSettingsProvider::new(db.clone())),
        runner,
        config.sync.max_concurrent_dealerships,
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        shutdown_signal().await;
        info!("Shutdown signal received");
        let _ = shutdown_tx.send(true);
    });

    run(&scheduler, config.sync.interval(), shutdown_rx).await;

    db.close().await;
    info!("Sync worker stopped");
    Ok(())
}

/// Runs scheduler passes until shutdown is signalled.
async fn run(scheduler: &SyncScheduler, every: std::time::Duration, mut shutdown: watch::Receiver<bool>) {
    let mut ticker = interval(every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = shutdown.changed() => break,
        }

        for sync_type in [SyncType::Stock, SyncType::Lead] {
            if *shutdown.borrow() {
                break;
            }
            match scheduler.run_pass(sync_type, &shutdown).await {
                Ok(report) if report.disabled => {}
                Ok(report) if report.failed() > 0 => {
                    warn!(%sync_type, failed = report.failed(), "Sync pass had failures");
                }
                Ok(_) => {}
                Err(err) => error!(%sync_type, error = %err, "Sync pass could not run"),
            }
        }

        if *shutdown.borrow() {
            break;
        }
    }
}

/// Resolves on Ctrl+C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!(error = %err, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                error!(error = %err, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
