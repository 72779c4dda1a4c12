//! # dealerhub-sync: EasyCars Sync Engine
//!
//! Keeps each dealership's local inventory and leads in step with its
//! EasyCars account.
//!
//! ## Architecture Overview
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         EasyCars Sync Architecture                      │
//! │                                                                         │
//! │  ┌──────────────────────────────────────────────────────────────────┐  │
//! │  │          SyncScheduler (one pass per tick, per sync type)        │  │
//! │  │                                                                  │  │
//! │  │  Kill switch ─► auto-sync dealerships ─► bounded fan-out         │  │
//! │  └────────────────────────────┬─────────────────────────────────────┘  │
//! │                               │        ▲                                │
//! │                               │        │ trigger_sync, admin calls      │
//! │                               ▼        │                                │
//! │  ┌──────────────────────────────────────────────────────────────────┐  │
//! │  │                SyncRunner  (shared with SyncService)             │  │
//! │  │                                                                  │  │
//! │  │  CredentialVault::open ─► engine ─► exactly one sync log row     │  │
//! │  └────────────────────────────┬─────────────────────────────────────┘  │
//! │                               │                                         │
//! │         ┌─────────────────────┴─────────────────────┐                  │
//! │         ▼                                           ▼                   │
//! │  ┌────────────────────────┐            ┌────────────────────────────┐  │
//! │  │   StockSyncEngine      │            │   LeadSyncEngine           │  │
//! │  │                        │            │                            │  │
//! │  │ Remote stock ─► diff   │            │ Outbound create pass       │  │
//! │  │ Upsert, keep raw JSON  │            │ Status reconciliation      │  │
//! │  │ Per-item isolation     │            │ Conflict records           │  │
//! │  └───────────┬────────────┘            └─────────────┬──────────────┘  │
//! │              └──────────────────┬───────────────────┘                  │
//! │                                 ▼                                       │
//! │  ┌──────────────────────────────────────────────────────────────────┐  │
//! │  │          EasyCarsApi  (EasyCarsClient over reqwest)              │  │
//! │  │                                                                  │  │
//! │  │  Token cache per (client id, environment)                        │  │
//! │  │  ResponseCode classification, linear retry                       │  │
//! │  └──────────────────────────────────────────────────────────────────┘  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`client`] - EasyCars API trait, HTTP client, token cache, retry
//! - [`config`] - TOML + environment configuration
//! - [`error`] - Sync error types
//! - [`vault`] - AES-256-GCM credential encryption
//! - [`stock_sync`] - Stock reconciliation
//! - [`lead_sync`] - Outbound leads and status reconciliation
//! - [`runner`] - One dealership, one sync, one log row
//! - [`scheduler`] - Periodic multi-dealership passes
//! - [`service`] - Admin and dashboard operations
//! - [`settings`] - Kill switch and auto-sync lookup
//!
//! ## Usage
//!
//! ```rust,ignore
//! use dealerhub_sync::{
//!     CredentialVault, DatabaseSettingsProvider, EasyCarsClient, SyncConfig, SyncRunner,
//!     SyncScheduler,
//! };
//!
//! let config = SyncConfig::load(None)?;
//! let vault = CredentialVault::from_configured_key(config.security.encryption_key.as_deref())?;
//! let client = EasyCarsClient::new(config.easycars.clone())?;
//! let runner = Arc::new(SyncRunner::new(db.clone(), Arc::new(vault), Arc::new(client), &config.sync));
//! let scheduler = SyncScheduler::new(
//!     Arc::new(DatabaseSettingsProvider::new(db)),
//!     runner,
//!     config.sync.max_concurrent_dealerships,
//! );
//! let report = scheduler.run_pass(SyncType::Stock, &shutdown_rx).await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod client;
pub mod config;
pub mod error;
pub mod vault;

pub mod lead_sync;
pub mod stock_sync;

pub mod runner;
pub mod scheduler;
pub mod service;
pub mod settings;

#[cfg(test)]
mod testing;

// =============================================================================
// Re-exports
// =============================================================================

pub use client::{ApiError, EasyCarsApi, EasyCarsClient, LeadPayload, RemoteLead, ResponseCode};
pub use config::{DatabaseSettings, EasyCarsSettings, SecuritySettings, SyncConfig, SyncSettings};
pub use error::{EngineResult, SyncError};
pub use lead_sync::{LeadSyncEngine, ReconcileOutcome};
pub use runner::SyncRunner;
pub use scheduler::{PassReport, SyncScheduler};
pub use service::SyncService;
pub use settings::{DatabaseSettingsProvider, SettingsProvider, StaticSettings};
pub use stock_sync::{ItemOutcome, StockSyncEngine};
pub use vault::{AccountCredentials, CredentialVault, VaultError};
