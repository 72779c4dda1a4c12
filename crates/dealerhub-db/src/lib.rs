//! # dealerhub-db: Database Layer for the EasyCars Integration
//!
//! SQLite storage for inventory, leads, credentials and sync history,
//! using sqlx for async access.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        DealerHub Data Flow                              │
//! │                                                                         │
//! │  SyncScheduler / SyncService (dealerhub-sync)                          │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                  dealerhub-db (THIS CRATE)                      │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌───────────────┐    ┌──────────────┐  │   │
//! │  │   │   Database    │    │  Repositories │    │  Migrations  │  │   │
//! │  │   │   (pool.rs)   │    │               │    │  (embedded)  │  │   │
//! │  │   │               │    │ Credentials   │    │              │  │   │
//! │  │   │ SqlitePool    │◄───│ SyncLogs      │    │ 001_easycars │  │   │
//! │  │   │ Connection    │    │ StockData     │    │   _schema    │  │   │
//! │  │   │ Management    │    │ Leads, ...    │    │              │  │   │
//! │  │   └───────────────┘    └───────────────┘    └──────────────┘  │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     SQLite Database                             │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use dealerhub_db::{Database, DbConfig};
//!
//! let db = Database::new(DbConfig::new("dealerhub.db")).await?;
//! let enabled = db.settings().global_sync_enabled().await?;
//! let last = db.sync_logs().last_for_dealership(42, SyncType::Stock).await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{DbError, DbResult};
pub use pool::{Database, DbConfig};

pub use repository::conflict::ConflictRepository;
pub use repository::credential::CredentialRepository;
pub use repository::lead::LeadRepository;
pub use repository::settings::SettingsRepository;
pub use repository::stock_data::StockDataRepository;
pub use repository::sync_log::SyncLogRepository;
pub use repository::vehicle::VehicleRepository;
