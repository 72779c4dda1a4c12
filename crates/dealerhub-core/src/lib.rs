//! # dealerhub-core: Pure Domain Logic for the EasyCars Integration
//!
//! This crate holds everything about inventory and lead synchronization that
//! can be expressed without touching a database or the network.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                     DealerHub Sync Architecture                         │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │              apps/sync-worker (periodic trigger)                │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │   dealerhub-sync: Vault, EasyCars client, engines, scheduler    │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │            ★ dealerhub-core (THIS CRATE) ★                      │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────┐  ┌───────────┐  ┌───────────┐  ┌───────────┐  │   │
//! │  │   │   types   │  │   stock   │  │   lead    │  │ validation│  │   │
//! │  │   │  Vehicle  │  │ StockItem │  │ LeadStatus│  │ credential│  │   │
//! │  │   │  SyncLog  │  │  diffing  │  │ conflicts │  │   input   │  │   │
//! │  │   └───────────┘  └───────────┘  └───────────┘  └───────────┘  │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                 dealerhub-db (SQLite repositories)              │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Persisted domain types (Vehicle, Lead, SyncLog, ...)
//! - [`stock`] - Remote stock items and field-level diffing
//! - [`lead`] - Lead status mapping and conflict decisions
//! - [`sync_result`] - Per-run counters and outcome classification
//! - [`validation`] - Credential input validation
//! - [`error`] - Domain error types

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod lead;
pub mod stock;
pub mod sync_result;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use error::{CoreError, CoreResult, ValidationError};
pub use lead::{decide_reconciliation, ReconcileAction, RemoteLeadStatus};
pub use stock::{FieldChange, StockItem, VehicleDraft};
pub use sync_result::SyncResult;
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// System setting key for the global EasyCars kill switch.
pub const GLOBAL_SYNC_SETTING_KEY: &str = "easycar_sync_enabled";

/// API version tag stored with every raw stock payload.
pub const STOCK_API_VERSION: &str = "v1";
