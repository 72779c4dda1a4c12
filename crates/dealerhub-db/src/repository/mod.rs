//! # Repository Module
//!
//! Database repository implementations for the EasyCars integration.
//!
//! ## Repository Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Repository Pattern                                   │
//! │                                                                         │
//! │  StockSyncEngine                                                       │
//! │       │                                                                 │
//! │       │  db.stock_data().get_by_stock_number(dealership, "S100")       │
//! │       ▼                                                                 │
//! │  StockDataRepository                                                   │
//! │  ├── get_by_stock_number(&self, dealership_id, stock_number)           │
//! │  ├── get_by_vehicle(&self, vehicle_id)                                 │
//! │  └── upsert(&self, ...)                                                │
//! │       │                                                                 │
//! │       │  SQL Query                                                      │
//! │       ▼                                                                 │
//! │  SQLite Database                                                       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Available Repositories
//!
//! - [`credential::CredentialRepository`] - Encrypted EasyCars credentials
//! - [`sync_log::SyncLogRepository`] - Append-only sync history
//! - [`stock_data::StockDataRepository`] - Raw stock payloads per vehicle
//! - [`vehicle::VehicleRepository`] - Local inventory
//! - [`lead::LeadRepository`] - Local leads
//! - [`conflict::ConflictRepository`] - Lead status conflicts
//! - [`settings::SettingsRepository`] - Kill switch and auto-sync flags

pub mod conflict;
pub mod credential;
pub mod lead;
pub mod settings;
pub mod stock_data;
pub mod sync_log;
pub mod vehicle;
