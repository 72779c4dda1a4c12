//! # Sync Settings Provider
//!
//! The scheduler reads the kill switch and the auto-sync list on every pass
//! through this trait, so tests can substitute fixed values.

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::error::EngineResult;
use dealerhub_core::DealershipId;
use dealerhub_db::Database;

#[async_trait]
pub trait SettingsProvider: Send + Sync {
    /// The system-wide kill switch. `false` disables every sync.
    async fn global_sync_enabled(&self) -> EngineResult<bool>;

    /// Dealerships with auto-sync turned on.
    async fn auto_sync_dealerships(&self) -> EngineResult<Vec<DealershipId>>;
}

/// Reads settings from the `system_settings` / `dealership_settings` tables.
#[derive(Debug, Clone)]
pub struct DatabaseSettingsProvider {
    db: Database,
}

impl DatabaseSettingsProvider {
    pub fn new(db: Database) -> Self {
        DatabaseSettingsProvider { db }
    }
}

#[async_trait]
impl SettingsProvider for DatabaseSettingsProvider {
    async fn global_sync_enabled(&self) -> EngineResult<bool> {
        Ok(self.db.settings().global_sync_enabled().await?)
    }

    async fn auto_sync_dealerships(&self) -> EngineResult<Vec<DealershipId>> {
        Ok(self.db.settings().auto_sync_dealerships().await?)
    }
}

/// Fixed settings. Counts dealership-list reads.
#[derive(Debug, Default)]
pub struct StaticSettings {
    enabled: bool,
    dealerships: Vec<DealershipId>,
    dealership_reads: AtomicUsize,
}

impl StaticSettings {
    pub fn new(enabled: bool, dealerships: Vec<DealershipId>) -> Self {
        StaticSettings {
            enabled,
            dealerships,
            dealership_reads: AtomicUsize::new(0),
        }
    }

    /// How many times the dealership list was requested.
    pub fn dealership_reads(&self) -> usize {
        self.dealership_reads.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SettingsProvider for StaticSettings {
    async fn global_sync_enabled(&self) -> EngineResult<bool> {
        Ok(self.enabled)
    }

    async fn auto_sync_dealerships(&self) -> EngineResult<Vec<DealershipId>> {
        self.dealership_reads.fetch_add(1, Ordering::SeqCst);
        Ok(self.dealerships.clone())
    }
}
