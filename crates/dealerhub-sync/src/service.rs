//! # Sync Service
//!
//! The operations admin controllers and the dashboard call.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                           SyncService                                   │
//! │                                                                         │
//! │  Sync control        Credentials           Dashboard                    │
//! │  ────────────        ───────────           ─────────                    │
//! │  trigger_sync        create / update       last_sync                    │
//! │  push_vehicle        delete / get          history (paged)              │
//! │  propagate_lead      test_connection       log_detail                   │
//! │  resolve_conflict                          status_summary               │
//! │                                            list_conflicts               │
//! │                                                                         │
//! │  Every call is scoped to one dealership. Credentials leave this         │
//! │  service only as CredentialSummary (never decrypted).                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::sync::Arc;
use tracing::{info, warn};

use crate::error::{EngineResult, SyncError};
use crate::runner::SyncRunner;
use crate::settings::SettingsProvider;
use dealerhub_core::validation::{validate_credential_input, CredentialInput};
use dealerhub_core::{
    ConflictResolution, CredentialSummary, DealershipId, LeadStatusConflict, SyncHistoryPage,
    SyncLog, SyncStatusSummary, SyncType,
};
use dealerhub_db::DbError;

pub struct SyncService {
    runner: Arc<SyncRunner>,
    settings: Arc<dyn SettingsProvider>,
}

impl SyncService {
    pub fn new(runner: Arc<SyncRunner>, settings: Arc<dyn SettingsProvider>) -> Self {
        SyncService { runner, settings }
    }

    // =========================================================================
    // Sync Control
    // =========================================================================

    /// Runs one sync now, ignoring the dealership's auto-sync flag.
    ///
    /// ## Returns
    /// * `Err(SyncError::SyncDisabled)` - The global kill switch is off
    /// * `Err(SyncError::MissingCredentials)` - No credential stored
    pub async fn trigger_sync(
        &self,
        dealership_id: DealershipId,
        sync_type: SyncType,
    ) -> EngineResult<SyncLog> {
        if !self.settings.global_sync_enabled().await? {
            return Err(SyncError::SyncDisabled);
        }
        info!(dealership_id, %sync_type, "Manual sync triggered");
        self.runner
            .run(dealership_id, sync_type)
            .await?
            .ok_or(SyncError::MissingCredentials(dealership_id))
    }

    /// Sends one local vehicle to EasyCars.
    pub async fn push_vehicle(&self, dealership_id: DealershipId, vehicle_id: &str) -> EngineResult<()> {
        let credentials = self.runner.credentials(dealership_id).await?;
        self.runner
            .stock()
            .push_vehicle(dealership_id, &credentials, vehicle_id)
            .await
    }

    /// Pushes a lead's local status to EasyCars straight away.
    pub async fn propagate_lead_status(
        &self,
        dealership_id: DealershipId,
        lead_id: &str,
    ) -> EngineResult<()> {
        let credentials = self.runner.credentials(dealership_id).await?;
        self.runner
            .leads()
            .propagate_local_status(dealership_id, &credentials, lead_id)
            .await
    }

    pub async fn list_conflicts(&self, dealership_id: DealershipId) -> EngineResult<Vec<LeadStatusConflict>> {
        Ok(self.runner.db().conflicts().list_unresolved(dealership_id).await?)
    }

    pub async fn resolve_conflict(
        &self,
        dealership_id: DealershipId,
        conflict_id: &str,
        resolution: ConflictResolution,
    ) -> EngineResult<LeadStatusConflict> {
        let credentials = self.runner.credentials(dealership_id).await?;
        self.runner
            .leads()
            .resolve_conflict(dealership_id, &credentials, conflict_id, resolution)
            .await
    }

    // =========================================================================
    // Credential Administration
    // =========================================================================

    /// Validates, encrypts and stores a dealership's first credential.
    pub async fn create_credential(
        &self,
        dealership_id: DealershipId,
        input: &CredentialInput,
    ) -> EngineResult<CredentialSummary> {
        let valid = validate_credential_input(input)?;
        let repo = self.runner.db().credentials();
        if repo.get_by_dealership(dealership_id).await?.is_some() {
            return Err(DbError::duplicate("dealership_id", dealership_id.to_string()).into());
        }

        let sealed = self.runner.vault().seal_credential(dealership_id, &valid)?;
        let stored = repo.add(&sealed).await?;
        info!(dealership_id, environment = %stored.environment, "EasyCars credential created");
        Ok(CredentialSummary::from(&stored))
    }

    /// Replaces a dealership's credential values.
    ///
    /// The environment is fixed once the dealership has a successful sync.
    pub async fn update_credential(
        &self,
        dealership_id: DealershipId,
        input: &CredentialInput,
    ) -> EngineResult<CredentialSummary> {
        let valid = validate_credential_input(input)?;
        let db = self.runner.db();
        let existing = db
            .credentials()
            .get_by_dealership(dealership_id)
            .await?
            .ok_or(SyncError::MissingCredentials(dealership_id))?;

        if valid.environment != existing.environment
            && db.sync_logs().has_successful_sync(dealership_id).await?
        {
            warn!(dealership_id, "Refused environment change after successful sync");
            return Err(SyncError::EnvironmentLocked { dealership_id });
        }

        let sealed = self.runner.vault().reseal_credential(&existing, &valid)?;
        db.credentials().update(&sealed).await?;
        info!(dealership_id, "EasyCars credential updated");
        Ok(CredentialSummary::from(&sealed))
    }

    pub async fn delete_credential(&self, dealership_id: DealershipId) -> EngineResult<()> {
        self.runner.db().credentials().delete_by_dealership(dealership_id).await?;
        info!(dealership_id, "EasyCars credential deleted");
        Ok(())
    }

    pub async fn get_credential(
        &self,
        dealership_id: DealershipId,
    ) -> EngineResult<Option<CredentialSummary>> {
        let credential = self.runner.db().credentials().get_by_dealership(dealership_id).await?;
        Ok(credential.as_ref().map(CredentialSummary::from))
    }

    /// Authenticates with the stored credential without syncing anything.
    pub async fn test_connection(&self, dealership_id: DealershipId) -> EngineResult<()> {
        let credentials = self.runner.credentials(dealership_id).await?;
        self.runner.api().authenticate(&credentials).await?;
        Ok(())
    }

    // =========================================================================
    // Dashboard Reads
    // =========================================================================

    pub async fn last_sync(
        &self,
        dealership_id: DealershipId,
        sync_type: SyncType,
    ) -> EngineResult<Option<SyncLog>> {
        Ok(self
            .runner
            .db()
            .sync_logs()
            .last_for_dealership(dealership_id, sync_type)
            .await?)
    }

    /// One page of history, newest first. `page` starts at 1.
    pub async fn history(
        &self,
        dealership_id: DealershipId,
        sync_type: Option<SyncType>,
        page: u32,
        page_size: u32,
    ) -> EngineResult<SyncHistoryPage> {
        Ok(self
            .runner
            .db()
            .sync_logs()
            .history(dealership_id, sync_type, page, page_size)
            .await?)
    }

    /// A single log row, only if it belongs to the dealership.
    pub async fn log_detail(&self, dealership_id: DealershipId, log_id: &str) -> EngineResult<SyncLog> {
        match self.runner.db().sync_logs().get_by_id(log_id).await? {
            Some(log) if log.dealership_id == dealership_id => Ok(log),
            _ => Err(SyncError::not_found("Sync log", log_id)),
        }
    }

    pub async fn status_summary(&self, dealership_id: DealershipId) -> EngineResult<SyncStatusSummary> {
        let db = self.runner.db();
        Ok(SyncStatusSummary {
            dealership_id,
            has_credentials: db.credentials().get_by_dealership(dealership_id).await?.is_some(),
            auto_sync_enabled: db.settings().is_auto_sync_enabled(dealership_id).await?,
            last_stock_sync: self.last_sync(dealership_id, SyncType::Stock).await?,
            last_lead_sync: self.last_sync(dealership_id, SyncType::Lead).await?,
            unresolved_conflicts: db.conflicts().count_unresolved(dealership_id).await?,
        })
    }

    // =========================================================================
    // Settings
    // =========================================================================

    pub async fn set_auto_sync(&self, dealership_id: DealershipId, enabled: bool) -> EngineResult<()> {
        self.runner.db().settings().set_auto_sync(dealership_id, enabled).await?;
        info!(dealership_id, enabled, "Auto-sync updated");
        Ok(())
    }

    /// Flips the system-wide kill switch.
    pub async fn set_global_sync_enabled(&self, enabled: bool) -> EngineResult<()> {
        self.runner.db().settings().set_global_sync_enabled(enabled).await?;
        warn!(enabled, "EasyCars global sync switch changed");
        Ok(())
    }
}
