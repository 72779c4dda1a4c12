//! # Sync Runner
//!
//! Runs one sync for one dealership and writes its log row:
//!
//! ```text
//! credential row? ── no ──► Ok(None)       (skipped, nothing written)
//!       │ yes
//!       ▼
//! vault.open_credential ── error ──► aborted result (Failed)
//!       │ ok
//!       ▼
//! StockSyncEngine / LeadSyncEngine ──► SyncResult
//!       │
//!       ▼
//! exactly one easycars_sync_logs row
//! ```

use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info};

use crate::client::EasyCarsApi;
use crate::config::SyncSettings;
use crate::error::{EngineResult, SyncError};
use crate::lead_sync::LeadSyncEngine;
use crate::stock_sync::StockSyncEngine;
use crate::vault::{AccountCredentials, CredentialVault};
use dealerhub_core::{DealershipId, SyncLog, SyncResult, SyncType};
use dealerhub_db::Database;

/// Shared by the scheduler and the admin service.
pub struct SyncRunner {
    db: Database,
    vault: Arc<CredentialVault>,
    api: Arc<dyn EasyCarsApi>,
    stock: StockSyncEngine,
    leads: LeadSyncEngine,
}

impl SyncRunner {
    pub fn new(
        db: Database,
        vault: Arc<CredentialVault>,
        api: Arc<dyn EasyCarsApi>,
        settings: &SyncSettings,
    ) -> Self {
        SyncRunner {
            stock: StockSyncEngine::new(db.clone(), api.clone(), settings.remote_only_policy),
            leads: LeadSyncEngine::new(db.clone(), api.clone(), settings.conflict_strategy),
            db,
            vault,
            api,
        }
    }

    pub fn db(&self) -> &Database {
        &self.db
    }

    pub fn vault(&self) -> &CredentialVault {
        &self.vault
    }

    pub fn api(&self) -> &Arc<dyn EasyCarsApi> {
        &self.api
    }

    pub fn stock(&self) -> &StockSyncEngine {
        &self.stock
    }

    pub fn leads(&self) -> &LeadSyncEngine {
        &self.leads
    }

    /// Loads and decrypts a dealership's credentials.
    pub async fn credentials(&self, dealership_id: DealershipId) -> EngineResult<AccountCredentials> {
        let credential = self
            .db
            .credentials()
            .get_by_dealership(dealership_id)
            .await?
            .ok_or(SyncError::MissingCredentials(dealership_id))?;
        Ok(self.vault.open_credential(&credential)?)
    }

    /// Runs one sync and records it.
    ///
    /// Returns `Ok(None)` when the dealership has no credential; no log row
    /// is written in that case.
    pub async fn run(
        &self,
        dealership_id: DealershipId,
        sync_type: SyncType,
    ) -> EngineResult<Option<SyncLog>> {
        let started = Instant::now();

        let Some(credential) = self.db.credentials().get_by_dealership(dealership_id).await? else {
            debug!(dealership_id, %sync_type, "No EasyCars credentials, skipping");
            return Ok(None);
        };

        let result = match self.vault.open_credential(&credential) {
            Ok(credentials) => match sync_type {
                SyncType::Stock => self.stock.sync(dealership_id, &credentials).await,
                SyncType::Lead => self.leads.sync(dealership_id, &credentials).await,
            },
            Err(err) => {
                error!(dealership_id, error = %err, "Could not decrypt EasyCars credentials");
                SyncResult::aborted(
                    format!("Failed to decrypt credentials: {err}"),
                    started.elapsed(),
                )
            }
        };

        let log = sync_log(dealership_id, sync_type, &result, Utc::now());
        self.db.sync_logs().add(&log).await?;
        info!(
            dealership_id,
            %sync_type,
            status = %log.status,
            processed = log.items_processed,
            failed = log.items_failed,
            duration_ms = log.duration_ms,
            "Sync recorded"
        );
        Ok(Some(log))
    }

    /// Records a run that ended in an error before a log could be written.
    pub async fn record_failure(
        &self,
        dealership_id: DealershipId,
        sync_type: SyncType,
        err: &SyncError,
        elapsed: Duration,
    ) -> EngineResult<SyncLog> {
        let result = SyncResult::aborted(err.to_string(), elapsed);
        let log = sync_log(dealership_id, sync_type, &result, Utc::now());
        self.db.sync_logs().add(&log).await?;
        Ok(log)
    }
}

/// Builds the log row for a finished run.
pub fn sync_log(
    dealership_id: DealershipId,
    sync_type: SyncType,
    result: &SyncResult,
    synced_at: DateTime<Utc>,
) -> SyncLog {
    SyncLog {
        id: uuid::Uuid::new_v4().to_string(),
        dealership_id,
        sync_type,
        status: result.status(),
        items_processed: result.processed,
        items_succeeded: result.succeeded,
        items_failed: result.failed,
        errors: result.errors.clone(),
        duration_ms: result.elapsed.as_millis() as i64,
        synced_at,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{seed_credential, test_db, test_vault, FakeApi};
    use dealerhub_core::SyncStatus;
    use serde_json::json;

    async fn runner() -> (SyncRunner, Arc<FakeApi>, Database) {
        let db = test_db().await;
        let api = FakeApi::new();
        let runner = SyncRunner::new(db.clone(), test_vault(), api.clone(), &SyncSettings::default());
        (runner, api, db)
    }

    #[tokio::test]
    async fn test_no_credential_writes_nothing() {
        let (runner, _api, db) = runner().await;
        assert!(runner.run(1, SyncType::Stock).await.unwrap().is_none());
        assert_eq!(db.sync_logs().count_for_dealership(1).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_run_writes_one_log() {
        let (runner, api, db) = runner().await;
        seed_credential(&db, &test_vault(), 1).await;
        api.set_stock(
            1,
            vec![json!({"StockNumber": "A1", "Make": "Ford", "Model": "Ranger", "Year": 2022})],
        );

        let log = runner.run(1, SyncType::Stock).await.unwrap().unwrap();
        assert_eq!(log.status, SyncStatus::Success);
        assert_eq!(log.items_processed, 1);

        let stored = db.sync_logs().get_by_id(&log.id).await.unwrap().unwrap();
        assert_eq!(stored.sync_type, SyncType::Stock);
        assert_eq!(db.sync_logs().count_for_dealership(1).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_undecryptable_credential_is_failed_run() {
        let (runner, _api, db) = runner().await;
        let other_vault = CredentialVault::new(&[8u8; 32]).unwrap();
        seed_credential(&db, &other_vault, 1).await;

        let log = runner.run(1, SyncType::Lead).await.unwrap().unwrap();
        assert_eq!(log.status, SyncStatus::Failed);
        assert_eq!(log.errors.len(), 1);
        assert!(log.errors[0].contains("decrypt"));
    }

    #[test]
    fn test_sync_log_from_result() {
        let mut result = SyncResult::new();
        result.record_success();
        result.record_failure("Stock X: make is required");
        let result = result.finish(Duration::from_millis(1500));

        let log = sync_log(3, SyncType::Stock, &result, Utc::now());
        assert_eq!(log.status, SyncStatus::PartialSuccess);
        assert_eq!(
            (log.items_processed, log.items_succeeded, log.items_failed),
            (2, 1, 1)
        );
        assert_eq!(log.duration_ms, 1500);
    }
}
