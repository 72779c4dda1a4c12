//! # Sync Scheduler
//!
//! One pass over every auto-sync dealership for one sync type.
//!
//! ## Pass State Machine
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │   Idle ──► CheckGlobalFlag ──(off)──► done (no queries, no logs)       │
//! │                  │ on                                                   │
//! │                  ▼                                                      │
//! │         FetchEligibleDealerships                                        │
//! │                  │                                                      │
//! │                  ▼                                                      │
//! │   ┌────────────────────────────────────────────────────────────────┐   │
//! │   │  for each dealership (up to max_concurrent at once)            │   │
//! │   │                                                                │   │
//! │   │   shutdown signalled? ── yes ──► not started                   │   │
//! │   │          │ no                                                  │   │
//! │   │          ▼                                                     │   │
//! │   │   SyncRunner::run ── Ok(None) ──► skipped (no credential)      │   │
//! │   │          │                                                     │   │
//! │   │          ├── Ok(log) ──► recorded                              │   │
//! │   │          └── Err ──► logged, Failed row written                │   │
//! │   │                                                                │   │
//! │   │   One dealership's failure never stops the others.             │   │
//! │   └────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use futures_util::stream::{self, StreamExt};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::watch;
use tracing::{error, info, warn};

use crate::error::EngineResult;
use crate::runner::SyncRunner;
use crate::settings::SettingsProvider;
use dealerhub_core::{DealershipId, SyncLog, SyncStatus, SyncType};

/// Result of one dealership within a pass.
#[derive(Debug, Clone)]
enum DealershipOutcome {
    Recorded(SyncLog),
    NoCredentials(DealershipId),
    NotStarted(DealershipId),
    /// The run failed and its log row could not be written either.
    Unrecorded(DealershipId),
}

/// Summary of one scheduler pass.
#[derive(Debug, Clone, PartialEq)]
pub struct PassReport {
    pub sync_type: SyncType,
    /// The kill switch was off; nothing else happened.
    pub disabled: bool,
    /// Log rows written in this pass, one per attempted dealership.
    pub logs: Vec<SyncLog>,
    pub skipped_no_credentials: Vec<DealershipId>,
    /// Dealerships left out because shutdown was signalled.
    pub not_started: Vec<DealershipId>,
    pub unrecorded: Vec<DealershipId>,
}

impl PassReport {
    fn new(sync_type: SyncType) -> Self {
        PassReport {
            sync_type,
            disabled: false,
            logs: Vec::new(),
            skipped_no_credentials: Vec::new(),
            not_started: Vec::new(),
            unrecorded: Vec::new(),
        }
    }

    fn disabled(sync_type: SyncType) -> Self {
        PassReport {
            disabled: true,
            ..Self::new(sync_type)
        }
    }

    /// Dealerships whose sync was attempted.
    pub fn attempted(&self) -> usize {
        self.logs.len() + self.unrecorded.len()
    }

    pub fn failed(&self) -> usize {
        self.logs
            .iter()
            .filter(|log| log.status == SyncStatus::Failed)
            .count()
            + self.unrecorded.len()
    }

    fn add(&mut self, outcome: DealershipOutcome) {
        match outcome {
            DealershipOutcome::Recorded(log) => self.logs.push(log),
            DealershipOutcome::NoCredentials(id) => self.skipped_no_credentials.push(id),
            DealershipOutcome::NotStarted(id) => self.not_started.push(id),
            DealershipOutcome::Unrecorded(id) => self.unrecorded.push(id),
        }
    }
}

/// Periodic sync across dealerships.
pub struct SyncScheduler {
    settings: Arc<dyn SettingsProvider>,
    runner: Arc<SyncRunner>,
    max_concurrent: usize,
}

impl SyncScheduler {
    pub fn new(
        settings: Arc<dyn SettingsProvider>,
        runner: Arc<SyncRunner>,
        max_concurrent: usize,
    ) -> Self {
        SyncScheduler {
            settings,
            runner,
            max_concurrent: max_concurrent.max(1),
        }
    }

    /// Runs one pass for `sync_type`.
    ///
    /// Once `shutdown` holds `true`, no further dealership sync starts;
    /// syncs already running finish and write their log.
    pub async fn run_pass(
        &self,
        sync_type: SyncType,
        shutdown: &watch::Receiver<bool>,
    ) -> EngineResult<PassReport> {
        if !self.settings.global_sync_enabled().await? {
            info!(%sync_type, "EasyCars sync disabled system-wide, skipping pass");
            return Ok(PassReport::disabled(sync_type));
        }

        let started = Instant::now();
        let dealerships = self.settings.auto_sync_dealerships().await?;
        info!(%sync_type, dealerships = dealerships.len(), "Starting sync pass");

        let outcomes: Vec<DealershipOutcome> = stream::iter(dealerships)
            .map(|dealership_id| async move {
                let stopping = *shutdown.borrow();
                if stopping {
                    return DealershipOutcome::NotStarted(dealership_id);
                }
                self.run_dealership(dealership_id, sync_type).await
            })
            .buffer_unordered(self.max_concurrent)
            .collect()
            .await;

        let mut report = PassReport::new(sync_type);
        for outcome in outcomes {
            report.add(outcome);
        }

        if !report.not_started.is_empty() {
            warn!(%sync_type, not_started = report.not_started.len(), "Pass cut short by shutdown");
        }
        info!(
            %sync_type,
            attempted = report.attempted(),
            failed = report.failed(),
            skipped = report.skipped_no_credentials.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Sync pass finished"
        );
        Ok(report)
    }

    async fn run_dealership(&self, dealership_id: DealershipId, sync_type: SyncType) -> DealershipOutcome {
        let started = Instant::now();
        match self.runner.run(dealership_id, sync_type).await {
            Ok(Some(log)) => DealershipOutcome::Recorded(log),
            Ok(None) => DealershipOutcome::NoCredentials(dealership_id),
            Err(err) => {
                error!(dealership_id, %sync_type, error = %err, "Dealership sync failed");
                match self
                    .runner
                    .record_failure(dealership_id, sync_type, &err, started.elapsed())
                    .await
                {
                    Ok(log) => DealershipOutcome::Recorded(log),
                    Err(log_err) => {
                        error!(dealership_id, error = %log_err, "Could not record failed sync");
                        DealershipOutcome::Unrecorded(dealership_id)
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::ApiError;
    use crate::config::SyncSettings;
    use crate::settings::StaticSettings;
    use crate::testing::{seed_credential, test_db, test_vault, FakeApi};
    use dealerhub_db::Database;

    async fn setup(
        settings: Arc<StaticSettings>,
        max_concurrent: usize,
    ) -> (SyncScheduler, Arc<FakeApi>, Database) {
        let db = test_db().await;
        let api = FakeApi::new();
        let runner = Arc::new(SyncRunner::new(
            db.clone(),
            test_vault(),
            api.clone(),
            &SyncSettings::default(),
        ));
        (SyncScheduler::new(settings, runner, max_concurrent), api, db)
    }

    #[tokio::test]
    async fn test_kill_switch_stops_before_any_query() {
        let settings = Arc::new(StaticSettings::new(false, vec![1, 2]));
        let (scheduler, _api, db) = setup(settings.clone(), 1).await;
        seed_credential(&db, &test_vault(), 1).await;
        let (_tx, rx) = watch::channel(false);

        let report = scheduler.run_pass(SyncType::Stock, &rx).await.unwrap();
        assert!(report.disabled);
        assert_eq!(settings.dealership_reads(), 0);
        assert_eq!(db.sync_logs().count_for_dealership(1).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_failure_is_isolated() {
        let settings = Arc::new(StaticSettings::new(true, vec![1, 2, 3]));
        let (scheduler, api, db) = setup(settings, 1).await;
        for id in [1, 2, 3] {
            seed_credential(&db, &test_vault(), id).await;
        }
        api.fail_stock(2, ApiError::Fatal { message: "account suspended".into() });
        let (_tx, rx) = watch::channel(false);

        let report = scheduler.run_pass(SyncType::Stock, &rx).await.unwrap();
        assert_eq!(report.attempted(), 3);
        assert_eq!(report.failed(), 1);
        for id in [1, 2, 3] {
            assert_eq!(db.sync_logs().count_for_dealership(id).await.unwrap(), 1);
        }
        let failed = db
            .sync_logs()
            .last_for_dealership(2, SyncType::Stock)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(failed.status, SyncStatus::Failed);
    }

    #[tokio::test]
    async fn test_shutdown_prevents_new_syncs() {
        let settings = Arc::new(StaticSettings::new(true, vec![1, 2]));
        let (scheduler, _api, db) = setup(settings, 1).await;
        seed_credential(&db, &test_vault(), 1).await;
        let (tx, rx) = watch::channel(false);
        tx.send(true).unwrap();

        let report = scheduler.run_pass(SyncType::Lead, &rx).await.unwrap();
        assert_eq!(report.not_started.len(), 2);
        assert_eq!(report.attempted(), 0);
        assert_eq!(db.sync_logs().count_for_dealership(1).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_concurrent_pass_matches_sequential() {
        let settings = Arc::new(StaticSettings::new(true, vec![1, 2, 3, 4]));
        let (scheduler, _api, db) = setup(settings, 3).await;
        for id in [1, 2, 4] {
            seed_credential(&db, &test_vault(), id).await;
        }
        let (_tx, rx) = watch::channel(false);

        let report = scheduler.run_pass(SyncType::Stock, &rx).await.unwrap();
        assert_eq!(report.attempted(), 3);
        assert_eq!(report.skipped_no_credentials, vec![3]);
    }
}
