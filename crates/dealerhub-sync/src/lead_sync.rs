//! # Lead Sync and Status Reconciliation
//!
//! A lead run has two passes over one dealership's leads:
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          Lead Sync Run                                  │
//! │                                                                         │
//! │  1. OUTBOUND   leads without a lead number                             │
//! │                create_lead ──► store returned lead number              │
//! │                                                                         │
//! │  2. RECONCILE  leads with a lead number                                │
//! │                get_lead ──► decide_reconciliation(local, remote)       │
//! │                                                                         │
//! │                 InSync        no write                                 │
//! │                 PushLocal     update_lead with the local status        │
//! │                 PullRemote    overwrite the local status               │
//! │                 FlagConflict  INSERT OR IGNORE conflict row            │
//! │                               (one unresolved row per lead)            │
//! │                                                                         │
//! │  Leads linked by pass 1 are not reconciled again in the same run.      │
//! │  An authentication failure stops the run: every later call would      │
//! │  fail the same way.                                                    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::client::{EasyCarsApi, LeadPayload};
use crate::error::{EngineResult, SyncError};
use crate::vault::AccountCredentials;
use dealerhub_core::{
    decide_reconciliation, ConflictResolution, ConflictResolutionStrategy, DealershipId, Lead,
    LeadStatusConflict, ReconcileAction, RemoteLeadStatus, SyncResult,
};
use dealerhub_db::Database;

/// What reconciliation did for one lead.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileOutcome {
    InSync,
    PushedLocal,
    PulledRemote,
    /// `created` is false when the lead already had an open conflict.
    Flagged { created: bool },
}

pub struct LeadSyncEngine {
    db: Database,
    api: Arc<dyn EasyCarsApi>,
    strategy: ConflictResolutionStrategy,
}

impl LeadSyncEngine {
    pub fn new(
        db: Database,
        api: Arc<dyn EasyCarsApi>,
        strategy: ConflictResolutionStrategy,
    ) -> Self {
        LeadSyncEngine { db, api, strategy }
    }

    pub fn strategy(&self) -> ConflictResolutionStrategy {
        self.strategy
    }

    /// Runs the outbound and reconcile passes for a dealership.
    pub async fn sync(
        &self,
        dealership_id: DealershipId,
        credentials: &AccountCredentials,
    ) -> SyncResult {
        let started = Instant::now();
        let mut result = SyncResult::new();

        let unsent = match self.db.leads().list_unsent(dealership_id).await {
            Ok(leads) => leads,
            Err(err) => {
                return SyncResult::aborted(format!("Failed to load leads: {err}"), started.elapsed())
            }
        };
        let mut sent = HashSet::new();
        for lead in &unsent {
            match self.send_lead(dealership_id, credentials, lead).await {
                Ok(_) => {
                    sent.insert(lead.id.as_str());
                    result.record_success();
                }
                Err(err) if err.is_auth_error() => {
                    return stop_on_auth(result, &err, started.elapsed());
                }
                Err(err) => {
                    warn!(dealership_id, lead_id = %lead.id, error = %err, "Lead create failed");
                    result.record_failure(format!("Lead {}: {err}", lead.id));
                }
            }
        }

        let linked = match self.db.leads().list_linked(dealership_id).await {
            Ok(leads) => leads
                .into_iter()
                .filter(|lead| !sent.contains(lead.id.as_str()))
                .collect::<Vec<_>>(),
            Err(err) => {
                result.merge(SyncResult::aborted(
                    format!("Failed to load leads: {err}"),
                    Duration::ZERO,
                ));
                return result.finish(started.elapsed());
            }
        };
        for lead in &linked {
            match self.reconcile_lead(dealership_id, credentials, lead).await {
                Ok(ReconcileOutcome::InSync) => result.record_skipped(),
                Ok(_) => result.record_success(),
                Err(err) if err.is_auth_error() => {
                    return stop_on_auth(result, &err, started.elapsed());
                }
                Err(err) => {
                    warn!(dealership_id, lead_id = %lead.id, error = %err, "Lead reconcile failed");
                    result.record_failure(format!("Lead {}: {err}", lead.id));
                }
            }
        }

        info!(
            dealership_id,
            outbound = unsent.len(),
            reconciled = linked.len(),
            failed = result.failed,
            "Lead sync finished"
        );
        result.finish(started.elapsed())
    }

    /// Creates a local-only lead in EasyCars and stores the lead number.
    pub async fn send_lead(
        &self,
        dealership_id: DealershipId,
        credentials: &AccountCredentials,
        lead: &Lead,
    ) -> EngineResult<String> {
        let stock_number = match &lead.vehicle_id {
            Some(vehicle_id) => self
                .db
                .vehicles()
                .get_by_id(vehicle_id)
                .await?
                .and_then(|v| v.stock_number),
            None => None,
        };

        let payload = LeadPayload::from_lead(lead, stock_number);
        let lead_number = self
            .api
            .create_lead(dealership_id, credentials, &payload)
            .await?;
        self.db.leads().set_lead_number(&lead.id, &lead_number).await?;
        debug!(dealership_id, lead_id = %lead.id, %lead_number, "Lead linked to EasyCars");
        Ok(lead_number)
    }

    /// Compares one linked lead with EasyCars and applies the strategy.
    pub async fn reconcile_lead(
        &self,
        dealership_id: DealershipId,
        credentials: &AccountCredentials,
        lead: &Lead,
    ) -> EngineResult<ReconcileOutcome> {
        let lead_number = lead
            .easycars_lead_number
            .as_deref()
            .ok_or_else(|| SyncError::not_found("EasyCars lead number for lead", &lead.id))?;

        let remote = self
            .api
            .get_lead(dealership_id, credentials, lead_number)
            .await?;
        let remote_status = RemoteLeadStatus::from_code(remote.status_code)?;

        match decide_reconciliation(lead.status, remote_status, self.strategy) {
            ReconcileAction::InSync => Ok(ReconcileOutcome::InSync),
            ReconcileAction::PushLocal(status) => {
                let payload = LeadPayload::from_lead(lead, None);
                self.api
                    .update_lead(dealership_id, credentials, lead_number, &payload)
                    .await?;
                debug!(lead_id = %lead.id, code = status.code(), "Pushed local lead status");
                Ok(ReconcileOutcome::PushedLocal)
            }
            ReconcileAction::PullRemote(status) => {
                self.db.leads().update_status(&lead.id, status).await?;
                debug!(lead_id = %lead.id, %status, "Pulled remote lead status");
                Ok(ReconcileOutcome::PulledRemote)
            }
            ReconcileAction::FlagConflict { local, remote } => {
                let created = self
                    .db
                    .conflicts()
                    .create_if_absent(&lead.id, dealership_id, local, remote, self.strategy)
                    .await?;
                if created {
                    info!(lead_id = %lead.id, %local, %remote, "Lead status conflict flagged");
                }
                Ok(ReconcileOutcome::Flagged { created })
            }
        }
    }

    // =========================================================================
    // Admin-driven operations
    // =========================================================================

    /// Pushes a lead's current local status to EasyCars now.
    ///
    /// A lead that was never sent is created instead.
    pub async fn propagate_local_status(
        &self,
        dealership_id: DealershipId,
        credentials: &AccountCredentials,
        lead_id: &str,
    ) -> EngineResult<()> {
        let lead = self.load_lead(dealership_id, lead_id).await?;
        match lead.easycars_lead_number.as_deref() {
            Some(lead_number) => {
                let payload = LeadPayload::from_lead(&lead, None);
                self.api
                    .update_lead(dealership_id, credentials, lead_number, &payload)
                    .await?;
                info!(dealership_id, lead_id, status = %lead.status, "Propagated lead status");
            }
            None => {
                self.send_lead(dealership_id, credentials, &lead).await?;
            }
        }
        Ok(())
    }

    /// Settles an open conflict.
    ///
    /// `KeepLocal` re-sends the local status; `AcceptRemote` writes the
    /// remote status locally. The conflict is marked resolved afterwards.
    pub async fn resolve_conflict(
        &self,
        dealership_id: DealershipId,
        credentials: &AccountCredentials,
        conflict_id: &str,
        resolution: ConflictResolution,
    ) -> EngineResult<LeadStatusConflict> {
        let conflict = self
            .db
            .conflicts()
            .get_by_id(conflict_id)
            .await?
            .filter(|c| c.dealership_id == dealership_id)
            .ok_or_else(|| SyncError::not_found("Conflict", conflict_id))?;
        if conflict.resolved {
            return Err(SyncError::not_found("Unresolved conflict", conflict_id));
        }

        match resolution {
            ConflictResolution::KeepLocal => {
                self.propagate_local_status(dealership_id, credentials, &conflict.lead_id)
                    .await?;
            }
            ConflictResolution::AcceptRemote => {
                self.db
                    .leads()
                    .update_status(&conflict.lead_id, conflict.remote_status)
                    .await?;
            }
        }

        self.db.conflicts().resolve(conflict_id, resolution).await?;
        info!(dealership_id, conflict_id, ?resolution, "Lead status conflict resolved");
        self.db
            .conflicts()
            .get_by_id(conflict_id)
            .await?
            .ok_or_else(|| SyncError::not_found("Conflict", conflict_id))
    }

    async fn load_lead(&self, dealership_id: DealershipId, lead_id: &str) -> EngineResult<Lead> {
        self.db
            .leads()
            .get_by_id(lead_id)
            .await?
            .filter(|l| l.dealership_id == dealership_id)
            .ok_or_else(|| SyncError::not_found("Lead", lead_id))
    }
}

fn stop_on_auth(mut result: SyncResult, err: &SyncError, elapsed: Duration) -> SyncResult {
    warn!(error = %err, "EasyCars rejected credentials, stopping lead sync");
    result.merge(SyncResult::aborted(
        format!("Authentication failed: {err}"),
        Duration::ZERO,
    ));
    result.finish(elapsed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::ApiError;
    use crate::testing::{account, test_db, FakeApi};
    use chrono::Utc;
    use dealerhub_core::{LeadStatus, SyncStatus};

    fn lead(id: &str, status: LeadStatus, lead_number: Option<&str>) -> Lead {
        Lead {
            id: id.into(),
            dealership_id: 1,
            vehicle_id: None,
            customer_name: "Sam Driver".into(),
            email: "sam@example.com".into(),
            phone: Some("0400 000 000".into()),
            message: None,
            status,
            easycars_lead_number: lead_number.map(str::to_string),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    async fn engine(
        strategy: ConflictResolutionStrategy,
    ) -> (LeadSyncEngine, Arc<FakeApi>, Database) {
        let db = test_db().await;
        let api = FakeApi::new();
        (LeadSyncEngine::new(db.clone(), api.clone(), strategy), api, db)
    }

    #[tokio::test]
    async fn test_unsent_leads_are_created_and_linked() {
        let (engine, api, db) = engine(ConflictResolutionStrategy::ManualReview).await;
        db.leads().add(&lead("l1", LeadStatus::Received, None)).await.unwrap();

        let result = engine.sync(1, &account()).await;
        assert_eq!(result.status(), SyncStatus::Success);

        let stored = db.leads().get_by_id("l1").await.unwrap().unwrap();
        assert_eq!(stored.easycars_lead_number.as_deref(), Some("EC-1"));
        assert_eq!(api.created.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_done_goes_out_as_won() {
        let (engine, api, db) = engine(ConflictResolutionStrategy::LocalWins).await;
        db.leads().add(&lead("l1", LeadStatus::Done, Some("EC-7"))).await.unwrap();
        api.set_remote_lead("EC-7", RemoteLeadStatus::InProgress.code());

        let outcome = engine
            .reconcile_lead(1, &account(), &lead("l1", LeadStatus::Done, Some("EC-7")))
            .await
            .unwrap();
        assert_eq!(outcome, ReconcileOutcome::PushedLocal);
        assert_eq!(api.remote_lead("EC-7"), Some(3));

        // Done locally and Won remotely agree.
        let outcome = engine
            .reconcile_lead(1, &account(), &lead("l1", LeadStatus::Done, Some("EC-7")))
            .await
            .unwrap();
        assert_eq!(outcome, ReconcileOutcome::InSync);
    }

    #[tokio::test]
    async fn test_remote_wins_overwrites_local() {
        let (engine, api, db) = engine(ConflictResolutionStrategy::RemoteWins).await;
        db.leads().add(&lead("l1", LeadStatus::InProgress, Some("EC-1"))).await.unwrap();
        api.set_remote_lead("EC-1", RemoteLeadStatus::Lost.code());

        let result = engine.sync(1, &account()).await;
        assert_eq!((result.succeeded, result.skipped), (1, 0));
        let stored = db.leads().get_by_id("l1").await.unwrap().unwrap();
        assert_eq!(stored.status, LeadStatus::Lost);
        assert!(api.updated.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_manual_review_flags_one_conflict() {
        let (engine, api, db) = engine(ConflictResolutionStrategy::ManualReview).await;
        let diverged = lead("l1", LeadStatus::Won, Some("EC-1"));
        db.leads().add(&diverged).await.unwrap();
        api.set_remote_lead("EC-1", RemoteLeadStatus::Lost.code());

        let first = engine.reconcile_lead(1, &account(), &diverged).await.unwrap();
        let second = engine.reconcile_lead(1, &account(), &diverged).await.unwrap();
        assert_eq!(first, ReconcileOutcome::Flagged { created: true });
        assert_eq!(second, ReconcileOutcome::Flagged { created: false });
        assert_eq!(db.conflicts().count_unresolved(1).await.unwrap(), 1);

        // No automatic action on either side.
        assert_eq!(
            db.leads().get_by_id("l1").await.unwrap().unwrap().status,
            LeadStatus::Won
        );
        assert!(api.updated.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_resolve_conflict_accept_remote() {
        let (engine, api, db) = engine(ConflictResolutionStrategy::ManualReview).await;
        let diverged = lead("l1", LeadStatus::Won, Some("EC-1"));
        db.leads().add(&diverged).await.unwrap();
        api.set_remote_lead("EC-1", RemoteLeadStatus::Lost.code());
        engine.reconcile_lead(1, &account(), &diverged).await.unwrap();

        let open = db.conflicts().list_unresolved(1).await.unwrap().remove(0);
        let resolved = engine
            .resolve_conflict(1, &account(), &open.id, ConflictResolution::AcceptRemote)
            .await
            .unwrap();
        assert!(resolved.resolved);
        assert_eq!(resolved.resolution, Some(ConflictResolution::AcceptRemote));
        assert_eq!(
            db.leads().get_by_id("l1").await.unwrap().unwrap().status,
            LeadStatus::Lost
        );

        let again = engine
            .resolve_conflict(1, &account(), &open.id, ConflictResolution::KeepLocal)
            .await;
        assert!(matches!(again, Err(SyncError::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_resolve_conflict_keep_local_pushes() {
        let (engine, api, db) = engine(ConflictResolutionStrategy::ManualReview).await;
        let diverged = lead("l1", LeadStatus::Won, Some("EC-1"));
        db.leads().add(&diverged).await.unwrap();
        api.set_remote_lead("EC-1", RemoteLeadStatus::Lost.code());
        engine.reconcile_lead(1, &account(), &diverged).await.unwrap();

        let open = db.conflicts().list_unresolved(1).await.unwrap().remove(0);
        engine
            .resolve_conflict(1, &account(), &open.id, ConflictResolution::KeepLocal)
            .await
            .unwrap();
        assert_eq!(api.remote_lead("EC-1"), Some(3));
        assert_eq!(db.conflicts().count_unresolved(1).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_auth_failure_stops_run() {
        let (engine, api, db) = engine(ConflictResolutionStrategy::ManualReview).await;
        db.leads().add(&lead("l1", LeadStatus::Received, None)).await.unwrap();
        db.leads().add(&lead("l2", LeadStatus::Received, None)).await.unwrap();
        api.fail_create(ApiError::Authentication { message: "expired".into() });

        let result = engine.sync(1, &account()).await;
        assert!(result.is_aborted());
        assert_eq!(result.status(), SyncStatus::Failed);
        assert_eq!(result.errors.len(), 1);
    }

    #[tokio::test]
    async fn test_auth_failure_after_progress_is_partial() {
        let (engine, api, db) = engine(ConflictResolutionStrategy::ManualReview).await;
        db.leads().add(&lead("l1", LeadStatus::Received, None)).await.unwrap();
        db.leads().add(&lead("l2", LeadStatus::Received, None)).await.unwrap();
        api.fail_create_after(1, ApiError::Authentication { message: "revoked".into() });

        let result = engine.sync(1, &account()).await;
        assert!(result.is_aborted());
        assert_eq!(result.succeeded, 1);
        assert_eq!(result.status(), SyncStatus::PartialSuccess);
        assert_eq!(api.created.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_new_leads_are_counted_once() {
        let (engine, api, db) = engine(ConflictResolutionStrategy::ManualReview).await;
        db.leads().add(&lead("l0", LeadStatus::Received, Some("EC-0"))).await.unwrap();
        db.leads().add(&lead("l1", LeadStatus::Received, None)).await.unwrap();
        api.set_remote_lead("EC-0", RemoteLeadStatus::from(LeadStatus::Received).code());

        let result = engine.sync(1, &account()).await;
        assert_eq!(result.processed, 2);
        assert_eq!((result.succeeded, result.skipped), (2, 1));
        assert_eq!(result.status(), SyncStatus::Success);
    }

    #[tokio::test]
    async fn test_failed_create_is_item_failure() {
        let (engine, api, db) = engine(ConflictResolutionStrategy::ManualReview).await;
        db.leads().add(&lead("l1", LeadStatus::Received, None)).await.unwrap();
        api.fail_create(ApiError::Validation { message: "bad email".into() });

        let result = engine.sync(1, &account()).await;
        assert_eq!((result.processed, result.failed), (1, 1));
        assert!(result.errors[0].contains("bad email"));
        assert!(db.leads().get_by_id("l1").await.unwrap().unwrap().easycars_lead_number.is_none());
    }
}
