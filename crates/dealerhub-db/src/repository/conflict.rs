//! # Lead Status Conflict Repository
//!
//! ## Deduplication
//! ```text
//! reconcile pass 1 ──► create_if_absent(lead A) ──► inserted  (true)
//! reconcile pass 2 ──► create_if_absent(lead A) ──► ignored   (false)
//!                           │
//!                           └── partial unique index:
//!                               lead_status_conflicts(lead_id) WHERE resolved = 0
//! resolve(conflict)  ──► resolved = 1 ──► lead A may conflict again later
//! ```
//!
//! Storage enforces the single-unresolved-conflict rule, so concurrent
//! reconcile passes cannot race each other into duplicates.

use chrono::Utc;
use sqlx::SqlitePool;
use tracing::debug;

use crate::error::{DbError, DbResult};
use dealerhub_core::{
    ConflictResolution, ConflictResolutionStrategy, DealershipId, LeadStatus, LeadStatusConflict,
};

const SELECT_COLUMNS: &str = r#"
    SELECT id, lead_id, dealership_id, local_status, remote_status, strategy,
           resolved, resolution, created_at, resolved_at
    FROM lead_status_conflicts
"#;

/// Repository for lead status conflicts.
#[derive(Debug, Clone)]
pub struct ConflictRepository {
    pool: SqlitePool,
}

impl ConflictRepository {
    pub fn new(pool: SqlitePool) -> Self {
        ConflictRepository { pool }
    }

    /// Records a conflict unless the lead already has an unresolved one.
    ///
    /// Returns `true` when a row was inserted.
    pub async fn create_if_absent(
        &self,
        lead_id: &str,
        dealership_id: DealershipId,
        local_status: LeadStatus,
        remote_status: LeadStatus,
        strategy: ConflictResolutionStrategy,
    ) -> DbResult<bool> {
        let result = sqlx::query(
            r#"
            INSERT OR IGNORE INTO lead_status_conflicts (
                id, lead_id, dealership_id, local_status, remote_status, strategy,
                resolved, resolution, created_at, resolved_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, 0, NULL, ?7, NULL)
            "#,
        )
        .bind(uuid::Uuid::new_v4().to_string())
        .bind(lead_id)
        .bind(dealership_id)
        .bind(local_status)
        .bind(remote_status)
        .bind(strategy)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        let inserted = result.rows_affected() > 0;
        debug!(lead_id, inserted, "Lead status conflict recorded");
        Ok(inserted)
    }

    /// Gets a conflict by its ID.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<LeadStatusConflict>> {
        let sql = format!("{SELECT_COLUMNS} WHERE id = ?1");
        let conflict = sqlx::query_as::<_, LeadStatusConflict>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(conflict)
    }

    /// The open conflict for a lead, if any.
    pub async fn unresolved_for_lead(&self, lead_id: &str) -> DbResult<Option<LeadStatusConflict>> {
        let sql = format!("{SELECT_COLUMNS} WHERE lead_id = ?1 AND resolved = 0");
        let conflict = sqlx::query_as::<_, LeadStatusConflict>(&sql)
            .bind(lead_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(conflict)
    }

    /// Open conflicts for a dealership, oldest first.
    pub async fn list_unresolved(
        &self,
        dealership_id: DealershipId,
    ) -> DbResult<Vec<LeadStatusConflict>> {
        let sql = format!(
            "{SELECT_COLUMNS} WHERE dealership_id = ?1 AND resolved = 0 ORDER BY created_at, id"
        );
        let conflicts = sqlx::query_as::<_, LeadStatusConflict>(&sql)
            .bind(dealership_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(conflicts)
    }

    pub async fn count_unresolved(&self, dealership_id: DealershipId) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM lead_status_conflicts WHERE dealership_id = ?1 AND resolved = 0",
        )
        .bind(dealership_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }

    /// Marks an open conflict as resolved.
    ///
    /// ## Returns
    /// * `Err(DbError::NotFound)` - No open conflict with this id
    pub async fn resolve(&self, id: &str, resolution: ConflictResolution) -> DbResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE lead_status_conflicts
            SET resolved = 1, resolution = ?2, resolved_at = ?3
            WHERE id = ?1 AND resolved = 0
            "#,
        )
        .bind(id)
        .bind(resolution)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Open conflict", id));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Database, DbConfig};
    use dealerhub_core::Lead;

    async fn seed_lead(db: &Database) -> Lead {
        let now = Utc::now();
        db.leads()
            .add(&Lead {
                id: uuid::Uuid::new_v4().to_string(),
                dealership_id: 1,
                vehicle_id: None,
                customer_name: "Ana".into(),
                email: "ana@example.com".into(),
                phone: None,
                message: None,
                status: LeadStatus::InProgress,
                easycars_lead_number: Some("L-1".into()),
                created_at: now,
                updated_at: now,
            })
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_one_unresolved_conflict_per_lead() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let lead = seed_lead(&db).await;
        let repo = db.conflicts();

        let first = repo
            .create_if_absent(
                &lead.id,
                1,
                LeadStatus::InProgress,
                LeadStatus::Lost,
                ConflictResolutionStrategy::ManualReview,
            )
            .await
            .unwrap();
        let second = repo
            .create_if_absent(
                &lead.id,
                1,
                LeadStatus::InProgress,
                LeadStatus::Lost,
                ConflictResolutionStrategy::ManualReview,
            )
            .await
            .unwrap();

        assert!(first);
        assert!(!second);
        assert_eq!(repo.count_unresolved(1).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_resolve_reopens_slot() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let lead = seed_lead(&db).await;
        let repo = db.conflicts();

        repo.create_if_absent(
            &lead.id,
            1,
            LeadStatus::InProgress,
            LeadStatus::Won,
            ConflictResolutionStrategy::ManualReview,
        )
        .await
        .unwrap();
        let open = repo.unresolved_for_lead(&lead.id).await.unwrap().unwrap();

        repo.resolve(&open.id, ConflictResolution::AcceptRemote)
            .await
            .unwrap();
        let closed = repo.get_by_id(&open.id).await.unwrap().unwrap();
        assert!(closed.resolved);
        assert_eq!(closed.resolution, Some(ConflictResolution::AcceptRemote));
        assert!(closed.resolved_at.is_some());

        assert!(repo.resolve(&open.id, ConflictResolution::KeepLocal).await.is_err());
        assert!(repo
            .create_if_absent(
                &lead.id,
                1,
                LeadStatus::InProgress,
                LeadStatus::Won,
                ConflictResolutionStrategy::ManualReview,
            )
            .await
            .unwrap());
        assert_eq!(repo.list_unresolved(1).await.unwrap().len(), 1);
    }
}
