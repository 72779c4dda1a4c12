//! # Sync Log Repository
//!
//! Append-only history of sync attempts. Rows are written once by the
//! scheduler (or a manual trigger) and only read afterwards by the
//! dashboard.

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use tracing::debug;

use crate::error::{DbError, DbResult};
use dealerhub_core::{DealershipId, SyncHistoryPage, SyncLog, SyncStatus, SyncType};

#[derive(sqlx::FromRow)]
struct SyncLogRow {
    id: String,
    dealership_id: i64,
    sync_type: SyncType,
    status: SyncStatus,
    items_processed: i64,
    items_succeeded: i64,
    items_failed: i64,
    errors_json: String,
    duration_ms: i64,
    synced_at: DateTime<Utc>,
}

impl TryFrom<SyncLogRow> for SyncLog {
    type Error = DbError;

    fn try_from(row: SyncLogRow) -> DbResult<Self> {
        let errors = serde_json::from_str(&row.errors_json)
            .map_err(|e| DbError::json("errors_json", e))?;
        Ok(SyncLog {
            id: row.id,
            dealership_id: row.dealership_id,
            sync_type: row.sync_type,
            status: row.status,
            items_processed: row.items_processed,
            items_succeeded: row.items_succeeded,
            items_failed: row.items_failed,
            errors,
            duration_ms: row.duration_ms,
            synced_at: row.synced_at,
        })
    }
}

const SELECT_COLUMNS: &str = r#"
    SELECT id, dealership_id, sync_type, status, items_processed,
           items_succeeded, items_failed, errors_json, duration_ms, synced_at
    FROM easycars_sync_logs
"#;

/// Repository for sync log rows.
#[derive(Debug, Clone)]
pub struct SyncLogRepository {
    pool: SqlitePool,
}

impl SyncLogRepository {
    pub fn new(pool: SqlitePool) -> Self {
        SyncLogRepository { pool }
    }

    /// Appends a sync log row.
    pub async fn add(&self, log: &SyncLog) -> DbResult<()> {
        debug!(
            dealership_id = log.dealership_id,
            sync_type = %log.sync_type,
            status = %log.status,
            "Writing sync log"
        );

        let errors_json =
            serde_json::to_string(&log.errors).map_err(|e| DbError::json("errors_json", e))?;

        sqlx::query(
            r#"
            INSERT INTO easycars_sync_logs (
                id, dealership_id, sync_type, status, items_processed,
                items_succeeded, items_failed, errors_json, duration_ms, synced_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            "#,
        )
        .bind(&log.id)
        .bind(log.dealership_id)
        .bind(log.sync_type)
        .bind(log.status)
        .bind(log.items_processed)
        .bind(log.items_succeeded)
        .bind(log.items_failed)
        .bind(errors_json)
        .bind(log.duration_ms)
        .bind(log.synced_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Gets one log row (dashboard detail view).
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<SyncLog>> {
        let sql = format!("{SELECT_COLUMNS} WHERE id = ?1");
        sqlx::query_as::<_, SyncLogRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .map(SyncLog::try_from)
            .transpose()
    }

    /// Most recent log of the given type for a dealership.
    pub async fn last_for_dealership(
        &self,
        dealership_id: DealershipId,
        sync_type: SyncType,
    ) -> DbResult<Option<SyncLog>> {
        let sql = format!(
            "{SELECT_COLUMNS} WHERE dealership_id = ?1 AND sync_type = ?2 \
             ORDER BY synced_at DESC LIMIT 1"
        );
        sqlx::query_as::<_, SyncLogRow>(&sql)
            .bind(dealership_id)
            .bind(sync_type)
            .fetch_optional(&self.pool)
            .await?
            .map(SyncLog::try_from)
            .transpose()
    }

    /// Paginated history, newest first. `page` is 1-based.
    pub async fn history(
        &self,
        dealership_id: DealershipId,
        sync_type: Option<SyncType>,
        page: u32,
        page_size: u32,
    ) -> DbResult<SyncHistoryPage> {
        let page = page.max(1);
        let page_size = page_size.clamp(1, 200);
        let offset = i64::from(page - 1) * i64::from(page_size);

        let total: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM easycars_sync_logs \
             WHERE dealership_id = ?1 AND (?2 IS NULL OR sync_type = ?2)",
        )
        .bind(dealership_id)
        .bind(sync_type)
        .fetch_one(&self.pool)
        .await?;

        let sql = format!(
            "{SELECT_COLUMNS} WHERE dealership_id = ?1 AND (?2 IS NULL OR sync_type = ?2) \
             ORDER BY synced_at DESC LIMIT ?3 OFFSET ?4"
        );
        let items = sqlx::query_as::<_, SyncLogRow>(&sql)
            .bind(dealership_id)
            .bind(sync_type)
            .bind(i64::from(page_size))
            .bind(offset)
            .fetch_all(&self.pool)
            .await?
            .into_iter()
            .map(SyncLog::try_from)
            .collect::<DbResult<Vec<_>>>()?;

        Ok(SyncHistoryPage {
            items,
            total,
            page,
            page_size,
        })
    }

    /// True when the dealership has at least one fully successful sync.
    pub async fn has_successful_sync(&self, dealership_id: DealershipId) -> DbResult<bool> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM easycars_sync_logs WHERE dealership_id = ?1 AND status = ?2",
        )
        .bind(dealership_id)
        .bind(SyncStatus::Success)
        .fetch_one(&self.pool)
        .await?;
        Ok(count > 0)
    }

    /// Number of log rows for a dealership.
    pub async fn count_for_dealership(&self, dealership_id: DealershipId) -> DbResult<i64> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM easycars_sync_logs WHERE dealership_id = ?1")
                .bind(dealership_id)
                .fetch_one(&self.pool)
                .await?;
        Ok(count)
    }
}
