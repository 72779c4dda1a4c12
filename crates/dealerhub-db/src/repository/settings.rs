//! # Settings Repository
//!
//! The global EasyCars kill switch and per-dealership auto-sync flags.

use chrono::Utc;
use sqlx::SqlitePool;
use tracing::info;

use crate::error::DbResult;
use dealerhub_core::{DealershipId, GLOBAL_SYNC_SETTING_KEY};

/// Repository for system and dealership settings.
#[derive(Debug, Clone)]
pub struct SettingsRepository {
    pool: SqlitePool,
}

impl SettingsRepository {
    pub fn new(pool: SqlitePool) -> Self {
        SettingsRepository { pool }
    }

    /// Raw value of a system setting.
    pub async fn get(&self, key: &str) -> DbResult<Option<String>> {
        let value = sqlx::query_scalar::<_, String>("SELECT value FROM system_settings WHERE key = ?1")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;
        Ok(value)
    }

    /// Inserts or replaces a system setting.
    pub async fn set(&self, key: &str, value: &str) -> DbResult<()> {
        sqlx::query(
            r#"
            INSERT INTO system_settings (key, value, updated_at) VALUES (?1, ?2, ?3)
            ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at
            "#,
        )
        .bind(key)
        .bind(value)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Global kill switch. A missing row counts as enabled; any value other
    /// than `true` or `1` counts as disabled.
    pub async fn global_sync_enabled(&self) -> DbResult<bool> {
        Ok(match self.get(GLOBAL_SYNC_SETTING_KEY).await? {
            None => true,
            Some(v) => matches!(v.trim().to_ascii_lowercase().as_str(), "true" | "1"),
        })
    }

    pub async fn set_global_sync_enabled(&self, enabled: bool) -> DbResult<()> {
        info!(enabled, "Setting global EasyCars sync flag");
        self.set(GLOBAL_SYNC_SETTING_KEY, if enabled { "true" } else { "false" })
            .await
    }

    /// Dealerships that opted into automatic sync.
    pub async fn auto_sync_dealerships(&self) -> DbResult<Vec<DealershipId>> {
        let ids = sqlx::query_scalar::<_, i64>(
            "SELECT dealership_id FROM dealership_settings \
             WHERE easycar_auto_sync_enabled = 1 ORDER BY dealership_id",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(ids)
    }

    pub async fn is_auto_sync_enabled(&self, dealership_id: DealershipId) -> DbResult<bool> {
        let enabled = sqlx::query_scalar::<_, bool>(
            "SELECT easycar_auto_sync_enabled FROM dealership_settings WHERE dealership_id = ?1",
        )
        .bind(dealership_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(enabled.unwrap_or(false))
    }

    pub async fn set_auto_sync(&self, dealership_id: DealershipId, enabled: bool) -> DbResult<()> {
        info!(dealership_id, enabled, "Setting dealership auto-sync flag");
        sqlx::query(
            r#"
            INSERT INTO dealership_settings (dealership_id, easycar_auto_sync_enabled, updated_at)
            VALUES (?1, ?2, ?3)
            ON CONFLICT(dealership_id) DO UPDATE SET
                easycar_auto_sync_enabled = excluded.easycar_auto_sync_enabled,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(dealership_id)
        .bind(enabled)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Database, DbConfig};

    #[tokio::test]
    async fn test_global_flag_defaults_to_seeded_true() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.settings();

        assert!(repo.global_sync_enabled().await.unwrap());
        repo.set_global_sync_enabled(false).await.unwrap();
        assert!(!repo.global_sync_enabled().await.unwrap());

        repo.set(GLOBAL_SYNC_SETTING_KEY, "garbage").await.unwrap();
        assert!(!repo.global_sync_enabled().await.unwrap());
    }

    #[tokio::test]
    async fn test_auto_sync_flags() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.settings();

        repo.set_auto_sync(3, true).await.unwrap();
        repo.set_auto_sync(1, true).await.unwrap();
        repo.set_auto_sync(2, false).await.unwrap();

        assert_eq!(repo.auto_sync_dealerships().await.unwrap(), vec![1, 3]);
        assert!(!repo.is_auto_sync_enabled(2).await.unwrap());
        assert!(!repo.is_auto_sync_enabled(99).await.unwrap());

        repo.set_auto_sync(3, false).await.unwrap();
        assert_eq!(repo.auto_sync_dealerships().await.unwrap(), vec![1]);
    }
}
