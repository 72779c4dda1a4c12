//! # Stock Data Repository
//!
//! Maps EasyCars stock numbers to local vehicles and keeps the latest raw
//! payload for each one. There is exactly one row per vehicle.

use chrono::Utc;
use sqlx::SqlitePool;
use tracing::debug;

use crate::error::DbResult;
use dealerhub_core::{DealershipId, StockDataRow};

const SELECT_COLUMNS: &str = r#"
    SELECT id, dealership_id, vehicle_id, stock_number, raw_json, api_version, synced_at
    FROM easycars_stock_data
"#;

/// Repository for raw stock payloads.
#[derive(Debug, Clone)]
pub struct StockDataRepository {
    pool: SqlitePool,
}

impl StockDataRepository {
    pub fn new(pool: SqlitePool) -> Self {
        StockDataRepository { pool }
    }

    /// Finds the mapping for a remote stock number within a dealership.
    pub async fn get_by_stock_number(
        &self,
        dealership_id: DealershipId,
        stock_number: &str,
    ) -> DbResult<Option<StockDataRow>> {
        let sql = format!("{SELECT_COLUMNS} WHERE dealership_id = ?1 AND stock_number = ?2");
        let row = sqlx::query_as::<_, StockDataRow>(&sql)
            .bind(dealership_id)
            .bind(stock_number)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    /// Finds the mapping for a local vehicle.
    pub async fn get_by_vehicle(&self, vehicle_id: &str) -> DbResult<Option<StockDataRow>> {
        let sql = format!("{SELECT_COLUMNS} WHERE vehicle_id = ?1");
        let row = sqlx::query_as::<_, StockDataRow>(&sql)
            .bind(vehicle_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    /// Inserts or replaces the raw payload for a vehicle.
    ///
    /// Keyed on `vehicle_id`; the row id of an existing mapping is kept.
    pub async fn upsert(
        &self,
        dealership_id: DealershipId,
        vehicle_id: &str,
        stock_number: &str,
        raw_json: &str,
        api_version: &str,
    ) -> DbResult<()> {
        debug!(dealership_id, vehicle_id, stock_number, "Upserting raw stock data");

        sqlx::query(
            r#"
            INSERT INTO easycars_stock_data (
                id, dealership_id, vehicle_id, stock_number, raw_json, api_version, synced_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            ON CONFLICT(vehicle_id) DO UPDATE SET
                stock_number = excluded.stock_number,
                raw_json = excluded.raw_json,
                api_version = excluded.api_version,
                synced_at = excluded.synced_at
            "#,
        )
        .bind(uuid::Uuid::new_v4().to_string())
        .bind(dealership_id)
        .bind(vehicle_id)
        .bind(stock_number)
        .bind(raw_json)
        .bind(api_version)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Number of mapped vehicles for a dealership.
    pub async fn count_for_dealership(&self, dealership_id: DealershipId) -> DbResult<i64> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM easycars_stock_data WHERE dealership_id = ?1")
                .bind(dealership_id)
                .fetch_one(&self.pool)
                .await?;
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Database, DbConfig};
    use dealerhub_core::{Vehicle, VehicleCondition, VehicleStatus};

    fn vehicle(dealership_id: DealershipId) -> Vehicle {
        let now = Utc::now();
        Vehicle {
            id: uuid::Uuid::new_v4().to_string(),
            dealership_id,
            stock_number: Some("S100".into()),
            make: "Toyota".into(),
            model: "Corolla".into(),
            year: 2019,
            price_cents: 1_850_000,
            mileage: 42_000,
            condition: VehicleCondition::Used,
            status: VehicleStatus::Available,
            vin: None,
            description: None,
            images: vec![],
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn test_upsert_replaces_payload() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let v = db.vehicles().add(&vehicle(1)).await.unwrap();
        let repo = db.stock_data();

        repo.upsert(1, &v.id, "S100", r#"{"StockNumber":"S100"}"#, "v1")
            .await
            .unwrap();
        let first = repo.get_by_vehicle(&v.id).await.unwrap().unwrap();

        repo.upsert(1, &v.id, "S100", r#"{"StockNumber":"S100","Price":1}"#, "v1")
            .await
            .unwrap();
        let second = repo.get_by_stock_number(1, "S100").await.unwrap().unwrap();

        assert_eq!(first.id, second.id);
        assert!(second.raw_json.contains("Price"));
        assert_eq!(repo.count_for_dealership(1).await.unwrap(), 1);
        assert!(repo.get_by_stock_number(2, "S100").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_mapping_deleted_with_vehicle() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let v = db.vehicles().add(&vehicle(1)).await.unwrap();
        db.stock_data()
            .upsert(1, &v.id, "S100", "{}", "v1")
            .await
            .unwrap();

        db.vehicles().delete(&v.id).await.unwrap();
        assert!(db.stock_data().get_by_vehicle(&v.id).await.unwrap().is_none());
    }
}
