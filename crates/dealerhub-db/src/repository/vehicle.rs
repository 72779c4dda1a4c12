//! # Vehicle Repository
//!
//! Local inventory storage. Image URLs are kept as a JSON array column.

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use tracing::debug;

use crate::error::{DbError, DbResult};
use dealerhub_core::{DealershipId, Vehicle, VehicleCondition, VehicleStatus};

#[derive(sqlx::FromRow)]
struct VehicleRow {
    id: String,
    dealership_id: i64,
    stock_number: Option<String>,
    make: String,
    model: String,
    year: i32,
    price_cents: i64,
    mileage: i64,
    condition: VehicleCondition,
    status: VehicleStatus,
    vin: Option<String>,
    description: Option<String>,
    images_json: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<VehicleRow> for Vehicle {
    type Error = DbError;

    fn try_from(row: VehicleRow) -> DbResult<Self> {
        let images =
            serde_json::from_str(&row.images_json).map_err(|e| DbError::json("images_json", e))?;
        Ok(Vehicle {
            id: row.id,
            dealership_id: row.dealership_id,
            stock_number: row.stock_number,
            make: row.make,
            model: row.model,
            year: row.year,
            price_cents: row.price_cents,
            mileage: row.mileage,
            condition: row.condition,
            status: row.status,
            vin: row.vin,
            description: row.description,
            images,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

const SELECT_COLUMNS: &str = r#"
    SELECT id, dealership_id, stock_number, make, model, year, price_cents,
           mileage, condition, status, vin, description, images_json,
           created_at, updated_at
    FROM vehicles
"#;

/// Repository for vehicle database operations.
#[derive(Debug, Clone)]
pub struct VehicleRepository {
    pool: SqlitePool,
}

impl VehicleRepository {
    pub fn new(pool: SqlitePool) -> Self {
        VehicleRepository { pool }
    }

    /// Gets a vehicle by its ID.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Vehicle>> {
        let sql = format!("{SELECT_COLUMNS} WHERE id = ?1");
        sqlx::query_as::<_, VehicleRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .map(Vehicle::try_from)
            .transpose()
    }

    /// Lists a dealership's vehicles, oldest first.
    pub async fn list_by_dealership(&self, dealership_id: DealershipId) -> DbResult<Vec<Vehicle>> {
        let sql = format!("{SELECT_COLUMNS} WHERE dealership_id = ?1 ORDER BY created_at, id");
        sqlx::query_as::<_, VehicleRow>(&sql)
            .bind(dealership_id)
            .fetch_all(&self.pool)
            .await?
            .into_iter()
            .map(Vehicle::try_from)
            .collect()
    }

    /// Inserts a new vehicle.
    pub async fn add(&self, vehicle: &Vehicle) -> DbResult<Vehicle> {
        debug!(id = %vehicle.id, dealership_id = vehicle.dealership_id, "Inserting vehicle");

        let images_json =
            serde_json::to_string(&vehicle.images).map_err(|e| DbError::json("images_json", e))?;

        sqlx::query(
            r#"
            INSERT INTO vehicles (
                id, dealership_id, stock_number, make, model, year, price_cents,
                mileage, condition, status, vin, description, images_json,
                created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)
            "#,
        )
        .bind(&vehicle.id)
        .bind(vehicle.dealership_id)
        .bind(&vehicle.stock_number)
        .bind(&vehicle.make)
        .bind(&vehicle.model)
        .bind(vehicle.year)
        .bind(vehicle.price_cents)
        .bind(vehicle.mileage)
        .bind(vehicle.condition)
        .bind(vehicle.status)
        .bind(&vehicle.vin)
        .bind(&vehicle.description)
        .bind(images_json)
        .bind(vehicle.created_at)
        .bind(vehicle.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(vehicle.clone())
    }

    /// Writes every mutable field of a vehicle.
    pub async fn update(&self, vehicle: &Vehicle) -> DbResult<()> {
        debug!(id = %vehicle.id, "Updating vehicle");

        let images_json =
            serde_json::to_string(&vehicle.images).map_err(|e| DbError::json("images_json", e))?;

        let result = sqlx::query(
            r#"
            UPDATE vehicles SET
                stock_number = ?2,
                make = ?3,
                model = ?4,
                year = ?5,
                price_cents = ?6,
                mileage = ?7,
                condition = ?8,
                status = ?9,
                vin = ?10,
                description = ?11,
                images_json = ?12,
                updated_at = ?13
            WHERE id = ?1
            "#,
        )
        .bind(&vehicle.id)
        .bind(&vehicle.stock_number)
        .bind(&vehicle.make)
        .bind(&vehicle.model)
        .bind(vehicle.year)
        .bind(vehicle.price_cents)
        .bind(vehicle.mileage)
        .bind(vehicle.condition)
        .bind(vehicle.status)
        .bind(&vehicle.vin)
        .bind(&vehicle.description)
        .bind(images_json)
        .bind(vehicle.updated_at)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Vehicle", &vehicle.id));
        }
        Ok(())
    }

    /// Deletes a vehicle. Its stock mapping goes with it.
    pub async fn delete(&self, id: &str) -> DbResult<()> {
        let result = sqlx::query("DELETE FROM vehicles WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Vehicle", id));
        }
        Ok(())
    }

    /// Number of vehicles for a dealership.
    pub async fn count_for_dealership(&self, dealership_id: DealershipId) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM vehicles WHERE dealership_id = ?1")
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

    fn vehicle() -> Vehicle {
        let now = Utc::now();
        Vehicle {
            id: uuid::Uuid::new_v4().to_string(),
            dealership_id: 7,
            stock_number: Some("A1".into()),
            make: "Mazda".into(),
            model: "CX-5".into(),
            year: 2021,
            price_cents: 3_299_000,
            mileage: 18_500,
            condition: VehicleCondition::Demo,
            status: VehicleStatus::OnHold,
            vin: Some("JM0KF4W7A00000001".into()),
            description: Some("One owner".into()),
            images: vec!["https://img/1.jpg".into(), "https://img/2.jpg".into()],
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn test_add_and_get_preserves_fields() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.vehicles();

        let v = vehicle();
        repo.add(&v).await.unwrap();

        let stored = repo.get_by_id(&v.id).await.unwrap().unwrap();
        assert_eq!(stored.condition, VehicleCondition::Demo);
        assert_eq!(stored.status, VehicleStatus::OnHold);
        assert_eq!(stored.images, v.images);
        assert_eq!(repo.list_by_dealership(7).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_update_and_missing() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.vehicles();

        let mut v = repo.add(&vehicle()).await.unwrap();
        v.price_cents = 3_100_000;
        v.status = VehicleStatus::Sold;
        repo.update(&v).await.unwrap();

        let stored = repo.get_by_id(&v.id).await.unwrap().unwrap();
        assert_eq!(stored.price_cents, 3_100_000);
        assert_eq!(stored.status, VehicleStatus::Sold);

        let mut ghost = vehicle();
        ghost.id = "missing".into();
        assert!(matches!(repo.update(&ghost).await, Err(DbError::NotFound { .. })));
    }
}
