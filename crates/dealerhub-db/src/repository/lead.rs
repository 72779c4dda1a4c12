//! # Lead Repository
//!
//! Local leads captured by the storefront, plus the EasyCars lead number
//! once a lead exists remotely.

use chrono::Utc;
use sqlx::SqlitePool;
use tracing::debug;

use crate::error::{DbError, DbResult};
use dealerhub_core::{DealershipId, Lead, LeadStatus};

const SELECT_COLUMNS: &str = r#"
    SELECT id, dealership_id, vehicle_id, customer_name, email, phone, message,
           status, easycars_lead_number, created_at, updated_at
    FROM leads
"#;

/// Repository for lead database operations.
#[derive(Debug, Clone)]
pub struct LeadRepository {
    pool: SqlitePool,
}

impl LeadRepository {
    pub fn new(pool: SqlitePool) -> Self {
        LeadRepository { pool }
    }

    /// Gets a lead by its ID.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Lead>> {
        let sql = format!("{SELECT_COLUMNS} WHERE id = ?1");
        let lead = sqlx::query_as::<_, Lead>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(lead)
    }

    /// Lists every lead of a dealership, oldest first.
    pub async fn list_by_dealership(&self, dealership_id: DealershipId) -> DbResult<Vec<Lead>> {
        let sql = format!("{SELECT_COLUMNS} WHERE dealership_id = ?1 ORDER BY created_at, id");
        let leads = sqlx::query_as::<_, Lead>(&sql)
            .bind(dealership_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(leads)
    }

    /// Leads that have not been created in EasyCars yet.
    pub async fn list_unsent(&self, dealership_id: DealershipId) -> DbResult<Vec<Lead>> {
        let sql = format!(
            "{SELECT_COLUMNS} WHERE dealership_id = ?1 AND easycars_lead_number IS NULL \
             ORDER BY created_at, id"
        );
        let leads = sqlx::query_as::<_, Lead>(&sql)
            .bind(dealership_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(leads)
    }

    /// Leads that carry an EasyCars lead number and can be reconciled.
    pub async fn list_linked(&self, dealership_id: DealershipId) -> DbResult<Vec<Lead>> {
        let sql = format!(
            "{SELECT_COLUMNS} WHERE dealership_id = ?1 AND easycars_lead_number IS NOT NULL \
             ORDER BY created_at, id"
        );
        let leads = sqlx::query_as::<_, Lead>(&sql)
            .bind(dealership_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(leads)
    }

    /// Inserts a new lead.
    pub async fn add(&self, lead: &Lead) -> DbResult<Lead> {
        debug!(id = %lead.id, dealership_id = lead.dealership_id, "Inserting lead");

        sqlx::query(
            r#"
            INSERT INTO leads (
                id, dealership_id, vehicle_id, customer_name, email, phone, message,
                status, easycars_lead_number, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
            "#,
        )
        .bind(&lead.id)
        .bind(lead.dealership_id)
        .bind(&lead.vehicle_id)
        .bind(&lead.customer_name)
        .bind(&lead.email)
        .bind(&lead.phone)
        .bind(&lead.message)
        .bind(lead.status)
        .bind(&lead.easycars_lead_number)
        .bind(lead.created_at)
        .bind(lead.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(lead.clone())
    }

    /// Overwrites the local status of a lead.
    pub async fn update_status(&self, id: &str, status: LeadStatus) -> DbResult<()> {
        debug!(id, %status, "Updating lead status");

        let result = sqlx::query("UPDATE leads SET status = ?2, updated_at = ?3 WHERE id = ?1")
            .bind(id)
            .bind(status)
            .bind(Utc::now())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Lead", id));
        }
        Ok(())
    }

    /// Records the EasyCars lead number after a remote create.
    pub async fn set_lead_number(&self, id: &str, lead_number: &str) -> DbResult<()> {
        let result = sqlx::query(
            "UPDATE leads SET easycars_lead_number = ?2, updated_at = ?3 WHERE id = ?1",
        )
        .bind(id)
        .bind(lead_number)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Lead", id));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Database, DbConfig};

    fn lead(dealership_id: DealershipId, number: Option<&str>) -> Lead {
        let now = Utc::now();
        Lead {
            id: uuid::Uuid::new_v4().to_string(),
            dealership_id,
            vehicle_id: None,
            customer_name: "Sam Carter".into(),
            email: "sam@example.com".into(),
            phone: None,
            message: Some("Is it still available?".into()),
            status: LeadStatus::Received,
            easycars_lead_number: number.map(str::to_string),
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn test_unsent_and_linked_partition() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.leads();

        let unsent = repo.add(&lead(1, None)).await.unwrap();
        repo.add(&lead(1, Some("L-9"))).await.unwrap();
        repo.add(&lead(2, None)).await.unwrap();

        assert_eq!(repo.list_unsent(1).await.unwrap().len(), 1);
        assert_eq!(repo.list_linked(1).await.unwrap().len(), 1);

        repo.set_lead_number(&unsent.id, "L-10").await.unwrap();
        assert!(repo.list_unsent(1).await.unwrap().is_empty());
        assert_eq!(repo.list_linked(1).await.unwrap().len(), 2);
        assert_eq!(repo.list_by_dealership(1).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_update_status_round_trips_legacy_done() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.leads();

        let l = repo.add(&lead(1, Some("L-1"))).await.unwrap();
        repo.update_status(&l.id, LeadStatus::Done).await.unwrap();
        let stored = repo.get_by_id(&l.id).await.unwrap().unwrap();
        assert_eq!(stored.status, LeadStatus::Done);

        assert!(matches!(
            repo.update_status("missing", LeadStatus::Won).await,
            Err(DbError::NotFound { .. })
        ));
    }
}
