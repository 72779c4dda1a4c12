//! # Credential Repository
//!
//! Storage for per-dealership EasyCars credentials. Values arrive here
//! already encrypted; this repository never sees plaintext.

use chrono::Utc;
use sqlx::SqlitePool;
use tracing::debug;

use crate::error::{DbError, DbResult};
use dealerhub_core::{Credential, DealershipId};

const SELECT_COLUMNS: &str = r#"
    SELECT id, dealership_id, encrypted_client_id, encrypted_client_secret,
           encrypted_account_number, encrypted_account_secret, environment,
           yard_code, created_at, updated_at
    FROM easycars_credentials
"#;

/// Repository for credential rows.
#[derive(Debug, Clone)]
pub struct CredentialRepository {
    pool: SqlitePool,
}

impl CredentialRepository {
    pub fn new(pool: SqlitePool) -> Self {
        CredentialRepository { pool }
    }

    /// Gets a credential by its ID.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Credential>> {
        let sql = format!("{SELECT_COLUMNS} WHERE id = ?1");
        let credential = sqlx::query_as::<_, Credential>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(credential)
    }

    /// Gets the credential of a dealership, if one is stored.
    pub async fn get_by_dealership(&self, dealership_id: DealershipId) -> DbResult<Option<Credential>> {
        let sql = format!("{SELECT_COLUMNS} WHERE dealership_id = ?1");
        let credential = sqlx::query_as::<_, Credential>(&sql)
            .bind(dealership_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(credential)
    }

    /// Lists the dealership ids that have a stored credential.
    pub async fn dealerships_with_credentials(&self) -> DbResult<Vec<DealershipId>> {
        let ids = sqlx::query_scalar::<_, i64>(
            "SELECT dealership_id FROM easycars_credentials ORDER BY dealership_id",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(ids)
    }

    /// Inserts a new credential.
    ///
    /// ## Returns
    /// * `Err(DbError::UniqueViolation)` - Dealership already has one
    pub async fn add(&self, credential: &Credential) -> DbResult<Credential> {
        debug!(dealership_id = credential.dealership_id, "Inserting credential");

        sqlx::query(
            r#"
            INSERT INTO easycars_credentials (
                id, dealership_id, encrypted_client_id, encrypted_client_secret,
                encrypted_account_number, encrypted_account_secret, environment,
                yard_code, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            "#,
        )
        .bind(&credential.id)
        .bind(credential.dealership_id)
        .bind(&credential.encrypted_client_id)
        .bind(&credential.encrypted_client_secret)
        .bind(&credential.encrypted_account_number)
        .bind(&credential.encrypted_account_secret)
        .bind(credential.environment)
        .bind(&credential.yard_code)
        .bind(credential.created_at)
        .bind(credential.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| match DbError::from(e) {
            DbError::UniqueViolation { .. } => {
                DbError::duplicate("dealership_id", credential.dealership_id.to_string())
            }
            other => other,
        })?;

        Ok(credential.clone())
    }

    /// Replaces the encrypted values and environment of a credential.
    pub async fn update(&self, credential: &Credential) -> DbResult<()> {
        debug!(id = %credential.id, "Updating credential");

        let result = sqlx::query(
            r#"
            UPDATE easycars_credentials SET
                encrypted_client_id = ?2,
                encrypted_client_secret = ?3,
                encrypted_account_number = ?4,
                encrypted_account_secret = ?5,
                environment = ?6,
                yard_code = ?7,
                updated_at = ?8
            WHERE id = ?1
            "#,
        )
        .bind(&credential.id)
        .bind(&credential.encrypted_client_id)
        .bind(&credential.encrypted_client_secret)
        .bind(&credential.encrypted_account_number)
        .bind(&credential.encrypted_account_secret)
        .bind(credential.environment)
        .bind(&credential.yard_code)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Credential", &credential.id));
        }
        Ok(())
    }

    /// Deletes a dealership's credential.
    pub async fn delete_by_dealership(&self, dealership_id: DealershipId) -> DbResult<()> {
        let result = sqlx::query("DELETE FROM easycars_credentials WHERE dealership_id = ?1")
            .bind(dealership_id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Credential", dealership_id.to_string()));
        }
        Ok(())
    }
}
