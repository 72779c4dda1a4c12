//! In-process stand-ins for unit tests.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use crate::client::{ApiError, EasyCarsApi, LeadPayload, RemoteLead};
use crate::vault::{AccountCredentials, CredentialVault};
use dealerhub_core::validation::ValidCredentialInput;
use dealerhub_core::{DealershipId, Environment};
use dealerhub_db::{Database, DbConfig};

pub async fn test_db() -> Database {
    Database::new(DbConfig::in_memory()).await.unwrap()
}

pub fn test_vault() -> Arc<CredentialVault> {
    Arc::new(CredentialVault::new(&[3u8; 32]).unwrap())
}

pub fn credential_input(environment: Environment) -> ValidCredentialInput {
    ValidCredentialInput {
        client_id: "portal".into(),
        client_secret: "s3cret".into(),
        account_number: "0f8fad5b-d9cb-469f-a165-70867728950e".into(),
        account_secret: "7c9e6679-7425-40de-944b-e07fc1f90ae7".into(),
        environment,
        yard_code: None,
    }
}

pub fn account() -> AccountCredentials {
    let input = credential_input(Environment::Test);
    AccountCredentials {
        client_id: input.client_id,
        client_secret: input.client_secret,
        account_number: input.account_number,
        account_secret: input.account_secret,
        environment: input.environment,
        yard_code: None,
    }
}

/// Stores a sealed credential for the dealership.
pub async fn seed_credential(db: &Database, vault: &CredentialVault, dealership_id: DealershipId) {
    let credential = vault
        .seal_credential(dealership_id, &credential_input(Environment::Test))
        .unwrap();
    db.credentials().add(&credential).await.unwrap();
}

/// Scriptable fake EasyCars account.
#[derive(Default)]
pub struct FakeApi {
    stock: Mutex<HashMap<DealershipId, Vec<Value>>>,
    stock_errors: Mutex<HashMap<DealershipId, ApiError>>,
    remote_leads: Mutex<HashMap<String, i32>>,
    /// Creates allowed to succeed before the error is returned.
    create_error: Mutex<Option<(usize, ApiError)>>,
    next_lead: AtomicU32,
    pub created: Mutex<Vec<LeadPayload>>,
    pub updated: Mutex<Vec<(String, i32)>>,
    pub pushed: Mutex<Vec<Value>>,
}

impl FakeApi {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set_stock(&self, dealership_id: DealershipId, items: Vec<Value>) {
        self.stock.lock().unwrap().insert(dealership_id, items);
    }

    pub fn fail_stock(&self, dealership_id: DealershipId, err: ApiError) {
        self.stock_errors.lock().unwrap().insert(dealership_id, err);
    }

    pub fn set_remote_lead(&self, lead_number: &str, status_code: i32) {
        self.remote_leads
            .lock()
            .unwrap()
            .insert(lead_number.to_string(), status_code);
    }

    pub fn remote_lead(&self, lead_number: &str) -> Option<i32> {
        self.remote_leads.lock().unwrap().get(lead_number).copied()
    }

    pub fn fail_create(&self, err: ApiError) {
        self.fail_create_after(0, err);
    }

    pub fn fail_create_after(&self, successes: usize, err: ApiError) {
        *self.create_error.lock().unwrap() = Some((successes, err));
    }
}

#[async_trait]
impl EasyCarsApi for FakeApi {
    async fn authenticate(&self, _credentials: &AccountCredentials) -> Result<(), ApiError> {
        Ok(())
    }

    async fn fetch_stock(
        &self,
        dealership_id: DealershipId,
        _credentials: &AccountCredentials,
    ) -> Result<Vec<Value>, ApiError> {
        if let Some(err) = self.stock_errors.lock().unwrap().get(&dealership_id) {
            return Err(err.clone());
        }
        Ok(self
            .stock
            .lock()
            .unwrap()
            .get(&dealership_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn push_stock_update(
        &self,
        _dealership_id: DealershipId,
        _credentials: &AccountCredentials,
        stock: &Value,
    ) -> Result<(), ApiError> {
        self.pushed.lock().unwrap().push(stock.clone());
        Ok(())
    }

    async fn create_lead(
        &self,
        _dealership_id: DealershipId,
        _credentials: &AccountCredentials,
        lead: &LeadPayload,
    ) -> Result<String, ApiError> {
        if let Some((successes, err)) = self.create_error.lock().unwrap().clone() {
            if self.created.lock().unwrap().len() >= successes {
                return Err(err);
            }
        }
        let number = format!("EC-{}", self.next_lead.fetch_add(1, Ordering::SeqCst) + 1);
        self.created.lock().unwrap().push(lead.clone());
        self.set_remote_lead(&number, lead.lead_status);
        Ok(number)
    }

    async fn update_lead(
        &self,
        _dealership_id: DealershipId,
        _credentials: &AccountCredentials,
        lead_number: &str,
        lead: &LeadPayload,
    ) -> Result<(), ApiError> {
        self.updated
            .lock()
            .unwrap()
            .push((lead_number.to_string(), lead.lead_status));
        self.set_remote_lead(lead_number, lead.lead_status);
        Ok(())
    }

    async fn get_lead(
        &self,
        _dealership_id: DealershipId,
        _credentials: &AccountCredentials,
        lead_number: &str,
    ) -> Result<RemoteLead, ApiError> {
        let status_code = self.remote_lead(lead_number).ok_or_else(|| ApiError::Validation {
            message: format!("unknown lead {lead_number}"),
        })?;
        Ok(RemoteLead {
            lead_number: lead_number.to_string(),
            status_code,
        })
    }
}
