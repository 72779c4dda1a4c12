//! Shared fixtures for the scheduler integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::Utc;
use serde_json::{json, Value};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::watch;

use dealerhub_core::validation::CredentialInput;
use dealerhub_core::{DealershipId, Lead, LeadStatus};
use dealerhub_db::{Database, DbConfig};
use dealerhub_sync::{
    AccountCredentials, ApiError, CredentialVault, DatabaseSettingsProvider, EasyCarsApi,
    LeadPayload, RemoteLead, SyncRunner, SyncScheduler, SyncService, SyncSettings,
};

/// An EasyCars account per dealership, held in memory.
#[derive(Default)]
pub struct InMemoryEasyCars {
    stock: Mutex<HashMap<DealershipId, Vec<Value>>>,
    broken: Mutex<HashSet<DealershipId>>,
    leads: Mutex<HashMap<String, i32>>,
    /// Flipped to `true` during the first stock fetch.
    trip_on_fetch: Mutex<Option<watch::Sender<bool>>>,
    pub fetches: AtomicUsize,
    pub created: Mutex<Vec<LeadPayload>>,
}

impl InMemoryEasyCars {
    pub fn with_stock(&self, dealership_id: DealershipId, items: Vec<Value>) {
        self.stock.lock().unwrap().insert(dealership_id, items);
    }

    /// Every call for this dealership fails with a provider error.
    pub fn break_dealership(&self, dealership_id: DealershipId) {
        self.broken.lock().unwrap().insert(dealership_id);
    }

    pub fn trip_shutdown_on_fetch(&self, tx: watch::Sender<bool>) {
        *self.trip_on_fetch.lock().unwrap() = Some(tx);
    }

    pub fn set_remote_status(&self, lead_number: &str, code: i32) {
        self.leads.lock().unwrap().insert(lead_number.to_string(), code);
    }

    fn check(&self, dealership_id: DealershipId) -> Result<(), ApiError> {
        if self.broken.lock().unwrap().contains(&dealership_id) {
            return Err(ApiError::Fatal {
                message: "Account suspended".into(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl EasyCarsApi for InMemoryEasyCars {
    async fn authenticate(&self, _credentials: &AccountCredentials) -> Result<(), ApiError> {
        Ok(())
    }

    async fn fetch_stock(
        &self,
        dealership_id: DealershipId,
        _credentials: &AccountCredentials,
    ) -> Result<Vec<Value>, ApiError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        if let Some(tx) = self.trip_on_fetch.lock().unwrap().take() {
            let _ = tx.send(true);
        }
        self.check(dealership_id)?;
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
        dealership_id: DealershipId,
        _credentials: &AccountCredentials,
        _stock: &Value,
    ) -> Result<(), ApiError> {
        self.check(dealership_id)
    }

    async fn create_lead(
        &self,
        dealership_id: DealershipId,
        _credentials: &AccountCredentials,
        lead: &LeadPayload,
    ) -> Result<String, ApiError> {
        self.check(dealership_id)?;
        let mut created = self.created.lock().unwrap();
        created.push(lead.clone());
        let number = format!("L{}", created.len());
        self.set_remote_status(&number, lead.lead_status);
        Ok(number)
    }

    async fn update_lead(
        &self,
        dealership_id: DealershipId,
        _credentials: &AccountCredentials,
        lead_number: &str,
        lead: &LeadPayload,
    ) -> Result<(), ApiError> {
        self.check(dealership_id)?;
        self.set_remote_status(lead_number, lead.lead_status);
        Ok(())
    }

    async fn get_lead(
        &self,
        dealership_id: DealershipId,
        _credentials: &AccountCredentials,
        lead_number: &str,
    ) -> Result<RemoteLead, ApiError> {
        self.check(dealership_id)?;
        let code = self
            .leads
            .lock()
            .unwrap()
            .get(lead_number)
            .copied()
            .ok_or_else(|| ApiError::Validation {
                message: format!("Unknown lead {lead_number}"),
            })?;
        Ok(RemoteLead {
            lead_number: lead_number.to_string(),
            status_code: code,
        })
    }
}

/// Everything a test needs, wired the way the worker wires it.
pub struct Harness {
    pub db: Database,
    pub api: Arc<InMemoryEasyCars>,
    pub scheduler: SyncScheduler,
    pub service: SyncService,
}

pub async fn harness(settings: SyncSettings) -> Harness {
    let db = Database::new(DbConfig::in_memory()).await.unwrap();
    let vault = Arc::new(CredentialVault::new(&[42u8; 32]).unwrap());
    let api = Arc::new(InMemoryEasyCars::default());
    let runner = Arc::new(SyncRunner::new(db.clone(), vault, api.clone(), &settings));
    let provider = Arc::new(DatabaseSettingsProvider::new(db.clone()));
    Harness {
        scheduler: SyncScheduler::new(
            provider.clone(),
            runner.clone(),
            settings.max_concurrent_dealerships,
        ),
        service: SyncService::new(runner, provider),
        db,
        api,
    }
}

impl Harness {
    /// Stores credentials and turns auto-sync on.
    pub async fn enroll(&self, dealership_id: DealershipId) {
        self.service
            .create_credential(dealership_id, &credential_input("Test"))
            .await
            .unwrap();
        self.service.set_auto_sync(dealership_id, true).await.unwrap();
    }

    pub async fn add_lead(&self, dealership_id: DealershipId, status: LeadStatus) -> Lead {
        let now = Utc::now();
        let lead = Lead {
            id: uuid::Uuid::new_v4().to_string(),
            dealership_id,
            vehicle_id: None,
            customer_name: "Sam Carter".into(),
            email: "sam@example.com".into(),
            phone: None,
            message: Some("Is this still available?".into()),
            status,
            easycars_lead_number: None,
            created_at: now,
            updated_at: now,
        };
        self.db.leads().add(&lead).await.unwrap()
    }
}

pub fn credential_input(environment: &str) -> CredentialInput {
    CredentialInput {
        client_id: "dealer-portal".into(),
        client_secret: "s3cret".into(),
        account_number: "0f8fad5b-d9cb-469f-a165-70867728950e".into(),
        account_secret: "7c9e6679-7425-40de-944b-e07fc1f90ae7".into(),
        environment: environment.into(),
        yard_code: None,
    }
}

pub fn stock_item(stock_number: &str, make: &str, year: i64) -> Value {
    json!({
        "StockNumber": stock_number,
        "Make": make,
        "Model": "Hilux",
        "Year": year,
        "Price": 41990.0,
        "Odometer": 12000,
        "Condition": "Used",
        "Status": "Available"
    })
}
