//! # Stock Sync Engine
//!
//! Reconciles one dealership's local inventory against its EasyCars stock.
//!
//! ## Per-Item Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Stock Item Processing                            │
//! │                                                                         │
//! │  raw JSON ──► stock number only ──► resolve vehicle                    │
//! │                    │ (missing:            │                             │
//! │                    │  item failure)       ├── mapping row found         │
//! │                    │                      ├── vehicle with same stock # │
//! │                    │                      └── none                      │
//! │                                                                         │
//! │  FOUND                                  NOT FOUND                       │
//! │  1. upsert raw JSON                     Import: parse, validate,        │
//! │  2. parse + validate (failure counted)          insert vehicle, then    │
//! │  3. diff: empty → unchanged                     raw JSON                │
//! │           else → update vehicle         Ignore: counted, no write       │
//! │                                                                         │
//! │  Local vehicles missing remotely are never touched.                    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! An item failure is recorded in the [`SyncResult`] and the batch goes on.
//! Only a failed stock fetch aborts the run.

use chrono::{Datelike, Utc};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

use crate::client::EasyCarsApi;
use crate::error::{EngineResult, SyncError};
use crate::vault::AccountCredentials;
use dealerhub_core::stock;
use dealerhub_core::{
    DealershipId, RemoteOnlyPolicy, StockItem, SyncResult, ValidationError, Vehicle,
    STOCK_API_VERSION,
};
use dealerhub_db::Database;

/// What happened to one remote stock item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemOutcome {
    Created,
    Updated,
    Unchanged,
    Ignored,
}

impl ItemOutcome {
    fn wrote_vehicle(self) -> bool {
        matches!(self, ItemOutcome::Created | ItemOutcome::Updated)
    }
}

/// Stock reconciliation for one dealership at a time.
pub struct StockSyncEngine {
    db: Database,
    api: Arc<dyn EasyCarsApi>,
    policy: RemoteOnlyPolicy,
}

impl StockSyncEngine {
    pub fn new(db: Database, api: Arc<dyn EasyCarsApi>, policy: RemoteOnlyPolicy) -> Self {
        StockSyncEngine { db, api, policy }
    }

    pub fn policy(&self) -> RemoteOnlyPolicy {
        self.policy
    }

    /// Runs one stock sync for a dealership.
    pub async fn sync(
        &self,
        dealership_id: DealershipId,
        credentials: &AccountCredentials,
    ) -> SyncResult {
        let started = Instant::now();

        let remote = match self.api.fetch_stock(dealership_id, credentials).await {
            Ok(items) => items,
            Err(err) => {
                warn!(dealership_id, error = %err, "Stock fetch failed, aborting run");
                return SyncResult::aborted(
                    format!("Failed to fetch stock: {err}"),
                    started.elapsed(),
                );
            }
        };

        let mut local: HashMap<String, Vehicle> =
            match self.db.vehicles().list_by_dealership(dealership_id).await {
                Ok(vehicles) => vehicles.into_iter().map(|v| (v.id.clone(), v)).collect(),
                Err(err) => {
                    warn!(dealership_id, error = %err, "Could not load local vehicles");
                    return SyncResult::aborted(
                        format!("Failed to load local vehicles: {err}"),
                        started.elapsed(),
                    );
                }
            };

        let max_year = Utc::now().year() + 1;
        let mut result = SyncResult::new();
        let mut written = 0usize;

        for (index, raw) in remote.into_iter().enumerate() {
            let label = item_label(&raw, index);
            match self.sync_item(dealership_id, raw, &mut local, max_year).await {
                Ok(outcome) if outcome.wrote_vehicle() => {
                    written += 1;
                    result.record_success();
                }
                Ok(_) => result.record_skipped(),
                Err(err) => {
                    warn!(dealership_id, item = %label, error = %err, "Stock item failed");
                    result.record_failure(format!("{label}: {err}"));
                }
            }
        }

        info!(
            dealership_id,
            processed = result.processed,
            written,
            unchanged = result.skipped,
            failed = result.failed,
            "Stock sync finished"
        );
        result.finish(started.elapsed())
    }

    /// Applies one remote stock record.
    ///
    /// `local` is the dealership's vehicle set, kept current as items are
    /// written so repeated stock numbers in one batch resolve to one vehicle.
    pub async fn sync_item(
        &self,
        dealership_id: DealershipId,
        raw: Value,
        local: &mut HashMap<String, Vehicle>,
        max_year: i32,
    ) -> EngineResult<ItemOutcome> {
        let stock_number = stock::stock_number(&raw)?;
        let raw_json = serde_json::to_string(&raw)?;

        let Some(vehicle_id) = self.resolve_vehicle(dealership_id, &stock_number, local).await?
        else {
            return self.import(dealership_id, raw, &raw_json, local, max_year).await;
        };

        // Raw payload is kept even when parsing or the update below fails.
        self.db
            .stock_data()
            .upsert(
                dealership_id,
                &vehicle_id,
                &stock_number,
                &raw_json,
                STOCK_API_VERSION,
            )
            .await?;

        let draft = StockItem::from_raw(raw)?.to_draft(max_year)?;
        let vehicle = local
            .get_mut(&vehicle_id)
            .ok_or_else(|| SyncError::not_found("Vehicle", &vehicle_id))?;

        let changes = stock::diff(vehicle, &draft);
        if changes.is_empty() {
            return Ok(ItemOutcome::Unchanged);
        }
        debug!(
            vehicle_id = %vehicle_id,
            fields = ?changes.iter().map(|c| c.field).collect::<Vec<_>>(),
            "Updating vehicle from stock"
        );

        let mut updated = vehicle.clone();
        stock::apply_draft(&mut updated, &draft, Utc::now());
        self.db.vehicles().update(&updated).await?;
        *vehicle = updated;
        Ok(ItemOutcome::Updated)
    }

    async fn import(
        &self,
        dealership_id: DealershipId,
        raw: Value,
        raw_json: &str,
        local: &mut HashMap<String, Vehicle>,
        max_year: i32,
    ) -> EngineResult<ItemOutcome> {
        let item = StockItem::from_raw(raw)?;
        if self.policy == RemoteOnlyPolicy::Ignore {
            debug!(dealership_id, stock_number = %item.stock_number, "Ignoring remote-only stock");
            return Ok(ItemOutcome::Ignored);
        }

        let draft = item.to_draft(max_year)?;
        let vehicle = draft.into_vehicle(uuid::Uuid::new_v4().to_string(), dealership_id, Utc::now());
        let vehicle = self.db.vehicles().add(&vehicle).await?;
        // Tracked before the mapping write so a retry in this batch finds it.
        local.insert(vehicle.id.clone(), vehicle.clone());
        self.db
            .stock_data()
            .upsert(
                dealership_id,
                &vehicle.id,
                &item.stock_number,
                raw_json,
                STOCK_API_VERSION,
            )
            .await?;

        debug!(dealership_id, vehicle_id = %vehicle.id, stock_number = %item.stock_number, "Imported vehicle");
        Ok(ItemOutcome::Created)
    }

    /// Finds the local vehicle for a stock number: the mapping table first,
    /// then a local vehicle carrying the same stock number.
    async fn resolve_vehicle(
        &self,
        dealership_id: DealershipId,
        stock_number: &str,
        local: &HashMap<String, Vehicle>,
    ) -> EngineResult<Option<String>> {
        if let Some(row) = self
            .db
            .stock_data()
            .get_by_stock_number(dealership_id, stock_number)
            .await?
        {
            if local.contains_key(&row.vehicle_id) {
                return Ok(Some(row.vehicle_id));
            }
        }

        Ok(local
            .values()
            .find(|v| v.stock_number.as_deref() == Some(stock_number))
            .map(|v| v.id.clone()))
    }

    // =========================================================================
    // Outbound
    // =========================================================================

    /// Sends one local vehicle to EasyCars.
    pub async fn push_vehicle(
        &self,
        dealership_id: DealershipId,
        credentials: &AccountCredentials,
        vehicle_id: &str,
    ) -> EngineResult<()> {
        let vehicle = self
            .db
            .vehicles()
            .get_by_id(vehicle_id)
            .await?
            .filter(|v| v.dealership_id == dealership_id)
            .ok_or_else(|| SyncError::not_found("Vehicle", vehicle_id))?;

        if vehicle.stock_number.is_none() {
            return Err(ValidationError::required("stock_number").into());
        }

        let payload = stock::vehicle_to_remote(&vehicle);
        self.api
            .push_stock_update(dealership_id, credentials, &payload)
            .await?;
        info!(dealership_id, vehicle_id, "Pushed vehicle to EasyCars");
        Ok(())
    }
}

/// Identifies an item in error messages by stock number when it has one.
fn item_label(raw: &Value, index: usize) -> String {
    match stock::stock_number(raw) {
        Ok(stock_number) => format!("Stock {stock_number}"),
        Err(_) => format!("Item #{}", index + 1),
    }
}
