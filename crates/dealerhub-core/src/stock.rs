//! # Remote Stock Items
//!
//! Interpretation of EasyCars stock records and field-level diffing against
//! local vehicles.
//!
//! ## Reconciliation of One Item
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  raw JSON ──► StockItem::from_raw ──► StockItem (raw kept verbatim)    │
//! │                                            │                            │
//! │                                            ▼                            │
//! │                                  StockItem::to_draft                    │
//! │                                  (validation: make, model, year ...)    │
//! │                                            │                            │
//! │                        ┌───────────────────┴─────────────────┐          │
//! │                        ▼                                     ▼          │
//! │              no local vehicle                       local vehicle       │
//! │              draft.into_vehicle()                   diff(vehicle,draft) │
//! │                                                     apply_draft()       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer};
use serde_json::Value;

use crate::error::{CoreError, CoreResult, ValidationError};
use crate::types::{DealershipId, Vehicle, VehicleCondition, VehicleStatus};

/// Earliest model year accepted from the remote system.
pub const MIN_MODEL_YEAR: i32 = 1900;

// =============================================================================
// Stock Item
// =============================================================================

/// The EasyCars view of one vehicle.
///
/// Fields are optional because the provider omits what it doesn't know.
/// `raw` keeps the record exactly as received so that fields this crate does
/// not understand yet survive in the stock-data table.
#[derive(Debug, Clone, PartialEq)]
pub struct StockItem {
    pub stock_number: String,
    pub make: Option<String>,
    pub model: Option<String>,
    pub year: Option<i32>,
    /// Price in dollars as sent by the provider.
    pub price: Option<f64>,
    pub odometer: Option<i64>,
    pub condition: Option<String>,
    pub status: Option<String>,
    pub vin: Option<String>,
    pub description: Option<String>,
    pub images: Vec<String>,
    pub raw: Value,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct RemoteStockFields {
    #[serde(default, deserialize_with = "string_or_number")]
    stock_number: Option<String>,
    #[serde(default)]
    make: Option<String>,
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    year: Option<i32>,
    #[serde(default)]
    price: Option<f64>,
    #[serde(default)]
    odometer: Option<i64>,
    #[serde(default)]
    condition: Option<String>,
    #[serde(default)]
    status: Option<String>,
    #[serde(default, rename = "VIN")]
    vin: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    images: Option<Vec<String>>,
}

/// EasyCars sends stock numbers as either strings or integers.
fn string_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::String(s)) => Some(s),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

/// Reads only the stock number of a raw record, ignoring every other field.
///
/// Lets a record with mistyped fields still be matched to its vehicle.
pub fn stock_number(raw: &Value) -> CoreResult<String> {
    let stock_number = match raw.get("StockNumber") {
        Some(Value::String(s)) => s.trim().to_string(),
        Some(Value::Number(n)) => n.to_string(),
        _ => String::new(),
    };
    if stock_number.is_empty() {
        return Err(CoreError::MalformedStockItem("missing StockNumber".to_string()));
    }
    Ok(stock_number)
}

impl StockItem {
    /// Parses one remote stock record, retaining the raw JSON.
    ///
    /// ## Errors
    /// `CoreError::MalformedStockItem` when the record isn't an object, has
    /// mistyped fields, or lacks a stock number (the mapping key).
    pub fn from_raw(raw: Value) -> CoreResult<Self> {
        if !raw.is_object() {
            return Err(CoreError::MalformedStockItem(
                "stock record is not a JSON object".to_string(),
            ));
        }

        let fields: RemoteStockFields = serde_json::from_value(raw.clone())
            .map_err(|e| CoreError::MalformedStockItem(e.to_string()))?;

        let stock_number = fields
            .stock_number
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .ok_or_else(|| CoreError::MalformedStockItem("missing StockNumber".to_string()))?;

        Ok(StockItem {
            stock_number,
            make: fields.make,
            model: fields.model,
            year: fields.year,
            price: fields.price,
            odometer: fields.odometer,
            condition: fields.condition,
            status: fields.status,
            vin: fields.vin,
            description: fields.description,
            images: fields.images.unwrap_or_default(),
            raw,
        })
    }

    /// Validates the item and converts it into vehicle field values.
    ///
    /// ## Rules
    /// - `Make` and `Model` must be present and non-empty
    /// - `Year` must be between 1900 and `max_year`
    /// - `Price` and `Odometer` must not be negative
    pub fn to_draft(&self, max_year: i32) -> Result<VehicleDraft, ValidationError> {
        let make = non_empty(self.make.as_deref()).ok_or_else(|| ValidationError::required("make"))?;
        let model =
            non_empty(self.model.as_deref()).ok_or_else(|| ValidationError::required("model"))?;

        let year = self.year.ok_or_else(|| ValidationError::required("year"))?;
        if !(MIN_MODEL_YEAR..=max_year).contains(&year) {
            return Err(ValidationError::OutOfRange {
                field: "year".to_string(),
                min: MIN_MODEL_YEAR as i64,
                max: max_year as i64,
                value: year as i64,
            });
        }

        let price = self.price.unwrap_or(0.0);
        if price < 0.0 || !price.is_finite() {
            return Err(ValidationError::Negative {
                field: "price".to_string(),
            });
        }

        let mileage = self.odometer.unwrap_or(0);
        if mileage < 0 {
            return Err(ValidationError::Negative {
                field: "odometer".to_string(),
            });
        }

        Ok(VehicleDraft {
            stock_number: self.stock_number.clone(),
            make,
            model,
            year,
            price_cents: (price * 100.0).round() as i64,
            mileage,
            condition: self
                .condition
                .as_deref()
                .map(VehicleCondition::from_remote)
                .unwrap_or_default(),
            status: self
                .status
                .as_deref()
                .map(VehicleStatus::from_remote)
                .unwrap_or_default(),
            vin: non_empty(self.vin.as_deref()),
            description: non_empty(self.description.as_deref()),
            images: self.images.clone(),
        })
    }
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

// =============================================================================
// Vehicle Draft
// =============================================================================

/// Validated vehicle field values derived from a stock item.
#[derive(Debug, Clone, PartialEq)]
pub struct VehicleDraft {
    pub stock_number: String,
    pub make: String,
    pub model: String,
    pub year: i32,
    pub price_cents: i64,
    pub mileage: i64,
    pub condition: VehicleCondition,
    pub status: VehicleStatus,
    pub vin: Option<String>,
    pub description: Option<String>,
    pub images: Vec<String>,
}

impl VehicleDraft {
    /// Builds a brand-new local vehicle from the draft.
    pub fn into_vehicle(self, id: String, dealership_id: DealershipId, now: DateTime<Utc>) -> Vehicle {
        Vehicle {
            id,
            dealership_id,
            stock_number: Some(self.stock_number),
            make: self.make,
            model: self.model,
            year: self.year,
            price_cents: self.price_cents,
            mileage: self.mileage,
            condition: self.condition,
            status: self.status,
            vin: self.vin,
            description: self.description,
            images: self.images,
            created_at: now,
            updated_at: now,
        }
    }
}

// =============================================================================
// Diffing
// =============================================================================

/// One field that differs between the local vehicle and the remote item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldChange {
    pub field: &'static str,
    pub local: String,
    pub remote: String,
}

macro_rules! push_if_changed {
    ($changes:ident, $name:literal, $local:expr, $remote:expr) => {
        if $local != $remote {
            $changes.push(FieldChange {
                field: $name,
                local: format!("{:?}", $local),
                remote: format!("{:?}", $remote),
            });
        }
    };
}

/// Computes the field-level differences between a vehicle and a draft.
///
/// An empty result means the vehicle is already up to date.
pub fn diff(vehicle: &Vehicle, draft: &VehicleDraft) -> Vec<FieldChange> {
    let mut changes = Vec::new();
    push_if_changed!(changes, "make", vehicle.make, draft.make);
    push_if_changed!(changes, "model", vehicle.model, draft.model);
    push_if_changed!(changes, "year", vehicle.year, draft.year);
    push_if_changed!(changes, "price_cents", vehicle.price_cents, draft.price_cents);
    push_if_changed!(changes, "mileage", vehicle.mileage, draft.mileage);
    push_if_changed!(changes, "condition", vehicle.condition, draft.condition);
    push_if_changed!(changes, "status", vehicle.status, draft.status);
    push_if_changed!(changes, "vin", vehicle.vin, draft.vin);
    push_if_changed!(changes, "description", vehicle.description, draft.description);
    push_if_changed!(changes, "images", vehicle.images, draft.images);
    changes
}

/// Overwrites the synced fields of `vehicle` with the draft values.
pub fn apply_draft(vehicle: &mut Vehicle, draft: &VehicleDraft, now: DateTime<Utc>) {
    vehicle.stock_number = Some(draft.stock_number.clone());
    vehicle.make = draft.make.clone();
    vehicle.model = draft.model.clone();
    vehicle.year = draft.year;
    vehicle.price_cents = draft.price_cents;
    vehicle.mileage = draft.mileage;
    vehicle.condition = draft.condition;
    vehicle.status = draft.status;
    vehicle.vin = draft.vin.clone();
    vehicle.description = draft.description.clone();
    vehicle.images = draft.images.clone();
    vehicle.updated_at = now;
}

/// Builds the EasyCars stock payload for pushing a local vehicle outward.
pub fn vehicle_to_remote(vehicle: &Vehicle) -> Value {
    serde_json::json!({
        "StockNumber": vehicle.stock_number,
        "Make": vehicle.make,
        "Model": vehicle.model,
        "Year": vehicle.year,
        "Price": vehicle.price_cents as f64 / 100.0,
        "Odometer": vehicle.mileage,
        "Condition": vehicle.condition.remote_name(),
        "Status": vehicle.status.remote_name(),
        "VIN": vehicle.vin,
        "Description": vehicle.description,
        "Images": vehicle.images,
    })
}
