//! # EasyCars API Client
//!
//! All network interaction with EasyCars goes through the [`EasyCarsApi`]
//! trait. The engines only see the trait; [`EasyCarsClient`] is the HTTP
//! implementation and tests substitute a fake.
//!
//! ## Call Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       One EasyCars Call                                 │
//! │                                                                         │
//! │  engine ──► EasyCarsApi::fetch_stock(dealership, &creds)               │
//! │                 │                                                       │
//! │                 ▼                                                       │
//! │          ┌─────────────┐  miss   ┌──────────────────────────┐          │
//! │          │ TokenCache  │────────►│ POST /api/auth/token     │          │
//! │          │ (client id, │◄────────│ Token, ExpiresIn         │          │
//! │          │  env)       │  store  └──────────────────────────┘          │
//! │          └──────┬──────┘                                                │
//! │                 │ Bearer token                                          │
//! │                 ▼                                                       │
//! │          ┌─────────────┐         ┌──────────────────────────┐          │
//! │          │ retry loop  │────────►│ POST /api/stock/list     │          │
//! │          │ (linear)    │◄────────│ ResponseCode + payload   │          │
//! │          └──────┬──────┘         └──────────────────────────┘          │
//! │                 │                                                       │
//! │                 ▼                                                       │
//! │        Ok(payload) or ApiError (code 1 also evicts the token)          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

mod error;
mod http;
mod retry;
mod token_cache;

pub use error::{ApiError, ResponseCode};
pub use http::EasyCarsClient;
pub use retry::{retry, Idempotency, LinearBackoff};
pub use token_cache::{cache_duration, TokenCache, TokenKey};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::vault::AccountCredentials;
use dealerhub_core::{DealershipId, Lead, RemoteLeadStatus};

// =============================================================================
// Lead Payloads
// =============================================================================

/// Lead body sent on create and update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct LeadPayload {
    pub customer_name: String,
    pub email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comments: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stock_number: Option<String>,
    pub lead_status: i32,
}

impl LeadPayload {
    /// Builds the outward payload. `Done` goes out as `Won`.
    pub fn from_lead(lead: &Lead, stock_number: Option<String>) -> Self {
        LeadPayload {
            customer_name: lead.customer_name.clone(),
            email: lead.email.clone(),
            phone: lead.phone.clone(),
            comments: lead.message.clone(),
            stock_number,
            lead_status: RemoteLeadStatus::from(lead.status).code(),
        }
    }
}

/// The parts of a remote lead the reconciler needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteLead {
    pub lead_number: String,
    pub status_code: i32,
}

// =============================================================================
// API Trait
// =============================================================================

/// Operations the sync engines need from EasyCars.
///
/// Credentials are passed on every call; implementations must not hold on
/// to them beyond the call.
#[async_trait]
pub trait EasyCarsApi: Send + Sync {
    /// Checks that the credentials can obtain a token.
    async fn authenticate(&self, credentials: &AccountCredentials) -> Result<(), ApiError>;

    /// Returns the raw stock records for the account.
    async fn fetch_stock(
        &self,
        dealership_id: DealershipId,
        credentials: &AccountCredentials,
    ) -> Result<Vec<Value>, ApiError>;

    /// Sends one vehicle's stock record.
    async fn push_stock_update(
        &self,
        dealership_id: DealershipId,
        credentials: &AccountCredentials,
        stock: &Value,
    ) -> Result<(), ApiError>;

    /// Creates a lead and returns its EasyCars lead number.
    async fn create_lead(
        &self,
        dealership_id: DealershipId,
        credentials: &AccountCredentials,
        lead: &LeadPayload,
    ) -> Result<String, ApiError>;

    async fn update_lead(
        &self,
        dealership_id: DealershipId,
        credentials: &AccountCredentials,
        lead_number: &str,
        lead: &LeadPayload,
    ) -> Result<(), ApiError>;

    async fn get_lead(
        &self,
        dealership_id: DealershipId,
        credentials: &AccountCredentials,
        lead_number: &str,
    ) -> Result<RemoteLead, ApiError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use dealerhub_core::LeadStatus;

    fn lead(status: LeadStatus) -> Lead {
        Lead {
            id: "l1".into(),
            dealership_id: 1,
            vehicle_id: None,
            customer_name: "Sam Driver".into(),
            email: "sam@example.com".into(),
            phone: None,
            message: Some("Is it still available?".into()),
            status,
            easycars_lead_number: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_payload_sends_done_as_won() {
        let payload = LeadPayload::from_lead(&lead(LeadStatus::Done), None);
        assert_eq!(payload.lead_status, 3);
    }

    #[test]
    fn test_payload_wire_names() {
        let payload = LeadPayload::from_lead(&lead(LeadStatus::Received), Some("4411".into()));
        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["CustomerName"], "Sam Driver");
        assert_eq!(json["Comments"], "Is it still available?");
        assert_eq!(json["StockNumber"], "4411");
        assert_eq!(json["LeadStatus"], 1);
        assert!(json.get("Phone").is_none());
    }
}
