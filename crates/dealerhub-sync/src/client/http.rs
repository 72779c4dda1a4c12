//! # EasyCars HTTP Client
//!
//! `reqwest` implementation of [`EasyCarsApi`]. Every endpoint is a JSON
//! POST relative to the environment's base URL:
//!
//! ```text
//! ┌──────────────────────┬───────────────────────┬───────────────────────┐
//! │ Operation            │ Path                  │ Retry                 │
//! ├──────────────────────┼───────────────────────┼───────────────────────┤
//! │ authenticate         │ /api/auth/token       │ code 5, transport     │
//! │ fetch_stock          │ /api/stock/list       │ code 5, transport     │
//! │ push_stock_update    │ /api/stock/update     │ code 5, transport     │
//! │ create_lead          │ /api/lead/create      │ code 5, connect only  │
//! │ update_lead          │ /api/lead/update      │ code 5, transport     │
//! │ get_lead             │ /api/lead/get         │ code 5, transport     │
//! └──────────────────────┴───────────────────────┴───────────────────────┘
//! ```

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use std::time::Duration;
use tracing::{debug, info};

use super::error::{ApiError, ResponseCode};
use super::retry::{retry, Idempotency, LinearBackoff};
use super::token_cache::{TokenCache, TokenKey};
use super::{EasyCarsApi, LeadPayload, RemoteLead};
use crate::config::EasyCarsSettings;
use crate::vault::AccountCredentials;
use dealerhub_core::DealershipId;

const AUTH_PATH: &str = "/api/auth/token";
const STOCK_LIST_PATH: &str = "/api/stock/list";
const STOCK_UPDATE_PATH: &str = "/api/stock/update";
const LEAD_CREATE_PATH: &str = "/api/lead/create";
const LEAD_UPDATE_PATH: &str = "/api/lead/update";
const LEAD_GET_PATH: &str = "/api/lead/get";

// =============================================================================
// Response Bodies
// =============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct TokenResponse {
    token: String,
    #[serde(default)]
    expires_in: Option<u64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct StockListResponse {
    #[serde(default)]
    stocks: Vec<Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct LeadGetResponse {
    lead: Value,
}

// =============================================================================
// Client
// =============================================================================

/// HTTP client for EasyCars with a per-instance token cache.
pub struct EasyCarsClient {
    http: reqwest::Client,
    settings: EasyCarsSettings,
    tokens: TokenCache,
}

impl std::fmt::Debug for EasyCarsClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EasyCarsClient")
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl EasyCarsClient {
    pub fn new(settings: EasyCarsSettings) -> Result<Self, ApiError> {
        let http = reqwest::Client::builder()
            .timeout(settings.timeout())
            .build()?;
        Ok(EasyCarsClient {
            http,
            settings,
            tokens: TokenCache::new(),
        })
    }

    pub fn settings(&self) -> &EasyCarsSettings {
        &self.settings
    }

    pub fn tokens(&self) -> &TokenCache {
        &self.tokens
    }

    fn backoff(&self) -> LinearBackoff {
        LinearBackoff::new(self.settings.retry_delay(), self.settings.retry_attempts)
    }

    fn url(&self, credentials: &AccountCredentials, path: &str) -> String {
        format!("{}{}", self.settings.base_url(credentials.environment), path)
    }

    // =========================================================================
    // Tokens
    // =========================================================================

    /// Returns a cached token or exchanges the client id and secret for one.
    async fn token(&self, credentials: &AccountCredentials) -> Result<String, ApiError> {
        let key = TokenKey::new(credentials.client_id.clone(), credentials.environment);
        self.tokens
            .get_or_fetch(&key, move || self.request_token(credentials))
            .await
    }

    async fn request_token(
        &self,
        credentials: &AccountCredentials,
    ) -> Result<(String, Duration), ApiError> {
        debug!(environment = %credentials.environment, "Requesting EasyCars token");
        let body = json!({
            "ClientId": credentials.client_id,
            "ClientSecret": credentials.client_secret,
        });
        let envelope = self.post(&self.url(credentials, AUTH_PATH), None, &body).await?;
        let response: TokenResponse = decode(envelope)?;

        let lifetime = response
            .expires_in
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
            .unwrap_or_else(|| self.settings.token_lifetime());
        Ok((response.token, lifetime))
    }

    // =========================================================================
    // Transport
    // =========================================================================

    /// Sends one POST and folds HTTP status and response code into a result.
    async fn post(&self, url: &str, token: Option<&str>, body: &Value) -> Result<Value, ApiError> {
        let mut request = self.http.post(url).json(body);
        if let Some(token) = token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        let status = response.status();
        if status == StatusCode::UNAUTHORIZED {
            return Err(ApiError::Authentication {
                message: "HTTP 401".to_string(),
            });
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ApiError::HttpStatus {
                status: status.as_u16(),
                body,
            });
        }

        let envelope: Value = response.json().await?;
        check_response_code(&envelope)?;
        Ok(envelope)
    }

    /// An authenticated call with retries. A code 1 evicts the token used.
    async fn call(
        &self,
        operation: &str,
        idempotency: Idempotency,
        credentials: &AccountCredentials,
        path: &str,
        body: Value,
    ) -> Result<Value, ApiError> {
        let url = self.url(credentials, path);
        let url = url.as_str();
        let body = &body;

        retry(operation, self.backoff(), idempotency, move |attempt| async move {
            let token = self.token(credentials).await?;
            match self.post(url, Some(&token), body).await {
                Err(err) if err.is_auth_error() => {
                    let key = TokenKey::new(credentials.client_id.clone(), credentials.environment);
                    self.tokens.invalidate(&key, &token).await;
                    debug!(operation, attempt, "EasyCars rejected token");
                    Err(err)
                }
                other => other,
            }
        })
        .await
    }
}

/// Reads `ResponseCode` / `ResponseMessage` from a response envelope.
fn check_response_code(envelope: &Value) -> Result<(), ApiError> {
    let code = envelope
        .get("ResponseCode")
        .and_then(Value::as_i64)
        .ok_or_else(|| ApiError::Decode("response has no ResponseCode".to_string()))?;
    let message = envelope
        .get("ResponseMessage")
        .and_then(Value::as_str)
        .map(str::to_string);
    ResponseCode::from(code).into_result(message)
}

fn encode(lead: &LeadPayload) -> Result<Value, ApiError> {
    serde_json::to_value(lead).map_err(|e| ApiError::Decode(e.to_string()))
}

fn decode<T: DeserializeOwned>(envelope: Value) -> Result<T, ApiError> {
    serde_json::from_value(envelope).map_err(|e| ApiError::Decode(e.to_string()))
}

/// EasyCars sends identifiers as strings or numbers.
fn string_field(value: &Value, name: &str) -> Option<String> {
    match value.get(name)? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn account_body(credentials: &AccountCredentials) -> Map<String, Value> {
    let mut body = Map::new();
    body.insert("AccountNumber".into(), json!(credentials.account_number));
    body.insert("AccountSecret".into(), json!(credentials.account_secret));
    if let Some(yard) = &credentials.yard_code {
        body.insert("YardCode".into(), json!(yard));
    }
    body
}

// =============================================================================
// EasyCarsApi Implementation
// =============================================================================

#[async_trait]
impl EasyCarsApi for EasyCarsClient {
    /// Always asks the provider, so a cached token cannot hide bad credentials.
    async fn authenticate(&self, credentials: &AccountCredentials) -> Result<(), ApiError> {
        let (token, lifetime) = retry("auth.token", self.backoff(), Idempotency::Idempotent, move |_| {
            self.request_token(credentials)
        })
        .await?;
        let key = TokenKey::new(credentials.client_id.clone(), credentials.environment);
        self.tokens.insert(key, token, lifetime).await;
        Ok(())
    }

    async fn fetch_stock(
        &self,
        dealership_id: DealershipId,
        credentials: &AccountCredentials,
    ) -> Result<Vec<Value>, ApiError> {
        let body = Value::Object(account_body(credentials));
        let envelope = self
            .call("stock.list", Idempotency::Idempotent, credentials, STOCK_LIST_PATH, body)
            .await?;
        let response: StockListResponse = decode(envelope)?;
        info!(dealership_id, items = response.stocks.len(), "Fetched EasyCars stock");
        Ok(response.stocks)
    }

    async fn push_stock_update(
        &self,
        dealership_id: DealershipId,
        credentials: &AccountCredentials,
        stock: &Value,
    ) -> Result<(), ApiError> {
        let mut body = account_body(credentials);
        body.insert("Stock".into(), stock.clone());
        self.call(
            "stock.update",
            Idempotency::Idempotent,
            credentials,
            STOCK_UPDATE_PATH,
            Value::Object(body),
        )
        .await?;
        debug!(dealership_id, "Pushed stock update");
        Ok(())
    }

    async fn create_lead(
        &self,
        dealership_id: DealershipId,
        credentials: &AccountCredentials,
        lead: &LeadPayload,
    ) -> Result<String, ApiError> {
        let mut body = account_body(credentials);
        body.insert("Lead".into(), encode(lead)?);
        let envelope = self
            .call(
                "lead.create",
                Idempotency::NonIdempotent,
                credentials,
                LEAD_CREATE_PATH,
                Value::Object(body),
            )
            .await?;

        let lead_number = string_field(&envelope, "LeadNumber")
            .ok_or_else(|| ApiError::Decode("lead create response has no LeadNumber".to_string()))?;
        debug!(dealership_id, %lead_number, "Created EasyCars lead");
        Ok(lead_number)
    }

    async fn update_lead(
        &self,
        dealership_id: DealershipId,
        credentials: &AccountCredentials,
        lead_number: &str,
        lead: &LeadPayload,
    ) -> Result<(), ApiError> {
        let mut body = account_body(credentials);
        body.insert("LeadNumber".into(), json!(lead_number));
        body.insert("Lead".into(), encode(lead)?);
        self.call(
            "lead.update",
            Idempotency::Idempotent,
            credentials,
            LEAD_UPDATE_PATH,
            Value::Object(body),
        )
        .await?;
        debug!(dealership_id, lead_number, status = lead.lead_status, "Updated EasyCars lead");
        Ok(())
    }

    async fn get_lead(
        &self,
        _dealership_id: DealershipId,
        credentials: &AccountCredentials,
        lead_number: &str,
    ) -> Result<RemoteLead, ApiError> {
        let mut body = account_body(credentials);
        body.insert("LeadNumber".into(), json!(lead_number));
        let envelope = self
            .call("lead.get", Idempotency::Idempotent, credentials, LEAD_GET_PATH, Value::Object(body))
            .await?;
        let response: LeadGetResponse = decode(envelope)?;

        let status_code = response
            .lead
            .get("LeadStatus")
            .and_then(Value::as_i64)
            .ok_or_else(|| ApiError::Decode("lead has no LeadStatus".to_string()))?;
        let status_code = i32::try_from(status_code)
            .map_err(|_| ApiError::Decode(format!("lead status {status_code} out of range")))?;
        Ok(RemoteLead {
            lead_number: string_field(&response.lead, "LeadNumber")
                .unwrap_or_else(|| lead_number.to_string()),
            status_code,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dealerhub_core::Environment;
    use std::sync::{Arc, Mutex};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpListener, TcpStream};

    // -------------------------------------------------------------------------
    // Scripted HTTP server: one canned reply per accepted connection
    // -------------------------------------------------------------------------

    #[derive(Debug, Clone)]
    struct Seen {
        path: String,
        authorization: Option<String>,
        body: Value,
    }

    struct Scripted {
        base_url: String,
        seen: Arc<Mutex<Vec<Seen>>>,
    }

    impl Scripted {
        fn seen(&self) -> Vec<Seen> {
            self.seen.lock().unwrap().clone()
        }
    }

    async fn serve(replies: Vec<(u16, Value)>) -> Scripted {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let log = seen.clone();

        tokio::spawn(async move {
            for (status, body) in replies {
                let Ok((mut socket, _)) = listener.accept().await else {
                    return;
                };
                let request = read_request(&mut socket).await;
                log.lock().unwrap().push(request);

                let body = body.to_string();
                let reply = format!(
                    "HTTP/1.1 {status} OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                    body.len()
                );
                let _ = socket.write_all(reply.as_bytes()).await;
                let _ = socket.shutdown().await;
            }
        });

        Scripted {
            base_url: format!("http://{addr}"),
            seen,
        }
    }

    async fn read_request(socket: &mut TcpStream) -> Seen {
        let mut buf = Vec::new();
        let mut chunk = [0u8; 4096];
        let header_end = loop {
            let n = socket.read(&mut chunk).await.unwrap();
            buf.extend_from_slice(&chunk[..n]);
            if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
                break pos;
            }
            assert!(n > 0, "connection closed before headers");
        };

        let head = String::from_utf8_lossy(&buf[..header_end]).to_string();
        let header = |name: &str| {
            head.lines().find_map(|line| {
                let (key, value) = line.split_once(':')?;
                key.trim()
                    .eq_ignore_ascii_case(name)
                    .then(|| value.trim().to_string())
            })
        };
        let length: usize = header("content-length")
            .and_then(|v| v.parse().ok())
            .unwrap_or(0);

        while buf.len() < header_end + 4 + length {
            let n = socket.read(&mut chunk).await.unwrap();
            assert!(n > 0, "connection closed before body");
            buf.extend_from_slice(&chunk[..n]);
        }

        let path = head
            .lines()
            .next()
            .and_then(|line| line.split_whitespace().nth(1))
            .unwrap_or_default()
            .to_string();
        let body = serde_json::from_slice(&buf[header_end + 4..header_end + 4 + length])
            .unwrap_or(Value::Null);

        Seen {
            path,
            authorization: header("authorization"),
            body,
        }
    }

    fn client(base_url: &str) -> EasyCarsClient {
        EasyCarsClient::new(EasyCarsSettings {
            test_url: base_url.to_string(),
            retry_attempts: 3,
            retry_delay_ms: 0,
            timeout_secs: 5,
            ..Default::default()
        })
        .unwrap()
    }

    fn credentials() -> AccountCredentials {
        AccountCredentials {
            client_id: "portal".into(),
            client_secret: "s3cret".into(),
            account_number: "0f8fad5b-d9cb-469f-a165-70867728950e".into(),
            account_secret: "7c9e6679-7425-40de-944b-e07fc1f90ae7".into(),
            environment: Environment::Test,
            yard_code: None,
        }
    }

    fn token(value: &str) -> (u16, Value) {
        (200, json!({"ResponseCode": 0, "Token": value, "ExpiresIn": 3600}))
    }

    fn stock_ok() -> (u16, Value) {
        (
            200,
            json!({"ResponseCode": 0, "Stocks": [{"StockNumber": "A1"}, {"StockNumber": "A2"}]}),
        )
    }

    fn code(code: i32) -> (u16, Value) {
        (200, json!({"ResponseCode": code, "ResponseMessage": format!("code {code}")}))
    }

    // -------------------------------------------------------------------------
    // Tests
    // -------------------------------------------------------------------------

    #[tokio::test]
    async fn test_token_is_cached_between_calls() {
        let server = serve(vec![token("t1"), stock_ok(), stock_ok()]).await;
        let client = client(&server.base_url);

        assert_eq!(client.fetch_stock(1, &credentials()).await.unwrap().len(), 2);
        assert_eq!(client.fetch_stock(1, &credentials()).await.unwrap().len(), 2);

        let seen = server.seen();
        let paths: Vec<_> = seen.iter().map(|s| s.path.as_str()).collect();
        assert_eq!(paths, [AUTH_PATH, STOCK_LIST_PATH, STOCK_LIST_PATH]);
        assert_eq!(seen[0].body["ClientId"], "portal");
        assert_eq!(seen[1].authorization.as_deref(), Some("Bearer t1"));
        assert_eq!(seen[2].authorization.as_deref(), Some("Bearer t1"));
        assert_eq!(seen[1].body["AccountNumber"], credentials().account_number);
    }

    #[tokio::test]
    async fn test_temporary_code_is_retried() {
        let server = serve(vec![token("t1"), code(5), stock_ok()]).await;
        let client = client(&server.base_url);

        let stock = client.fetch_stock(1, &credentials()).await.unwrap();
        assert_eq!(stock.len(), 2);
        assert_eq!(server.seen().len(), 3);
    }

    #[tokio::test]
    async fn test_auth_code_evicts_token_and_is_not_retried() {
        let server = serve(vec![token("t1"), code(1), token("t2"), stock_ok()]).await;
        let client = client(&server.base_url);

        let err = client.fetch_stock(1, &credentials()).await.unwrap_err();
        assert!(err.is_auth_error());
        assert!(client.tokens().is_empty().await);

        client.fetch_stock(1, &credentials()).await.unwrap();
        let seen = server.seen();
        assert_eq!(seen.len(), 4);
        assert_eq!(seen[3].authorization.as_deref(), Some("Bearer t2"));
    }

    #[tokio::test]
    async fn test_validation_and_unknown_codes_surface_once() {
        let server = serve(vec![token("t1"), code(7), code(42)]).await;
        let client = client(&server.base_url);
        let payload = LeadPayload {
            customer_name: "Sam".into(),
            email: "sam@example.com".into(),
            phone: None,
            comments: None,
            stock_number: None,
            lead_status: 1,
        };

        let err = client.create_lead(1, &credentials(), &payload).await.unwrap_err();
        assert!(matches!(err, ApiError::Validation { .. }));

        let err = client.get_lead(1, &credentials(), "L-1").await.unwrap_err();
        assert!(matches!(err, ApiError::Unknown { code: 42, .. }));
        assert_eq!(server.seen().len(), 3);
    }

    #[tokio::test]
    async fn test_lead_create_and_get() {
        let server = serve(vec![
            token("t1"),
            (200, json!({"ResponseCode": 0, "LeadNumber": 9001})),
            (200, json!({"ResponseCode": 0, "Lead": {"LeadNumber": "9001", "LeadStatus": 3}})),
        ])
        .await;
        let client = client(&server.base_url);
        let payload = LeadPayload {
            customer_name: "Sam".into(),
            email: "sam@example.com".into(),
            phone: None,
            comments: None,
            stock_number: Some("A1".into()),
            lead_status: 1,
        };

        let number = client.create_lead(1, &credentials(), &payload).await.unwrap();
        assert_eq!(number, "9001");

        let remote = client.get_lead(1, &credentials(), &number).await.unwrap();
        assert_eq!(remote.status_code, 3);

        let seen = server.seen();
        assert_eq!(seen[1].body["Lead"]["CustomerName"], "Sam");
        assert_eq!(seen[2].body["LeadNumber"], "9001");
    }

    #[tokio::test]
    async fn test_http_401_is_auth_error() {
        let server = serve(vec![token("t1"), (401, json!({}))]).await;
        let client = client(&server.base_url);

        let err = client.fetch_stock(1, &credentials()).await.unwrap_err();
        assert!(err.is_auth_error());
    }

    #[tokio::test]
    async fn test_authenticate_bypasses_cached_token() {
        let server = serve(vec![token("t1"), token("t2"), stock_ok()]).await;
        let client = client(&server.base_url);

        client.authenticate(&credentials()).await.unwrap();
        client.authenticate(&credentials()).await.unwrap();
        client.fetch_stock(1, &credentials()).await.unwrap();

        let seen = server.seen();
        let paths: Vec<_> = seen.iter().map(|s| s.path.as_str()).collect();
        assert_eq!(paths, [AUTH_PATH, AUTH_PATH, STOCK_LIST_PATH]);
        assert_eq!(seen[2].authorization.as_deref(), Some("Bearer t2"));
    }

    #[tokio::test]
    async fn test_authenticate_reports_rejected_credentials() {
        let server = serve(vec![token("t1"), code(1)]).await;
        let client = client(&server.base_url);

        client.authenticate(&credentials()).await.unwrap();
        let err = client.authenticate(&credentials()).await.unwrap_err();
        assert!(err.is_auth_error());
        assert_eq!(server.seen().len(), 2);
    }

    #[tokio::test]
    async fn test_out_of_range_lead_status_is_decode_error() {
        let server = serve(vec![
            token("t1"),
            (200, json!({"ResponseCode": 0, "Lead": {"LeadNumber": "9001", "LeadStatus": 4294967299i64}})),
        ])
        .await;
        let client = client(&server.base_url);

        let err = client.get_lead(1, &credentials(), "9001").await.unwrap_err();
        assert!(matches!(err, ApiError::Decode(_)));
    }

    #[test]
    fn test_response_code_wider_than_i32_is_unknown() {
        assert!(matches!(
            check_response_code(&json!({"ResponseCode": 4294967296i64})),
            Err(ApiError::Unknown { code: 4294967296, .. })
        ));
    }

    #[test]
    fn test_missing_response_code_is_decode_error() {
        assert!(matches!(
            check_response_code(&json!({"Stocks": []})),
            Err(ApiError::Decode(_))
        ));
        assert!(check_response_code(&json!({"ResponseCode": 0})).is_ok());
    }
}
