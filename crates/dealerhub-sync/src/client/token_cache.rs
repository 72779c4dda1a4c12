//! # Bearer Token Cache
//!
//! One entry per (client id, environment). Entries expire 5% before the
//! provider's stated lifetime so a token never runs out mid-call.
//!
//! ```text
//!  lifetime ├────────────────────────────────────────────┤
//!  cached   ├──────────────────────────────────────┤ 5% │
//!                                                  ▲
//!                                        entry treated as absent
//! ```
//!
//! Invalidation compares the token string: a request that failed with an
//! old token cannot evict a newer one another task just fetched.
//!
//! Fetches are single-flight per key. A slow token endpoint for one
//! credential never holds up callers of another.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, RwLock};
use tracing::debug;

use dealerhub_core::Environment;

/// Cache key: one token per credential scope.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TokenKey {
    pub client_id: String,
    pub environment: Environment,
}

impl TokenKey {
    pub fn new(client_id: impl Into<String>, environment: Environment) -> Self {
        TokenKey {
            client_id: client_id.into(),
            environment,
        }
    }
}

#[derive(Debug, Clone)]
struct CachedToken {
    token: String,
    expires_at: Instant,
}

/// How long a token with the given lifetime stays in the cache.
pub fn cache_duration(lifetime: Duration) -> Duration {
    lifetime - lifetime / 20
}

/// In-memory bearer token cache, owned by one client instance.
#[derive(Debug, Default)]
pub struct TokenCache {
    entries: RwLock<HashMap<TokenKey, CachedToken>>,
    /// One fetch gate per key; the map lock is only held to look one up.
    fetching: Mutex<HashMap<TokenKey, Arc<Mutex<()>>>>,
}

impl TokenCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the cached token if it is still inside its safety margin.
    pub async fn get(&self, key: &TokenKey) -> Option<String> {
        let entries = self.entries.read().await;
        entries
            .get(key)
            .filter(|cached| Instant::now() < cached.expires_at)
            .map(|cached| cached.token.clone())
    }

    /// Stores a token that the provider says is valid for `lifetime`.
    pub async fn insert(&self, key: TokenKey, token: String, lifetime: Duration) {
        let expires_at = Instant::now() + cache_duration(lifetime);
        self.entries
            .write()
            .await
            .insert(key, CachedToken { token, expires_at });
    }

    async fn gate(&self, key: &TokenKey) -> Arc<Mutex<()>> {
        let mut fetching = self.fetching.lock().await;
        fetching.entry(key.clone()).or_default().clone()
    }

    /// Returns a valid token, fetching a new one when needed.
    ///
    /// Concurrent callers for the same missing key wait on that key's gate;
    /// the second one finds the token the first one stored.
    pub async fn get_or_fetch<F, Fut, E>(&self, key: &TokenKey, fetch: F) -> Result<String, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<(String, Duration), E>>,
    {
        if let Some(token) = self.get(key).await {
            return Ok(token);
        }

        let gate = self.gate(key).await;
        let _in_flight = gate.lock().await;

        // Double-check after acquiring the gate
        if let Some(token) = self.get(key).await {
            return Ok(token);
        }

        let (token, lifetime) = fetch().await?;
        debug!(
            environment = %key.environment,
            cached_secs = cache_duration(lifetime).as_secs(),
            "Caching EasyCars token"
        );
        self.insert(key.clone(), token.clone(), lifetime).await;
        Ok(token)
    }

    /// Evicts the entry if it still holds `token`. Returns true on eviction.
    pub async fn invalidate(&self, key: &TokenKey, token: &str) -> bool {
        let mut entries = self.entries.write().await;
        match entries.get(key) {
            Some(cached) if cached.token == token => {
                entries.remove(key);
                debug!(environment = %key.environment, "Invalidated EasyCars token");
                true
            }
            _ => false,
        }
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}
