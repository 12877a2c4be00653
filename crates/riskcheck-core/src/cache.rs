//! Generic key/value cache contract and an in-memory implementation.
//!
//! The engine persists through whatever store the deployment provides; the
//! contract is deliberately small: string values, colon-namespaced keys,
//! and `ttl_secs = 0` meaning "never expire".

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::warn;

use crate::CoreError;

/// Durable key/value store contract implemented by the deployment.
pub trait CacheStore: Send + Sync {
    fn get<'a>(
        &'a self,
        key: &'a str,
    ) -> Pin<Box<dyn Future<Output = Option<String>> + Send + 'a>>;

    /// `ttl_secs = 0` means the entry never expires.
    fn set<'a>(
        &'a self,
        key: &'a str,
        value: String,
        ttl_secs: u64,
    ) -> Pin<Box<dyn Future<Output = ()> + Send + 'a>>;

    fn delete<'a>(&'a self, key: &'a str) -> Pin<Box<dyn Future<Output = ()> + Send + 'a>>;
}

/// TTL marker for entries that never expire.
pub const TTL_FOREVER: u64 = 0;

/// Read and decode a JSON record; a missing or undecodable entry is a miss.
pub async fn get_json<T: DeserializeOwned>(store: &dyn CacheStore, key: &str) -> Option<T> {
    let raw = store.get(key).await?;
    match serde_json::from_str(&raw) {
        Ok(value) => Some(value),
        Err(error) => {
            warn!(key, %error, "discarding undecodable cache entry");
            None
        }
    }
}

/// Encode and write a JSON record.
pub async fn set_json<T: Serialize>(
    store: &dyn CacheStore,
    key: &str,
    value: &T,
    ttl_secs: u64,
) -> Result<(), CoreError> {
    let encoded = serde_json::to_string(value)?;
    store.set(key, encoded, ttl_secs).await;
    Ok(())
}

#[derive(Debug, Clone)]
struct MemoryEntry {
    value: String,
    expires_at: Option<Instant>,
}

#[derive(Debug, Default)]
struct MemoryInner {
    map: HashMap<String, MemoryEntry>,
}

impl MemoryInner {
    fn get(&self, key: &str) -> Option<String> {
        self.map.get(key).and_then(|entry| {
            let live = entry
                .expires_at
                .map(|deadline| Instant::now() <= deadline)
                .unwrap_or(true);
            live.then(|| entry.value.clone())
        })
    }

    fn set(&mut self, key: String, value: String, ttl_secs: u64) {
        let expires_at = (ttl_secs != TTL_FOREVER)
            .then(|| Instant::now() + Duration::from_secs(ttl_secs));
        self.map.insert(key, MemoryEntry { value, expires_at });
    }
}

/// Thread-safe in-memory store; the default backing for tests and
/// single-process deployments.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    inner: Arc<tokio::sync::RwLock<MemoryInner>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.map.len()
    }

    pub async fn clear(&self) {
        self.inner.write().await.map.clear();
    }
}

impl CacheStore for MemoryStore {
    fn get<'a>(
        &'a self,
        key: &'a str,
    ) -> Pin<Box<dyn Future<Output = Option<String>> + Send + 'a>> {
        Box::pin(async move { self.inner.read().await.get(key) })
    }

    fn set<'a>(
        &'a self,
        key: &'a str,
        value: String,
        ttl_secs: u64,
    ) -> Pin<Box<dyn Future<Output = ()> + Send + 'a>> {
        Box::pin(async move {
            self.inner.write().await.set(key.to_owned(), value, ttl_secs);
        })
    }

    fn delete<'a>(&'a self, key: &'a str) -> Pin<Box<dyn Future<Output = ()> + Send + 'a>> {
        Box::pin(async move {
            self.inner.write().await.map.remove(key);
        })
    }
}
