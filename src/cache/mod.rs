//! API response cache
//!
//! Successful responses are stored keyed by (base URL, resolved resource
//! path) and reused until their expiry passes. The cache is best-effort:
//! store failures are logged and treated as misses, and never fail a
//! request.
//!
//! Only GET services read or write the cache, so the key leaves out the
//! method. Headers and auth are not part of it either. The resolved resource
//! path already includes the query string, so different query extensions
//! never collide.

pub mod store;

pub use store::{CacheStore, MemoryStore, SqliteStore};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

/// Minutes a stored response stays fresh
pub const EXPIRY_MIN: i64 = 60;

/// One persisted response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheRecord {
    pub base_url: String,
    pub resource: String,
    /// Positional path arguments of the request that produced this record
    #[serde(default)]
    pub request_args: Vec<String>,
    /// Snapshot of the request options, credentials redacted
    #[serde(default)]
    pub request_kwargs: String,
    pub response_content: String,
    #[serde(default)]
    pub response_content_json: Value,
    pub expiry: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CacheRecord {
    pub fn key(&self) -> (String, String) {
        (self.base_url.clone(), self.resource.clone())
    }

    /// Fresh while `expiry` is strictly in the future
    pub fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        self.expiry > now
    }
}

/// Lookup/store front for a [`CacheStore`].
///
/// Store calls may touch the disk, so they run on tokio's blocking pool.
#[derive(Clone)]
pub struct ResponseCache {
    store: Arc<dyn CacheStore>,
}

impl ResponseCache {
    pub fn new(store: Arc<dyn CacheStore>) -> Self {
        Self { store }
    }

    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStore::new()))
    }

    /// Content and parsed content of a fresh record, if any
    pub async fn lookup(&self, base_url: &str, resource: &str) -> Option<(String, Value)> {
        let store = self.store.clone();
        let (key_url, key_resource) = (base_url.to_string(), resource.to_string());
        let found = tokio::task::spawn_blocking(move || store.find(&key_url, &key_resource))
            .await
            .map_err(anyhow::Error::from)
            .and_then(|result| result);

        match found {
            Ok(Some(record)) if record.is_fresh(Utc::now()) => {
                tracing::debug!("Cache hit for {}{}", base_url, resource);
                Some((record.response_content, record.response_content_json))
            }
            Ok(Some(record)) => {
                tracing::debug!(
                    "Cache entry for {}{} expired at {}",
                    base_url,
                    resource,
                    record.expiry
                );
                None
            }
            Ok(None) => None,
            Err(e) => {
                tracing::warn!("Cache lookup failed for {}{}: {:#}", base_url, resource, e);
                None
            }
        }
    }

    /// Upsert a response with a fresh [`EXPIRY_MIN`] expiry
    pub async fn store(
        &self,
        base_url: &str,
        resource: &str,
        content: &str,
        json_content: &Value,
        request_args: Vec<String>,
        request_kwargs: String,
    ) {
        let now = Utc::now();
        let record = CacheRecord {
            base_url: base_url.to_string(),
            resource: resource.to_string(),
            request_args,
            request_kwargs,
            response_content: content.to_string(),
            response_content_json: json_content.clone(),
            expiry: now + Duration::minutes(EXPIRY_MIN),
            updated_at: now,
        };

        let store = self.store.clone();
        let stored = tokio::task::spawn_blocking(move || store.upsert(record))
            .await
            .map_err(anyhow::Error::from)
            .and_then(|result| result);
        if let Err(e) = stored {
            tracing::warn!("Failed to cache response for {}{}: {:#}", base_url, resource, e);
        }
    }

    /// Drop every expired record from the store
    pub async fn purge_expired(&self) -> anyhow::Result<usize> {
        let store = self.store.clone();
        tokio::task::spawn_blocking(move || store.purge_expired(Utc::now())).await?
    }
}
