//! Persistent key-value store abstraction and key layout.
//!
//! Every record the service persists lives under a key namespaced by ad id:
//!
//! ```text
//! {ad_id}:{stream}:version:{version_id}   one version record
//! {ad_id}:{stream}:active                 active pointer (a version id)
//! {ad_id}:mixer                           materialized MixerState
//! {ad_id}:mixer:durations                 measured track durations
//! ```

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::CoreError;
use crate::stream::StreamType;

/// Errors raised at the persistence boundary.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The backend could not be reached or rejected the operation.
    #[error("storage backend error: {0}")]
    Backend(String),

    /// A stored record could not be decoded into the expected shape.
    #[error("corrupt record at '{key}': {message}")]
    Corrupt { key: String, message: String },
}

/// A key-value store of opaque JSON records.
///
/// Implementations must provide per-key atomicity for `set` and `delete`.
/// No multi-key transactions are assumed.
///
/// Implementations must be `Send + Sync + 'static` so they can live in axum
/// application state behind an `Arc<dyn KvStore>`.
#[async_trait]
pub trait KvStore: Send + Sync + 'static {
    /// Fetch the record stored at `key`, if any.
    async fn get(&self, key: &str) -> Result<Option<serde_json::Value>, StoreError>;

    /// Insert or replace the record stored at `key`.
    async fn set(&self, key: &str, record: serde_json::Value) -> Result<(), StoreError>;

    /// Remove the record at `key`. Returns `true` if a record was removed.
    async fn delete(&self, key: &str) -> Result<bool, StoreError>;

    /// List every key starting with `prefix`, in ascending key order.
    async fn list_keys(&self, prefix: &str) -> Result<Vec<String>, StoreError>;

    /// Check that the backend is reachable.
    async fn health_check(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

/// Fetch and decode a typed record.
pub async fn get_record<T: DeserializeOwned>(
    store: &dyn KvStore,
    key: &str,
) -> Result<Option<T>, StoreError> {
    match store.get(key).await? {
        Some(value) => serde_json::from_value(value)
            .map(Some)
            .map_err(|e| StoreError::Corrupt {
                key: key.to_string(),
                message: e.to_string(),
            }),
        None => Ok(None),
    }
}

/// Encode and store a typed record.
pub async fn put_record<T: Serialize>(
    store: &dyn KvStore,
    key: &str,
    record: &T,
) -> Result<(), StoreError> {
    let value = serde_json::to_value(record).map_err(|e| StoreError::Corrupt {
        key: key.to_string(),
        message: e.to_string(),
    })?;
    store.set(key, value).await
}

// ---------------------------------------------------------------------------
// Key layout
// ---------------------------------------------------------------------------

/// Reject ad ids that would break key namespacing.
pub fn validate_ad_id(ad_id: &str) -> Result<(), CoreError> {
    if ad_id.trim().is_empty() {
        return Err(CoreError::MalformedInput("Ad id must not be empty".into()));
    }
    if ad_id.contains(':') {
        return Err(CoreError::MalformedInput(format!(
            "Ad id '{ad_id}' must not contain ':'"
        )));
    }
    Ok(())
}

pub mod keys {
    use super::StreamType;

    pub fn version_prefix(ad_id: &str, stream: StreamType) -> String {
        format!("{ad_id}:{stream}:version:")
    }

    pub fn version(ad_id: &str, stream: StreamType, version_id: &str) -> String {
        format!("{}{version_id}", version_prefix(ad_id, stream))
    }

    pub fn active(ad_id: &str, stream: StreamType) -> String {
        format!("{ad_id}:{stream}:active")
    }

    pub fn mixer(ad_id: &str) -> String {
        format!("{ad_id}:mixer")
    }

    pub fn durations(ad_id: &str) -> String {
        format!("{ad_id}:mixer:durations")
    }
}
