//! Attachment content storage.

pub mod filesystem;

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::{AppError, Result};

/// Storage backend for attachment bytes, addressed by opaque keys.
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Store content under `key`, replacing anything already there.
    async fn put(&self, key: &str, content: Bytes) -> Result<()>;

    /// Read the content stored under `key`.
    async fn get(&self, key: &str) -> Result<Bytes>;

    async fn exists(&self, key: &str) -> Result<bool>;

    /// Remove `key`. Removing a missing key is not an error.
    async fn delete(&self, key: &str) -> Result<()>;
}

/// Reject keys that could escape the storage root.
pub fn validate_key(key: &str) -> Result<()> {
    if key.is_empty() {
        return Err(AppError::Storage("Empty storage key".to_string()));
    }
    if key.starts_with('/') || key.contains('\\') || key.contains('\0') {
        return Err(AppError::Storage(format!("Invalid storage key: {}", key)));
    }
    if key.split('/').any(|seg| seg.is_empty() || seg == "." || seg == "..") {
        return Err(AppError::Storage(format!("Invalid storage key: {}", key)));
    }
    Ok(())
}
