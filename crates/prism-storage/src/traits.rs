//! Object store abstraction
//!
//! This module defines the `ObjectStore` trait that every backend implements.

use async_trait::async_trait;
use bytes::Bytes;
use prism_core::constants::{DEFAULT_CACHE_CONTROL, DERIVATIVE_CONTENT_TYPE};
use prism_core::{AccessPolicy, StorageBackend};
use thiserror::Error;

/// Storage operation errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Upload failed: {0}")]
    UploadFailed(String),

    #[error("Download failed: {0}")]
    DownloadFailed(String),

    #[error("Object not found: {0}")]
    NotFound(String),

    #[error("Invalid storage key: {0}")]
    InvalidKey(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl StorageError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, StorageError::NotFound(_))
    }
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Attributes written alongside an object body
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PutOptions {
    pub content_type: String,
    /// Stored as user metadata, not as the `Cache-Control` header.
    pub cache_control: Option<String>,
    pub access: AccessPolicy,
}

impl PutOptions {
    /// Attributes every derivative is written with.
    pub fn derivative(cache_control: impl Into<String>) -> Self {
        Self {
            content_type: DERIVATIVE_CONTENT_TYPE.to_string(),
            cache_control: Some(cache_control.into()),
            access: AccessPolicy::PublicRead,
        }
    }
}

impl Default for PutOptions {
    fn default() -> Self {
        Self::derivative(DEFAULT_CACHE_CONTROL)
    }
}

/// Object store trait
///
/// Objects are addressed by bucket and key. Backends must be safe to call
/// concurrently; the pipeline issues every derivative write at once.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Fetch an object's full body
    async fn get(&self, bucket: &str, key: &str) -> StorageResult<Bytes>;

    /// Write (or overwrite) an object
    async fn put(
        &self,
        bucket: &str,
        key: &str,
        body: Bytes,
        options: &PutOptions,
    ) -> StorageResult<()>;

    /// Get the storage backend type
    fn backend_type(&self) -> StorageBackend;
}
