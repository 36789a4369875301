//! Blob storage for uploaded document bytes.

pub mod filesystem;
pub mod s3;
mod sigv4;

use async_trait::async_trait;
use reqwest::StatusCode;
use std::path::Path;
use thiserror::Error;
use uuid::Uuid;

pub use filesystem::FilesystemObjectStore;
pub use s3::S3ObjectStore;

/// Errors returned by object store backends.
#[derive(Debug, Error)]
pub enum ObjectStoreError {
    /// No blob exists under the requested key.
    #[error("Object not found: {0}")]
    NotFound(String),
    /// Key was empty or tried to escape the store's namespace.
    #[error("Invalid object key: {0}")]
    InvalidKey(String),
    /// Endpoint URL failed to parse or normalize.
    #[error("Invalid object store URL: {0}")]
    InvalidUrl(String),
    /// Request signing could not be completed.
    #[error("Failed to sign request: {0}")]
    Signing(String),
    /// Local filesystem failure.
    #[error("Filesystem error: {0}")]
    Io(#[from] std::io::Error),
    /// HTTP layer failed before receiving a response.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    /// Remote store responded with an unexpected status code.
    #[error("Unexpected object store response ({status}): {body}")]
    UnexpectedStatus {
        /// HTTP status returned by the store.
        status: StatusCode,
        /// Body payload associated with the failing response.
        body: String,
    },
}

/// Bytes fetched from the store.
#[derive(Debug, Clone)]
pub struct Blob {
    /// Raw object contents.
    pub bytes: Vec<u8>,
    /// Content type recorded by the store, when it keeps one.
    pub content_type: Option<String>,
}

/// Key-addressed byte storage.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Store `bytes` under `key`, replacing any existing blob.
    async fn put(&self, key: &str, bytes: &[u8], content_type: &str) -> Result<(), ObjectStoreError>;

    /// Fetch the blob stored under `key`.
    async fn get(&self, key: &str) -> Result<Blob, ObjectStoreError>;

    /// Remove the blob stored under `key`. Missing blobs are not an error.
    async fn delete(&self, key: &str) -> Result<(), ObjectStoreError>;
}

/// Generate a collision-free storage key, keeping only the original extension.
///
/// The key is a fresh UUID; the original filename never reaches the store beyond
/// a sanitised extension such as `.pdf`.
pub fn generate_storage_key(original_name: &str) -> String {
    let extension = Path::new(original_name)
        .extension()
        .and_then(|ext| ext.to_str())
        .filter(|ext| !ext.is_empty() && ext.len() <= 10)
        .filter(|ext| ext.chars().all(|c| c.is_ascii_alphanumeric()))
        .map(|ext| format!(".{}", ext.to_ascii_lowercase()))
        .unwrap_or_default();
    format!("{}{}", Uuid::new_v4(), extension)
}

pub(crate) fn validate_key(key: &str) -> Result<(), ObjectStoreError> {
    let invalid = key.is_empty()
        || key.starts_with('/')
        || key.contains('\\')
        || key.split('/').any(|segment| segment.is_empty() || segment == "." || segment == "..");
    if invalid {
        return Err(ObjectStoreError::InvalidKey(key.to_string()));
    }
    Ok(())
}
