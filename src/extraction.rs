//! Upload validation rules and the text-extraction client.

use async_trait::async_trait;
use reqwest::{Client, StatusCode, header::ACCEPT, header::CONTENT_TYPE};
use std::time::Duration;
use thiserror::Error;

/// Largest accepted upload, in bytes.
pub const MAX_UPLOAD_BYTES: usize = 50 * 1024 * 1024;

/// MIME types accepted for upload.
pub const ALLOWED_MIME_TYPES: [&str; 9] = [
    "application/pdf",
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
    "application/vnd.openxmlformats-officedocument.presentationml.presentation",
    "image/jpeg",
    "image/png",
    "text/plain",
    "text/csv",
    "application/vnd.ms-excel",
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
];

/// Whether `mime_type` is on the upload allow-list.
pub fn is_allowed(mime_type: &str) -> bool {
    ALLOWED_MIME_TYPES.contains(&mime_type)
}

/// Whether text extraction should be attempted for `mime_type`.
pub fn is_extractable(mime_type: &str) -> bool {
    matches!(
        mime_type,
        "application/pdf"
            | "application/vnd.openxmlformats-officedocument.wordprocessingml.document"
            | "application/vnd.openxmlformats-officedocument.presentationml.presentation"
    ) || mime_type.starts_with("text/")
}

/// Errors returned while extracting text.
#[derive(Debug, Error)]
pub enum ExtractionError {
    /// Base URL failed to parse or normalize.
    #[error("Invalid extraction service URL: {0}")]
    InvalidUrl(String),
    /// HTTP layer failed before receiving a response, including timeouts.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    /// Extraction service responded with an unexpected status code.
    #[error("Unexpected extraction response ({status}): {body}")]
    UnexpectedStatus {
        /// HTTP status returned by the service.
        status: StatusCode,
        /// Body payload associated with the failing response.
        body: String,
    },
}

/// Turns document bytes into plain text.
#[async_trait]
pub trait TextExtractor: Send + Sync {
    /// Extract whitespace-trimmed plain text from `bytes`.
    async fn extract(&self, bytes: &[u8], mime_type: &str) -> Result<String, ExtractionError>;
}

/// Apache Tika server client.
pub struct TikaClient {
    client: Client,
    endpoint: String,
}

impl TikaClient {
    /// Build a client for the Tika server at `url`, bounding each call by `timeout`.
    pub fn new(url: &str, timeout: Duration) -> Result<Self, ExtractionError> {
        let client = Client::builder()
            .user_agent("course-portal/0.1")
            .timeout(timeout)
            .build()?;
        let parsed = reqwest::Url::parse(url).map_err(|err| ExtractionError::InvalidUrl(err.to_string()))?;
        let endpoint = format!("{}/tika", parsed.as_str().trim_end_matches('/'));
        tracing::debug!(endpoint = %endpoint, timeout_secs = timeout.as_secs(), "Initialized Tika client");
        Ok(Self { client, endpoint })
    }
}

#[async_trait]
impl TextExtractor for TikaClient {
    async fn extract(&self, bytes: &[u8], mime_type: &str) -> Result<String, ExtractionError> {
        let response = self
            .client
            .put(&self.endpoint)
            .header(ACCEPT, "text/plain")
            .header(CONTENT_TYPE, mime_type)
            .body(bytes.to_vec())
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(ExtractionError::UnexpectedStatus { status, body });
        }

        let text = response.text().await?;
        Ok(text.trim().to_string())
    }
}
