//! Shared types used by the search client and its callers.

use crate::models::{Document, Subject};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use thiserror::Error;
use uuid::Uuid;

/// Index holding uploaded documents.
pub const DOCUMENTS_INDEX: &str = "documents";
/// Index holding subjects.
pub const SUBJECTS_INDEX: &str = "subjects";
/// Maximum hits returned by a document search.
pub const DOCUMENT_SEARCH_LIMIT: usize = 20;
/// Maximum hits returned by a subject search.
pub const SUBJECT_SEARCH_LIMIT: usize = 100;

/// Errors returned while interacting with the search engine.
#[derive(Debug, Error)]
pub enum SearchError {
    /// Base URL failed to parse or normalize.
    #[error("Invalid search URL: {0}")]
    InvalidUrl(String),
    /// HTTP layer failed before receiving a response.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    /// Search engine responded with an unexpected status code.
    #[error("Unexpected search response ({status}): {body}")]
    UnexpectedStatus {
        /// HTTP status returned by the search engine.
        status: StatusCode,
        /// Body payload associated with the failing response.
        body: String,
    },
}

/// Search response relayed to API clients.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResults {
    /// Matching records as stored in the index.
    #[serde(default)]
    pub hits: Vec<Value>,
    /// Query string echoed by the engine.
    #[serde(default)]
    pub query: String,
    /// Engine's estimate of the total match count.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimated_total_hits: Option<u64>,
    /// Time spent by the engine.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub processing_time_ms: Option<u64>,
}

/// Searchable projection of a document.
pub fn document_record(document: &Document) -> Value {
    json!({
        "id": document.id,
        "subject_id": document.subject_id,
        "uploaded_by": document.uploaded_by,
        "type": document.doc_type,
        "category_id": document.category_id,
        "original_name": document.original_name,
        "mime_type": document.mime_type,
        "file_size": document.file_size,
        "content_text": document.content_text,
        "created_at": rfc3339(document.created_at),
    })
}

/// Searchable projection of a subject.
pub fn subject_record(subject: &Subject) -> Value {
    json!({
        "id": subject.id,
        "semester_id": subject.semester_id,
        "name_cs": subject.name_cs,
        "name_en": subject.name_en,
        "code": subject.code,
        "description_cs": subject.description_cs,
        "description_en": subject.description_en,
        "credits": subject.credits,
        "created_at": rfc3339(subject.created_at),
    })
}

/// Equality filter on a UUID attribute.
pub fn eq_filter(attribute: &str, id: Uuid) -> String {
    format!("{attribute} = \"{id}\"")
}

fn rfc3339(value: time::OffsetDateTime) -> String {
    value
        .format(&time::format_description::well_known::Rfc3339)
        .unwrap_or_default()
}
