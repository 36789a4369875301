//! Full-text search integration.

pub mod client;
pub mod types;

use crate::models::{Document, Subject};
use async_trait::async_trait;
use uuid::Uuid;

pub use client::MeiliSearchClient;
pub use types::{SearchError, SearchResults};

/// Schema-less full-text index over documents and subjects.
#[async_trait]
pub trait SearchIndex: Send + Sync {
    /// Upsert a document record.
    async fn index_document(&self, document: &Document) -> Result<(), SearchError>;

    /// Remove a document record.
    async fn delete_document(&self, id: Uuid) -> Result<(), SearchError>;

    /// Search documents, optionally restricted to one subject.
    async fn search_documents(
        &self,
        query: &str,
        subject_id: Option<Uuid>,
    ) -> Result<SearchResults, SearchError>;

    /// Upsert a subject record.
    async fn index_subject(&self, subject: &Subject) -> Result<(), SearchError>;

    /// Remove a subject record.
    async fn delete_subject(&self, id: Uuid) -> Result<(), SearchError>;

    /// Search subjects, optionally restricted to one semester.
    async fn search_subjects(
        &self,
        query: &str,
        semester_id: Option<Uuid>,
    ) -> Result<SearchResults, SearchError>;
}
