//! Document ingestion and removal.
//!
//! Ingestion writes the blob before the row and deletes the blob again when the row cannot be
//! written, so a successful upload never leaves bytes unreachable from a client. Removal favours
//! availability: a failing blob delete is logged and the row is removed anyway.

use super::{ActivityRecorder, Actor, CategoryPolicy, ServiceError, spawn_detached};
use crate::db::Repository;
use crate::extraction::{MAX_UPLOAD_BYTES, TextExtractor, is_allowed, is_extractable};
use crate::metrics::PortalMetrics;
use crate::models::{ActivityType, Document, DocumentCategory, DocumentType, NewActivity, NewDocument};
use crate::search::{SearchIndex, SearchResults};
use crate::storage::{Blob, ObjectStore, ObjectStoreError, generate_storage_key};
use serde_json::json;
use std::sync::Arc;
use uuid::Uuid;

/// Page size when the caller does not ask for one.
pub const DEFAULT_PAGE_SIZE: i64 = 20;
/// Largest page a caller may request.
pub const MAX_PAGE_SIZE: i64 = 100;

/// A file to ingest.
#[derive(Debug, Clone)]
pub struct UploadRequest {
    pub subject_id: Uuid,
    pub uploader: Uuid,
    pub original_name: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
    pub doc_type: DocumentType,
    pub category_id: Option<Uuid>,
}

#[derive(Clone)]
pub struct DocumentService {
    repo: Arc<dyn Repository>,
    store: Arc<dyn ObjectStore>,
    search: Arc<dyn SearchIndex>,
    extractor: Arc<dyn TextExtractor>,
    categories: CategoryPolicy,
    activity: ActivityRecorder,
    metrics: Arc<PortalMetrics>,
}

impl DocumentService {
    pub fn new(
        repo: Arc<dyn Repository>,
        store: Arc<dyn ObjectStore>,
        search: Arc<dyn SearchIndex>,
        extractor: Arc<dyn TextExtractor>,
        metrics: Arc<PortalMetrics>,
    ) -> Self {
        Self {
            categories: CategoryPolicy::new(repo.clone()),
            activity: ActivityRecorder::new(repo.clone(), metrics.clone()),
            repo,
            store,
            search,
            extractor,
            metrics,
        }
    }

    /// Store the bytes, describe them in the relational store, and index them in the background.
    pub async fn upload(&self, request: UploadRequest) -> Result<Document, ServiceError> {
        if request.bytes.len() > MAX_UPLOAD_BYTES {
            return Err(ServiceError::PayloadTooLarge);
        }
        if !is_allowed(&request.mime_type) {
            return Err(ServiceError::UnsupportedMediaType);
        }
        self.repo
            .get_subject(request.subject_id)
            .await?
            .ok_or(ServiceError::NotFound("Subject"))?;
        let category = self.resolve_category(&request).await?;

        let storage_key = generate_storage_key(&request.original_name);
        if let Err(err) = self
            .store
            .put(&storage_key, &request.bytes, &request.mime_type)
            .await
        {
            tracing::error!(storage_key = %storage_key, error = %err, "Failed to store uploaded file");
            return Err(err.into());
        }

        let content_text = self.extract_text(&request).await;

        let new_document = NewDocument {
            id: Uuid::new_v4(),
            subject_id: request.subject_id,
            uploaded_by: request.uploader,
            doc_type: category.doc_type,
            category_id: Some(category.id),
            storage_key: storage_key.clone(),
            original_name: request.original_name,
            file_size: request.bytes.len() as i64,
            mime_type: request.mime_type,
            content_text,
        };
        let document = match self.repo.insert_document(new_document).await {
            Ok(document) => document,
            Err(err) => {
                self.compensate(&storage_key).await;
                return Err(err.into());
            }
        };
        self.metrics.record_upload();
        tracing::info!(
            document_id = %document.id,
            subject_id = %document.subject_id,
            size = document.file_size,
            "Document uploaded"
        );

        self.index_detached(document.clone());
        self.activity.record_detached(NewActivity {
            user_id: document.uploaded_by,
            activity_type: ActivityType::DocumentUploaded,
            subject_id: Some(document.subject_id),
            document_id: Some(document.id),
            metadata: json!({ "original_name": document.original_name }),
        });
        Ok(document)
    }

    /// Remove a document's row, blob, and index entry. Only the uploader or an admin may do so.
    pub async fn remove(&self, id: Uuid, actor: Actor) -> Result<(), ServiceError> {
        let document = self.get(id).await?;
        if !actor.may_modify(document.uploaded_by) {
            return Err(ServiceError::Forbidden(
                "Only the uploader or an admin can delete this document".into(),
            ));
        }

        if let Err(err) = self.store.delete(&document.storage_key).await {
            self.metrics.record_orphaned_blob();
            tracing::warn!(
                document_id = %document.id,
                storage_key = %document.storage_key,
                error = %err,
                "Failed to delete blob; continuing with row removal"
            );
        }

        let search = self.search.clone();
        spawn_detached("unindex_document", self.metrics.clone(), async move {
            search.delete_document(id).await
        });
        self.activity.record_detached(NewActivity {
            user_id: actor.id,
            activity_type: ActivityType::DocumentDeleted,
            subject_id: Some(document.subject_id),
            document_id: Some(document.id),
            metadata: json!({ "original_name": document.original_name }),
        });

        if !self.repo.delete_document(id).await? {
            tracing::debug!(document_id = %id, "Document row already gone");
        }
        self.metrics.record_delete();
        tracing::info!(document_id = %id, actor = %actor.id, "Document deleted");
        Ok(())
    }

    pub async fn get(&self, id: Uuid) -> Result<Document, ServiceError> {
        self.repo
            .get_document(id)
            .await?
            .ok_or(ServiceError::NotFound("Document"))
    }

    /// The document together with its bytes.
    pub async fn download(&self, id: Uuid) -> Result<(Document, Blob), ServiceError> {
        let document = self.get(id).await?;
        match self.store.get(&document.storage_key).await {
            Ok(blob) => Ok((document, blob)),
            Err(ObjectStoreError::NotFound(_)) => Err(ServiceError::NotFound("File")),
            Err(err) => Err(err.into()),
        }
    }

    /// One page of a subject's documents, the caller's favorites first.
    pub async fn list(
        &self,
        subject_id: Uuid,
        user_id: Uuid,
        limit: Option<i64>,
        offset: Option<i64>,
    ) -> Result<Vec<Document>, ServiceError> {
        self.repo
            .get_subject(subject_id)
            .await?
            .ok_or(ServiceError::NotFound("Subject"))?;
        let limit = limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE);
        let offset = offset.unwrap_or(0).max(0);
        Ok(self
            .repo
            .list_documents(subject_id, user_id, limit, offset)
            .await?)
    }

    /// Move a document into another category of its subject; its type follows the category.
    pub async fn reassign_category(
        &self,
        id: Uuid,
        category_id: Uuid,
        actor: Actor,
    ) -> Result<Document, ServiceError> {
        let document = self.get(id).await?;
        if !actor.may_modify(document.uploaded_by) {
            return Err(ServiceError::Forbidden(
                "Only the uploader or an admin can move this document".into(),
            ));
        }
        let category = self.categories.get(category_id).await?;
        if category.subject_id != document.subject_id {
            return Err(ServiceError::Validation(
                "Category belongs to a different subject".into(),
            ));
        }

        self.repo
            .set_document_category(id, category.id, category.doc_type)
            .await?;
        let document = self.get(id).await?;
        self.index_detached(document.clone());
        Ok(document)
    }

    /// Full-text search over documents.
    pub async fn search(&self, query: &str, subject_id: Option<Uuid>) -> Result<SearchResults, ServiceError> {
        Ok(self.search.search_documents(query, subject_id).await?)
    }

    /// Back-fill the answer an attachment belongs to.
    pub(crate) async fn attach_to_answer(&self, id: Uuid, answer_id: Uuid) -> Result<(), ServiceError> {
        Ok(self.repo.set_document_answer(id, answer_id).await?)
    }

    async fn resolve_category(&self, request: &UploadRequest) -> Result<DocumentCategory, ServiceError> {
        let Some(category_id) = request.category_id else {
            return self
                .categories
                .ensure_sentinel(request.subject_id, request.doc_type, request.uploader)
                .await;
        };
        let category = self
            .repo
            .get_category(category_id)
            .await?
            .ok_or_else(|| ServiceError::Validation("Unknown category".into()))?;
        if category.subject_id != request.subject_id || category.doc_type != request.doc_type {
            return Err(ServiceError::Validation(
                "Category does not belong to this subject and type".into(),
            ));
        }
        Ok(category)
    }

    async fn extract_text(&self, request: &UploadRequest) -> String {
        if !is_extractable(&request.mime_type) {
            return String::new();
        }
        match self.extractor.extract(&request.bytes, &request.mime_type).await {
            Ok(text) => text,
            Err(err) => {
                tracing::warn!(
                    original_name = %request.original_name,
                    error = %err,
                    "Text extraction failed; storing document without text"
                );
                String::new()
            }
        }
    }

    async fn compensate(&self, storage_key: &str) {
        match self.store.delete(storage_key).await {
            Ok(()) => {
                self.metrics.record_compensation();
                tracing::warn!(storage_key, "Removed blob after failed document insert");
            }
            Err(err) => {
                self.metrics.record_orphaned_blob();
                tracing::error!(storage_key, error = %err, "Failed to remove blob after failed document insert");
            }
        }
    }

    fn index_detached(&self, document: Document) {
        let search = self.search.clone();
        spawn_detached("index_document", self.metrics.clone(), async move {
            search.index_document(&document).await
        });
    }
}
