//! Category policy: every (subject, type) pair owns exactly one protected "Unassigned" bucket,
//! pinned to the last position, that can be neither renamed, reordered, nor deleted.

use super::{ServiceError, require_text};
use crate::db::Repository;
use crate::models::{
    CategoryChanges, DocumentCategory, DocumentType, NewCategory, SENTINEL_ORDER_INDEX,
    is_sentinel_name,
};
use serde::Deserialize;
use std::sync::Arc;
use uuid::Uuid;

const MAX_NAME_LEN: usize = 200;

/// Body of a category creation request.
#[derive(Debug, Clone, Deserialize)]
pub struct NewCategoryRequest {
    #[serde(rename = "type")]
    pub doc_type: DocumentType,
    pub name_cs: String,
    #[serde(default)]
    pub name_en: String,
}

/// One entry of a bulk reorder.
#[derive(Debug, Clone, Deserialize)]
pub struct ReorderItem {
    pub id: Uuid,
    pub order_index: i32,
}

#[derive(Clone)]
pub struct CategoryPolicy {
    repo: Arc<dyn Repository>,
}

impl CategoryPolicy {
    pub fn new(repo: Arc<dyn Repository>) -> Self {
        Self { repo }
    }

    /// Return the pair's protected bucket, creating it or repairing a legacy row as needed.
    pub async fn ensure_sentinel(
        &self,
        subject_id: Uuid,
        doc_type: DocumentType,
        created_by: Uuid,
    ) -> Result<DocumentCategory, ServiceError> {
        match self.repo.find_sentinel(subject_id, doc_type).await? {
            Some(mut category) => {
                if !category.is_protected || category.order_index != SENTINEL_ORDER_INDEX {
                    match self.repo.pin_sentinel(category.id).await {
                        Ok(()) => {}
                        // another row of the pair was protected in the meantime
                        Err(err) if err.is_unique_violation() => {
                            return self.reload_sentinel(subject_id, doc_type).await;
                        }
                        Err(err) => return Err(err.into()),
                    }
                    category.is_protected = true;
                    category.order_index = SENTINEL_ORDER_INDEX;
                }
                Ok(category)
            }
            None => {
                let inserted = self
                    .repo
                    .insert_sentinel(NewCategory::sentinel(subject_id, doc_type, created_by))
                    .await?;
                match inserted {
                    Some(category) => {
                        tracing::debug!(%subject_id, %doc_type, "Created unassigned category");
                        Ok(category)
                    }
                    None => self.reload_sentinel(subject_id, doc_type).await,
                }
            }
        }
    }

    async fn reload_sentinel(
        &self,
        subject_id: Uuid,
        doc_type: DocumentType,
    ) -> Result<DocumentCategory, ServiceError> {
        tracing::debug!(%subject_id, %doc_type, "Unassigned category created concurrently");
        self.repo
            .find_sentinel(subject_id, doc_type)
            .await?
            .ok_or(ServiceError::NotFound("Category"))
    }

    /// Ensure every pair of the subject has its protected bucket.
    pub async fn ensure_subject_sentinels(&self, subject_id: Uuid, created_by: Uuid) -> Result<(), ServiceError> {
        for doc_type in DocumentType::ALL {
            self.ensure_sentinel(subject_id, doc_type, created_by).await?;
        }
        Ok(())
    }

    /// Startup pass giving every existing subject its protected buckets.
    pub async fn seed_sentinels(&self) -> Result<usize, ServiceError> {
        let subject_ids = self.repo.list_subject_ids().await?;
        for subject_id in &subject_ids {
            self.ensure_subject_sentinels(*subject_id, Uuid::nil()).await?;
        }
        tracing::info!(subjects = subject_ids.len(), "Unassigned categories verified");
        Ok(subject_ids.len())
    }

    /// Categories of a subject in display order, optionally of one type.
    pub async fn list(
        &self,
        subject_id: Uuid,
        doc_type: Option<DocumentType>,
    ) -> Result<Vec<DocumentCategory>, ServiceError> {
        self.repo
            .get_subject(subject_id)
            .await?
            .ok_or(ServiceError::NotFound("Subject"))?;
        Ok(self.repo.list_categories(subject_id, doc_type).await?)
    }

    pub async fn get(&self, id: Uuid) -> Result<DocumentCategory, ServiceError> {
        self.repo
            .get_category(id)
            .await?
            .ok_or(ServiceError::NotFound("Category"))
    }

    /// Create a category at the end of the pair's non-protected categories.
    pub async fn create(
        &self,
        subject_id: Uuid,
        request: NewCategoryRequest,
        created_by: Uuid,
    ) -> Result<DocumentCategory, ServiceError> {
        let name_cs = require_text(&request.name_cs, "name_cs", MAX_NAME_LEN)?;
        let name_en = request.name_en.trim().to_string();
        if name_en.chars().count() > MAX_NAME_LEN {
            return Err(ServiceError::Validation(format!(
                "name_en must be at most {MAX_NAME_LEN} characters"
            )));
        }
        self.repo
            .get_subject(subject_id)
            .await?
            .ok_or(ServiceError::NotFound("Subject"))?;

        if is_sentinel_name(&name_cs) || is_sentinel_name(&name_en) {
            return Err(ServiceError::Conflict(
                "The 'Unassigned' category already exists".into(),
            ));
        }
        self.ensure_sentinel(subject_id, request.doc_type, created_by).await?;

        let name_en_filter = (!name_en.is_empty()).then_some(name_en.as_str());
        if self
            .repo
            .category_name_taken(subject_id, request.doc_type, &name_cs, name_en_filter)
            .await?
        {
            return Err(ServiceError::Conflict(
                "A category with this name already exists for this subject and type".into(),
            ));
        }

        let order_index = self
            .repo
            .max_order_index(subject_id, request.doc_type)
            .await?
            .map_or(0, |max| max + 1);
        Ok(self
            .repo
            .insert_category(NewCategory {
                subject_id,
                doc_type: request.doc_type,
                name_cs,
                name_en,
                order_index,
                is_protected: false,
                created_by,
            })
            .await?)
    }

    /// Apply a partial update, refusing to touch the protected bucket's identity or position.
    pub async fn update(&self, id: Uuid, mut changes: CategoryChanges) -> Result<DocumentCategory, ServiceError> {
        let category = self.get(id).await?;

        if category.is_sentinel() {
            if changes.renames() {
                return Err(ServiceError::Forbidden(
                    "The 'Unassigned' category cannot be renamed".into(),
                ));
            }
            if changes
                .order_index
                .is_some_and(|order| order != SENTINEL_ORDER_INDEX)
            {
                return Err(ServiceError::Forbidden(
                    "The 'Unassigned' category must stay last".into(),
                ));
            }
        }

        if let Some(name_cs) = &changes.name_cs {
            changes.name_cs = Some(require_text(name_cs, "name_cs", MAX_NAME_LEN)?);
        }
        if let Some(name_en) = &changes.name_en {
            changes.name_en = Some(name_en.trim().to_string());
        }
        let reserved = changes.name_cs.as_deref().is_some_and(is_sentinel_name)
            || changes.name_en.as_deref().is_some_and(is_sentinel_name);
        if reserved {
            return Err(ServiceError::Forbidden(
                "The 'Unassigned' name is reserved".into(),
            ));
        }

        if changes.is_empty() {
            return Ok(category);
        }
        self.repo
            .update_category(id, &changes)
            .await?
            .ok_or(ServiceError::NotFound("Category"))
    }

    /// Delete a category after moving its documents into the pair's protected bucket.
    ///
    /// Returns the number of moved documents.
    pub async fn delete(&self, id: Uuid) -> Result<u64, ServiceError> {
        let category = self.get(id).await?;
        if category.is_sentinel() {
            return Err(ServiceError::Forbidden(
                "The 'Unassigned' category cannot be deleted".into(),
            ));
        }

        let sentinel = self
            .ensure_sentinel(category.subject_id, category.doc_type, Uuid::nil())
            .await?;
        let moved = self.repo.reassign_documents(category.id, sentinel.id).await?;
        if !self.repo.delete_category(category.id).await? {
            return Err(ServiceError::NotFound("Category"));
        }
        tracing::info!(category_id = %id, moved, "Deleted category");
        Ok(moved)
    }

    /// Apply order indices one by one, stopping at the first failure.
    pub async fn reorder(&self, items: &[ReorderItem]) -> Result<usize, ServiceError> {
        if items.is_empty() {
            return Err(ServiceError::Validation("categories must not be empty".into()));
        }
        for item in items {
            let category = self.get(item.id).await?;
            if category.is_sentinel() && item.order_index != SENTINEL_ORDER_INDEX {
                return Err(ServiceError::Forbidden(
                    "The 'Unassigned' category must stay last".into(),
                ));
            }
            if !self.repo.set_category_order(item.id, item.order_index).await? {
                return Err(ServiceError::NotFound("Category"));
            }
        }
        Ok(items.len())
    }
}
