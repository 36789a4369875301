//! Coordinators sitting between the HTTP surface and the external collaborators.
//!
//! Every coordinator receives its collaborators as explicit handles at construction;
//! nothing here reaches for process-wide state.

pub mod activity;
pub mod categories;
pub mod documents;
pub mod favorites;
pub mod qa;
pub mod ratings;
pub mod subjects;

use crate::db::RepositoryError;
use crate::metrics::PortalMetrics;
use crate::models::Role;
use crate::search::SearchError;
use crate::storage::ObjectStoreError;
use std::fmt::Display;
use std::future::Future;
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

pub use activity::ActivityRecorder;
pub use categories::{CategoryPolicy, NewCategoryRequest, ReorderItem};
pub use documents::{DocumentService, UploadRequest};
pub use favorites::FavoriteService;
pub use qa::{Attachment, QaService};
pub use ratings::{RatingOutcome, RatingService};
pub use subjects::SubjectService;

/// Errors surfaced by coordinators.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Request failed a field constraint.
    #[error("{0}")]
    Validation(String),
    /// Upload MIME type is not on the allow-list.
    #[error("Unsupported file type")]
    UnsupportedMediaType,
    /// Upload exceeds the size cap.
    #[error("File exceeds 50MB limit")]
    PayloadTooLarge,
    /// Request referenced another entity that does not exist.
    #[error("{message}")]
    InvalidReference {
        /// Machine-readable error code.
        code: &'static str,
        /// Human-readable explanation.
        message: String,
    },
    /// Target entity does not exist.
    #[error("{0} not found")]
    NotFound(&'static str),
    /// Caller may not perform the action.
    #[error("{0}")]
    Forbidden(String),
    /// Action clashes with existing state.
    #[error("{0}")]
    Conflict(String),
    /// Object store failure.
    #[error("Storage failure: {0}")]
    Storage(#[from] ObjectStoreError),
    /// Relational store failure.
    #[error("Database failure: {0}")]
    Repository(#[from] RepositoryError),
    /// Search engine failure.
    #[error("Search failure: {0}")]
    Search(#[from] SearchError),
}

/// Authenticated caller on whose behalf a coordinator acts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Actor {
    /// User identifier.
    pub id: Uuid,
    /// Role granted by the auth gateway.
    pub role: Role,
}

impl Actor {
    /// Whether the caller holds the admin role.
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    /// Whether the caller owns `owner_id` or is an admin.
    pub fn may_modify(&self, owner_id: Uuid) -> bool {
        self.id == owner_id || self.is_admin()
    }
}

/// Run `fut` on the runtime without awaiting it. Failures are logged and counted, never returned.
pub(crate) fn spawn_detached<F, E>(task: &'static str, metrics: Arc<PortalMetrics>, fut: F)
where
    F: Future<Output = Result<(), E>> + Send + 'static,
    E: Display + Send + 'static,
{
    tokio::spawn(async move {
        if let Err(err) = fut.await {
            metrics.record_background_failure();
            tracing::warn!(task, error = %err, "Background task failed");
        }
    });
}

pub(crate) fn require_text(value: &str, field: &str, max_len: usize) -> Result<String, ServiceError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ServiceError::Validation(format!("{field} is required")));
    }
    if trimmed.chars().count() > max_len {
        return Err(ServiceError::Validation(format!(
            "{field} must be at most {max_len} characters"
        )));
    }
    Ok(trimmed.to_string())
}
