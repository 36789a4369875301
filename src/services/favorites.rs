use super::ServiceError;
use crate::db::Repository;
use crate::models::{FavoriteTarget, Favorites};
use std::sync::Arc;
use uuid::Uuid;

#[derive(Clone)]
pub struct FavoriteService {
    repo: Arc<dyn Repository>,
}

impl FavoriteService {
    pub fn new(repo: Arc<dyn Repository>) -> Self {
        Self { repo }
    }

    /// Flip the target's membership in the user's favorites and return the new state.
    ///
    /// Check-then-act without a lock: two concurrent toggles may cancel each other out.
    pub async fn toggle(&self, user_id: Uuid, target: FavoriteTarget) -> Result<bool, ServiceError> {
        let exists = match target {
            FavoriteTarget::Subject(id) => self.repo.get_subject(id).await?.is_some(),
            FavoriteTarget::Document(id) => self.repo.get_document(id).await?.is_some(),
        };
        if !exists {
            return Err(ServiceError::NotFound(match target {
                FavoriteTarget::Subject(_) => "Subject",
                FavoriteTarget::Document(_) => "Document",
            }));
        }

        if self.repo.is_favorite(user_id, target).await? {
            self.repo.remove_favorite(user_id, target).await?;
            Ok(false)
        } else {
            self.repo.add_favorite(user_id, target).await?;
            Ok(true)
        }
    }

    pub async fn list(&self, user_id: Uuid) -> Result<Favorites, ServiceError> {
        Ok(Favorites {
            subjects: self.repo.favorite_subjects(user_id).await?,
            documents: self.repo.favorite_documents(user_id).await?,
        })
    }
}
