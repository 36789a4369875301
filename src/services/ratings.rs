use super::ServiceError;
use crate::db::Repository;
use crate::models::{RatingSummary, TeacherRating};
use std::sync::Arc;
use uuid::Uuid;

/// Result of an upsert: the stored rating and whether it was newly created.
#[derive(Debug, Clone)]
pub struct RatingOutcome {
    pub rating: TeacherRating,
    pub created: bool,
}

#[derive(Clone)]
pub struct RatingService {
    repo: Arc<dyn Repository>,
}

impl RatingService {
    pub fn new(repo: Arc<dyn Repository>) -> Self {
        Self { repo }
    }

    /// Create or replace the user's rating of a teacher.
    pub async fn rate(&self, teacher_id: Uuid, user_id: Uuid, rating: i32) -> Result<RatingOutcome, ServiceError> {
        if !(1..=5).contains(&rating) {
            return Err(ServiceError::Validation("rating must be between 1 and 5".into()));
        }
        self.require_teacher(teacher_id).await?;

        match self.repo.get_rating(teacher_id, user_id).await? {
            Some(existing) => Ok(RatingOutcome {
                rating: self.repo.update_rating(existing.id, rating).await?,
                created: false,
            }),
            None => Ok(RatingOutcome {
                rating: self.repo.insert_rating(teacher_id, user_id, rating).await?,
                created: true,
            }),
        }
    }

    pub async fn remove(&self, teacher_id: Uuid, user_id: Uuid) -> Result<(), ServiceError> {
        if !self.repo.delete_rating(teacher_id, user_id).await? {
            return Err(ServiceError::NotFound("Rating"));
        }
        Ok(())
    }

    /// Aggregate of a teacher's ratings together with the caller's own.
    pub async fn summary(&self, teacher_id: Uuid, user_id: Uuid) -> Result<RatingSummary, ServiceError> {
        self.require_teacher(teacher_id).await?;
        let stats = self.repo.rating_stats(teacher_id).await?;
        let own = self.repo.get_rating(teacher_id, user_id).await?;
        Ok(RatingSummary::new(stats, own.map(|r| r.rating)))
    }

    async fn require_teacher(&self, teacher_id: Uuid) -> Result<(), ServiceError> {
        if self.repo.teacher_exists(teacher_id).await? {
            Ok(())
        } else {
            Err(ServiceError::NotFound("Teacher"))
        }
    }
}
