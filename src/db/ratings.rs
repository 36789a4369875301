use super::{PgRepository, RepositoryError};
use crate::models::{RatingStats, TeacherRating};
use async_trait::async_trait;
use sqlx::Row;
use sqlx::postgres::PgRow;
use uuid::Uuid;

const RATING_COLUMNS: &str = "id, subject_teacher_id, user_id, rating, created_at, updated_at";

/// Persistence for teacher ratings.
#[async_trait]
pub trait RatingRepository: Send + Sync {
    /// The user's rating of a teacher, if any.
    async fn get_rating(&self, teacher_id: Uuid, user_id: Uuid) -> Result<Option<TeacherRating>, RepositoryError>;

    /// Insert a new rating.
    async fn insert_rating(
        &self,
        teacher_id: Uuid,
        user_id: Uuid,
        rating: i32,
    ) -> Result<TeacherRating, RepositoryError>;

    /// Change the value of an existing rating.
    async fn update_rating(&self, id: Uuid, rating: i32) -> Result<TeacherRating, RepositoryError>;

    /// Remove the user's rating of a teacher. Returns whether a row was removed.
    async fn delete_rating(&self, teacher_id: Uuid, user_id: Uuid) -> Result<bool, RepositoryError>;

    /// Average, count, and per-value distribution of a teacher's ratings.
    async fn rating_stats(&self, teacher_id: Uuid) -> Result<RatingStats, RepositoryError>;
}

fn rating_from_row(row: &PgRow) -> Result<TeacherRating, RepositoryError> {
    Ok(TeacherRating {
        id: row.try_get("id")?,
        subject_teacher_id: row.try_get("subject_teacher_id")?,
        user_id: row.try_get("user_id")?,
        rating: row.try_get("rating")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

#[async_trait]
impl RatingRepository for PgRepository {
    async fn get_rating(&self, teacher_id: Uuid, user_id: Uuid) -> Result<Option<TeacherRating>, RepositoryError> {
        let row = sqlx::query(&format!(
            "SELECT {RATING_COLUMNS} FROM teacher_ratings \
             WHERE subject_teacher_id = $1 AND user_id = $2 \
             ORDER BY created_at ASC LIMIT 1"
        ))
        .bind(teacher_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(rating_from_row).transpose()
    }

    async fn insert_rating(
        &self,
        teacher_id: Uuid,
        user_id: Uuid,
        rating: i32,
    ) -> Result<TeacherRating, RepositoryError> {
        let row = sqlx::query(&format!(
            "INSERT INTO teacher_ratings (id, subject_teacher_id, user_id, rating) \
             VALUES ($1, $2, $3, $4) RETURNING {RATING_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(teacher_id)
        .bind(user_id)
        .bind(rating)
        .fetch_one(&self.pool)
        .await?;
        rating_from_row(&row)
    }

    async fn update_rating(&self, id: Uuid, rating: i32) -> Result<TeacherRating, RepositoryError> {
        let row = sqlx::query(&format!(
            "UPDATE teacher_ratings SET rating = $2, updated_at = now() \
             WHERE id = $1 RETURNING {RATING_COLUMNS}"
        ))
        .bind(id)
        .bind(rating)
        .fetch_one(&self.pool)
        .await?;
        rating_from_row(&row)
    }

    async fn delete_rating(&self, teacher_id: Uuid, user_id: Uuid) -> Result<bool, RepositoryError> {
        let result = sqlx::query(
            "DELETE FROM teacher_ratings WHERE subject_teacher_id = $1 AND user_id = $2",
        )
        .bind(teacher_id)
        .bind(user_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn rating_stats(&self, teacher_id: Uuid) -> Result<RatingStats, RepositoryError> {
        let row = sqlx::query(
            "SELECT COALESCE(AVG(rating), 0)::float8 AS average, COUNT(*) AS total \
             FROM teacher_ratings WHERE subject_teacher_id = $1",
        )
        .bind(teacher_id)
        .fetch_one(&self.pool)
        .await?;

        let distribution = sqlx::query(
            "SELECT rating, COUNT(*) AS count FROM teacher_ratings \
             WHERE subject_teacher_id = $1 GROUP BY rating ORDER BY rating",
        )
        .bind(teacher_id)
        .fetch_all(&self.pool)
        .await?
        .iter()
        .map(|row| Ok((row.try_get("rating")?, row.try_get("count")?)))
        .collect::<Result<Vec<(i32, i64)>, sqlx::Error>>()?;

        Ok(RatingStats {
            average: row.try_get("average")?,
            total: row.try_get("total")?,
            distribution,
        })
    }
}
