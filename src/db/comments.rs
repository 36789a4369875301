use super::questions::author_from_row;
use super::{PgRepository, RepositoryError};
use crate::models::{Comment, NewComment};
use async_trait::async_trait;
use sqlx::Row;
use sqlx::postgres::PgRow;
use uuid::Uuid;

const COMMENT_SELECT: &str = "SELECT c.id, c.subject_id, c.user_id, c.content, c.is_anonymous, \
     c.created_at, c.updated_at, u.display_name AS author_display_name, u.email AS author_email \
     FROM comments c LEFT JOIN users u ON u.id = c.user_id";

/// Persistence for subject comments.
#[async_trait]
pub trait CommentRepository: Send + Sync {
    /// Comments of a subject, newest first.
    async fn list_comments(&self, subject_id: Uuid) -> Result<Vec<Comment>, RepositoryError>;

    /// Fetch one comment.
    async fn get_comment(&self, id: Uuid) -> Result<Option<Comment>, RepositoryError>;

    /// Insert a new comment.
    async fn insert_comment(&self, comment: NewComment) -> Result<Comment, RepositoryError>;

    /// Delete a comment. Returns whether a row was removed.
    async fn delete_comment(&self, id: Uuid) -> Result<bool, RepositoryError>;
}

fn comment_from_row(row: &PgRow) -> Result<Comment, RepositoryError> {
    Ok(Comment {
        id: row.try_get("id")?,
        subject_id: row.try_get("subject_id")?,
        user_id: row.try_get("user_id")?,
        content: row.try_get("content")?,
        is_anonymous: row.try_get("is_anonymous")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
        user: author_from_row(row)?,
    })
}

#[async_trait]
impl CommentRepository for PgRepository {
    async fn list_comments(&self, subject_id: Uuid) -> Result<Vec<Comment>, RepositoryError> {
        let rows = sqlx::query(&format!(
            "{COMMENT_SELECT} WHERE c.subject_id = $1 ORDER BY c.created_at DESC"
        ))
        .bind(subject_id)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(comment_from_row).collect()
    }

    async fn get_comment(&self, id: Uuid) -> Result<Option<Comment>, RepositoryError> {
        let row = sqlx::query(&format!("{COMMENT_SELECT} WHERE c.id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(comment_from_row).transpose()
    }

    async fn insert_comment(&self, comment: NewComment) -> Result<Comment, RepositoryError> {
        let id = Uuid::new_v4();
        sqlx::query(
            "INSERT INTO comments (id, subject_id, user_id, content, is_anonymous) \
             VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(id)
        .bind(comment.subject_id)
        .bind(comment.user_id)
        .bind(&comment.content)
        .bind(comment.is_anonymous)
        .execute(&self.pool)
        .await?;

        let row = sqlx::query(&format!("{COMMENT_SELECT} WHERE c.id = $1"))
            .bind(id)
            .fetch_one(&self.pool)
            .await?;
        comment_from_row(&row)
    }

    async fn delete_comment(&self, id: Uuid) -> Result<bool, RepositoryError> {
        let result = sqlx::query("DELETE FROM comments WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
