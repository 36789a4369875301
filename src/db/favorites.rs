use super::documents::{DOCUMENT_COLUMNS, document_from_row};
use super::subjects::{SUBJECT_COLUMNS, subject_from_row};
use super::{PgRepository, RepositoryError};
use crate::models::{Document, FavoriteTarget, Subject};
use async_trait::async_trait;
use uuid::Uuid;

/// Persistence for the user-favorite join tables.
#[async_trait]
pub trait FavoriteRepository: Send + Sync {
    /// Whether the target is in the user's favorites.
    async fn is_favorite(&self, user_id: Uuid, target: FavoriteTarget) -> Result<bool, RepositoryError>;

    /// Add the target to the user's favorites.
    async fn add_favorite(&self, user_id: Uuid, target: FavoriteTarget) -> Result<(), RepositoryError>;

    /// Remove the target from the user's favorites.
    async fn remove_favorite(&self, user_id: Uuid, target: FavoriteTarget) -> Result<(), RepositoryError>;

    /// The user's favorite subjects.
    async fn favorite_subjects(&self, user_id: Uuid) -> Result<Vec<Subject>, RepositoryError>;

    /// The user's favorite documents.
    async fn favorite_documents(&self, user_id: Uuid) -> Result<Vec<Document>, RepositoryError>;
}

fn join_table(target: FavoriteTarget) -> (&'static str, &'static str, Uuid) {
    match target {
        FavoriteTarget::Subject(id) => ("user_favorite_subjects", "subject_id", id),
        FavoriteTarget::Document(id) => ("user_favorite_documents", "document_id", id),
    }
}

#[async_trait]
impl FavoriteRepository for PgRepository {
    async fn is_favorite(&self, user_id: Uuid, target: FavoriteTarget) -> Result<bool, RepositoryError> {
        let (table, column, id) = join_table(target);
        let count: i64 = sqlx::query_scalar(&format!(
            "SELECT COUNT(*) FROM {table} WHERE user_id = $1 AND {column} = $2"
        ))
        .bind(user_id)
        .bind(id)
        .fetch_one(&self.pool)
        .await?;
        Ok(count > 0)
    }

    async fn add_favorite(&self, user_id: Uuid, target: FavoriteTarget) -> Result<(), RepositoryError> {
        let (table, column, id) = join_table(target);
        sqlx::query(&format!("INSERT INTO {table} (user_id, {column}) VALUES ($1, $2)"))
            .bind(user_id)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn remove_favorite(&self, user_id: Uuid, target: FavoriteTarget) -> Result<(), RepositoryError> {
        let (table, column, id) = join_table(target);
        sqlx::query(&format!("DELETE FROM {table} WHERE user_id = $1 AND {column} = $2"))
            .bind(user_id)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn favorite_subjects(&self, user_id: Uuid) -> Result<Vec<Subject>, RepositoryError> {
        let rows = sqlx::query(&format!(
            "SELECT {SUBJECT_COLUMNS}, true AS is_favorite FROM subjects \
             JOIN user_favorite_subjects ufs ON subjects.id = ufs.subject_id AND ufs.user_id = $1 \
             ORDER BY subjects.name_cs ASC"
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(subject_from_row).collect()
    }

    async fn favorite_documents(&self, user_id: Uuid) -> Result<Vec<Document>, RepositoryError> {
        let rows = sqlx::query(&format!(
            "SELECT {DOCUMENT_COLUMNS}, true AS is_favorite FROM documents \
             JOIN user_favorite_documents ufd ON documents.id = ufd.document_id AND ufd.user_id = $1 \
             ORDER BY documents.created_at DESC"
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(document_from_row).collect()
    }
}
