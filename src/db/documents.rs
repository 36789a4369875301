use super::{PgRepository, RepositoryError};
use crate::models::{Document, DocumentType, NewDocument};
use async_trait::async_trait;
use sqlx::Row;
use sqlx::postgres::PgRow;
use uuid::Uuid;

pub(crate) const DOCUMENT_COLUMNS: &str = "id, subject_id, uploaded_by, answer_id, type, category_id, \
     storage_key, original_name, file_size, mime_type, content_text, created_at";

/// Persistence for document rows.
#[async_trait]
pub trait DocumentRepository: Send + Sync {
    /// Insert a new document row.
    async fn insert_document(&self, document: NewDocument) -> Result<Document, RepositoryError>;

    /// Fetch one document.
    async fn get_document(&self, id: Uuid) -> Result<Option<Document>, RepositoryError>;

    /// Page through a subject's documents, the caller's favorites first and then newest first.
    async fn list_documents(
        &self,
        subject_id: Uuid,
        user_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Document>, RepositoryError>;

    /// Delete a document row. Returns whether a row was removed.
    async fn delete_document(&self, id: Uuid) -> Result<bool, RepositoryError>;

    /// Back-fill the answer a document is attached to.
    async fn set_document_answer(&self, id: Uuid, answer_id: Uuid) -> Result<(), RepositoryError>;

    /// Move a document into a category, adopting the category's type.
    async fn set_document_category(
        &self,
        id: Uuid,
        category_id: Uuid,
        doc_type: DocumentType,
    ) -> Result<(), RepositoryError>;

    /// Point every document in `from` at `to`. Returns the number of moved documents.
    async fn reassign_documents(&self, from: Uuid, to: Uuid) -> Result<u64, RepositoryError>;
}

pub(crate) fn document_from_row(row: &PgRow) -> Result<Document, RepositoryError> {
    let doc_type: String = row.try_get("type")?;
    Ok(Document {
        id: row.try_get("id")?,
        subject_id: row.try_get("subject_id")?,
        uploaded_by: row.try_get("uploaded_by")?,
        answer_id: row.try_get("answer_id")?,
        doc_type: doc_type.parse()?,
        category_id: row.try_get("category_id")?,
        storage_key: row.try_get("storage_key")?,
        original_name: row.try_get("original_name")?,
        file_size: row.try_get("file_size")?,
        mime_type: row.try_get("mime_type")?,
        content_text: row.try_get("content_text")?,
        created_at: row.try_get("created_at")?,
        is_favorite: row.try_get::<Option<bool>, _>("is_favorite")?.unwrap_or(false),
    })
}

#[async_trait]
impl DocumentRepository for PgRepository {
    async fn insert_document(&self, document: NewDocument) -> Result<Document, RepositoryError> {
        let row = sqlx::query(&format!(
            "INSERT INTO documents (id, subject_id, uploaded_by, type, category_id, storage_key, \
             original_name, file_size, mime_type, content_text) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10) \
             RETURNING {DOCUMENT_COLUMNS}, NULL::boolean AS is_favorite"
        ))
        .bind(document.id)
        .bind(document.subject_id)
        .bind(document.uploaded_by)
        .bind(document.doc_type.as_str())
        .bind(document.category_id)
        .bind(&document.storage_key)
        .bind(&document.original_name)
        .bind(document.file_size)
        .bind(&document.mime_type)
        .bind(&document.content_text)
        .fetch_one(&self.pool)
        .await?;
        document_from_row(&row)
    }

    async fn get_document(&self, id: Uuid) -> Result<Option<Document>, RepositoryError> {
        let row = sqlx::query(&format!(
            "SELECT {DOCUMENT_COLUMNS}, NULL::boolean AS is_favorite FROM documents WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(document_from_row).transpose()
    }

    async fn list_documents(
        &self,
        subject_id: Uuid,
        user_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Document>, RepositoryError> {
        let rows = sqlx::query(&format!(
            "SELECT {DOCUMENT_COLUMNS}, (ufd.user_id IS NOT NULL) AS is_favorite \
             FROM documents \
             LEFT JOIN user_favorite_documents ufd \
                ON documents.id = ufd.document_id AND ufd.user_id = $2 \
             WHERE documents.subject_id = $1 \
             ORDER BY is_favorite DESC, documents.created_at DESC \
             LIMIT $3 OFFSET $4"
        ))
        .bind(subject_id)
        .bind(user_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(document_from_row).collect()
    }

    async fn delete_document(&self, id: Uuid) -> Result<bool, RepositoryError> {
        let result = sqlx::query("DELETE FROM documents WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn set_document_answer(&self, id: Uuid, answer_id: Uuid) -> Result<(), RepositoryError> {
        sqlx::query("UPDATE documents SET answer_id = $2 WHERE id = $1")
            .bind(id)
            .bind(answer_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn set_document_category(
        &self,
        id: Uuid,
        category_id: Uuid,
        doc_type: DocumentType,
    ) -> Result<(), RepositoryError> {
        sqlx::query("UPDATE documents SET category_id = $2, type = $3 WHERE id = $1")
            .bind(id)
            .bind(category_id)
            .bind(doc_type.as_str())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn reassign_documents(&self, from: Uuid, to: Uuid) -> Result<u64, RepositoryError> {
        let result = sqlx::query("UPDATE documents SET category_id = $2 WHERE category_id = $1")
            .bind(from)
            .bind(to)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}
