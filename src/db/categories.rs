use super::{PgRepository, RepositoryError};
use crate::models::{
    CategoryChanges, DocumentCategory, DocumentType, NewCategory, SENTINEL_NAME_CS,
    SENTINEL_NAME_EN, SENTINEL_ORDER_INDEX,
};
use async_trait::async_trait;
use sqlx::Row;
use sqlx::postgres::PgRow;
use uuid::Uuid;

const CATEGORY_COLUMNS: &str = "id, subject_id, type, name_cs, name_en, order_index, is_protected, \
     created_by, created_at, updated_at";

/// Persistence for document categories.
#[async_trait]
pub trait CategoryRepository: Send + Sync {
    /// Categories of a subject, optionally of one type, in display order.
    async fn list_categories(
        &self,
        subject_id: Uuid,
        doc_type: Option<DocumentType>,
    ) -> Result<Vec<DocumentCategory>, RepositoryError>;

    /// Fetch one category.
    async fn get_category(&self, id: Uuid) -> Result<Option<DocumentCategory>, RepositoryError>;

    /// The protected bucket of a (subject, type) pair, matched by flag or by either label.
    async fn find_sentinel(
        &self,
        subject_id: Uuid,
        doc_type: DocumentType,
    ) -> Result<Option<DocumentCategory>, RepositoryError>;

    /// Whether a category of the pair already uses `name_cs`, or `name_en` when given.
    async fn category_name_taken(
        &self,
        subject_id: Uuid,
        doc_type: DocumentType,
        name_cs: &str,
        name_en: Option<&str>,
    ) -> Result<bool, RepositoryError>;

    /// Highest order index among the pair's non-protected categories.
    async fn max_order_index(
        &self,
        subject_id: Uuid,
        doc_type: DocumentType,
    ) -> Result<Option<i32>, RepositoryError>;

    /// Insert a new category row.
    async fn insert_category(&self, category: NewCategory) -> Result<DocumentCategory, RepositoryError>;

    /// Insert the pair's protected bucket. Returns `None`, writing nothing, when the pair
    /// already has one.
    async fn insert_sentinel(
        &self,
        category: NewCategory,
    ) -> Result<Option<DocumentCategory>, RepositoryError>;

    /// Apply a partial update. Returns `None` when the category does not exist.
    async fn update_category(
        &self,
        id: Uuid,
        changes: &CategoryChanges,
    ) -> Result<Option<DocumentCategory>, RepositoryError>;

    /// Set a single category's order index. Returns whether a row was updated.
    async fn set_category_order(&self, id: Uuid, order_index: i32) -> Result<bool, RepositoryError>;

    /// Flag a category as the protected bucket and pin it to the last position.
    ///
    /// Fails with a unique violation when another row of the pair is already protected.
    async fn pin_sentinel(&self, id: Uuid) -> Result<(), RepositoryError>;

    /// Delete a category row. Returns whether a row was removed.
    async fn delete_category(&self, id: Uuid) -> Result<bool, RepositoryError>;
}

fn category_from_row(row: &PgRow) -> Result<DocumentCategory, RepositoryError> {
    let doc_type: String = row.try_get("type")?;
    Ok(DocumentCategory {
        id: row.try_get("id")?,
        subject_id: row.try_get("subject_id")?,
        doc_type: doc_type.parse()?,
        name_cs: row.try_get("name_cs")?,
        name_en: row.try_get("name_en")?,
        order_index: row.try_get("order_index")?,
        is_protected: row.try_get("is_protected")?,
        created_by: row.try_get("created_by")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

#[async_trait]
impl CategoryRepository for PgRepository {
    async fn list_categories(
        &self,
        subject_id: Uuid,
        doc_type: Option<DocumentType>,
    ) -> Result<Vec<DocumentCategory>, RepositoryError> {
        let rows = sqlx::query(&format!(
            "SELECT {CATEGORY_COLUMNS} FROM document_categories \
             WHERE subject_id = $1 AND ($2::text IS NULL OR type = $2) \
             ORDER BY order_index ASC, created_at ASC"
        ))
        .bind(subject_id)
        .bind(doc_type.map(DocumentType::as_str))
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(category_from_row).collect()
    }

    async fn get_category(&self, id: Uuid) -> Result<Option<DocumentCategory>, RepositoryError> {
        let row = sqlx::query(&format!(
            "SELECT {CATEGORY_COLUMNS} FROM document_categories WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(category_from_row).transpose()
    }

    async fn find_sentinel(
        &self,
        subject_id: Uuid,
        doc_type: DocumentType,
    ) -> Result<Option<DocumentCategory>, RepositoryError> {
        let row = sqlx::query(&format!(
            "SELECT {CATEGORY_COLUMNS} FROM document_categories \
             WHERE subject_id = $1 AND type = $2 \
               AND (is_protected OR name_cs = $3 OR name_en = $4) \
             ORDER BY is_protected DESC, created_at ASC \
             LIMIT 1"
        ))
        .bind(subject_id)
        .bind(doc_type.as_str())
        .bind(SENTINEL_NAME_CS)
        .bind(SENTINEL_NAME_EN)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(category_from_row).transpose()
    }

    async fn category_name_taken(
        &self,
        subject_id: Uuid,
        doc_type: DocumentType,
        name_cs: &str,
        name_en: Option<&str>,
    ) -> Result<bool, RepositoryError> {
        let taken: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM document_categories \
             WHERE subject_id = $1 AND type = $2 \
               AND (name_cs = $3 OR ($4::text IS NOT NULL AND name_en = $4)))",
        )
        .bind(subject_id)
        .bind(doc_type.as_str())
        .bind(name_cs)
        .bind(name_en)
        .fetch_one(&self.pool)
        .await?;
        Ok(taken)
    }

    async fn max_order_index(
        &self,
        subject_id: Uuid,
        doc_type: DocumentType,
    ) -> Result<Option<i32>, RepositoryError> {
        let max: Option<i32> = sqlx::query_scalar(
            "SELECT MAX(order_index) FROM document_categories \
             WHERE subject_id = $1 AND type = $2 \
               AND NOT (is_protected OR name_cs = $3 OR name_en = $4)",
        )
        .bind(subject_id)
        .bind(doc_type.as_str())
        .bind(SENTINEL_NAME_CS)
        .bind(SENTINEL_NAME_EN)
        .fetch_one(&self.pool)
        .await?;
        Ok(max)
    }

    async fn insert_category(&self, category: NewCategory) -> Result<DocumentCategory, RepositoryError> {
        let row = sqlx::query(&format!(
            "INSERT INTO document_categories \
             (id, subject_id, type, name_cs, name_en, order_index, is_protected, created_by) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8) \
             RETURNING {CATEGORY_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(category.subject_id)
        .bind(category.doc_type.as_str())
        .bind(&category.name_cs)
        .bind(&category.name_en)
        .bind(category.order_index)
        .bind(category.is_protected)
        .bind(category.created_by)
        .fetch_one(&self.pool)
        .await?;
        category_from_row(&row)
    }

    async fn insert_sentinel(
        &self,
        category: NewCategory,
    ) -> Result<Option<DocumentCategory>, RepositoryError> {
        let row = sqlx::query(&format!(
            "INSERT INTO document_categories \
             (id, subject_id, type, name_cs, name_en, order_index, is_protected, created_by) \
             VALUES ($1, $2, $3, $4, $5, $6, true, $7) \
             ON CONFLICT (subject_id, type) WHERE is_protected DO NOTHING \
             RETURNING {CATEGORY_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(category.subject_id)
        .bind(category.doc_type.as_str())
        .bind(&category.name_cs)
        .bind(&category.name_en)
        .bind(category.order_index)
        .bind(category.created_by)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(category_from_row).transpose()
    }

    async fn update_category(
        &self,
        id: Uuid,
        changes: &CategoryChanges,
    ) -> Result<Option<DocumentCategory>, RepositoryError> {
        let row = sqlx::query(&format!(
            "UPDATE document_categories SET \
                name_cs = COALESCE($2, name_cs), \
                name_en = COALESCE($3, name_en), \
                order_index = COALESCE($4, order_index), \
                updated_at = now() \
             WHERE id = $1 \
             RETURNING {CATEGORY_COLUMNS}"
        ))
        .bind(id)
        .bind(changes.name_cs.as_deref())
        .bind(changes.name_en.as_deref())
        .bind(changes.order_index)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(category_from_row).transpose()
    }

    async fn set_category_order(&self, id: Uuid, order_index: i32) -> Result<bool, RepositoryError> {
        let result = sqlx::query(
            "UPDATE document_categories SET order_index = $2, updated_at = now() WHERE id = $1",
        )
        .bind(id)
        .bind(order_index)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn pin_sentinel(&self, id: Uuid) -> Result<(), RepositoryError> {
        sqlx::query(
            "UPDATE document_categories \
             SET is_protected = true, order_index = $2, updated_at = now() \
             WHERE id = $1",
        )
        .bind(id)
        .bind(SENTINEL_ORDER_INDEX)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn delete_category(&self, id: Uuid) -> Result<bool, RepositoryError> {
        let result = sqlx::query("DELETE FROM document_categories WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
