use super::{PgRepository, RepositoryError};
use crate::models::{NewSemester, Semester, SemesterChanges};
use async_trait::async_trait;
use sqlx::Row;
use sqlx::postgres::PgRow;
use uuid::Uuid;

const SEMESTER_COLUMNS: &str = "id, name_cs, name_en, order_index, created_at, updated_at";

/// Persistence for semesters.
#[async_trait]
pub trait SemesterRepository: Send + Sync {
    /// All semesters in display order.
    async fn list_semesters(&self) -> Result<Vec<Semester>, RepositoryError>;

    /// Fetch one semester.
    async fn get_semester(&self, id: Uuid) -> Result<Option<Semester>, RepositoryError>;

    /// Insert a new semester.
    async fn insert_semester(&self, semester: NewSemester) -> Result<Semester, RepositoryError>;

    /// Apply a partial update. Returns `None` when the semester does not exist.
    async fn update_semester(
        &self,
        id: Uuid,
        changes: &SemesterChanges,
    ) -> Result<Option<Semester>, RepositoryError>;

    /// Delete a semester. Returns whether a row was removed.
    async fn delete_semester(&self, id: Uuid) -> Result<bool, RepositoryError>;

    /// Number of subjects attached to a semester.
    async fn count_semester_subjects(&self, id: Uuid) -> Result<i64, RepositoryError>;
}

fn semester_from_row(row: &PgRow) -> Result<Semester, RepositoryError> {
    Ok(Semester {
        id: row.try_get("id")?,
        name_cs: row.try_get("name_cs")?,
        name_en: row.try_get("name_en")?,
        order_index: row.try_get("order_index")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

#[async_trait]
impl SemesterRepository for PgRepository {
    async fn list_semesters(&self) -> Result<Vec<Semester>, RepositoryError> {
        let rows = sqlx::query(&format!(
            "SELECT {SEMESTER_COLUMNS} FROM semesters ORDER BY order_index ASC, created_at ASC"
        ))
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(semester_from_row).collect()
    }

    async fn get_semester(&self, id: Uuid) -> Result<Option<Semester>, RepositoryError> {
        let row = sqlx::query(&format!("SELECT {SEMESTER_COLUMNS} FROM semesters WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(semester_from_row).transpose()
    }

    async fn insert_semester(&self, semester: NewSemester) -> Result<Semester, RepositoryError> {
        let row = sqlx::query(&format!(
            "INSERT INTO semesters (id, name_cs, name_en, order_index) \
             VALUES ($1, $2, $3, $4) RETURNING {SEMESTER_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(&semester.name_cs)
        .bind(&semester.name_en)
        .bind(semester.order_index)
        .fetch_one(&self.pool)
        .await?;
        semester_from_row(&row)
    }

    async fn update_semester(
        &self,
        id: Uuid,
        changes: &SemesterChanges,
    ) -> Result<Option<Semester>, RepositoryError> {
        let row = sqlx::query(&format!(
            "UPDATE semesters SET \
                name_cs = COALESCE($2, name_cs), \
                name_en = COALESCE($3, name_en), \
                order_index = COALESCE($4, order_index), \
                updated_at = now() \
             WHERE id = $1 RETURNING {SEMESTER_COLUMNS}"
        ))
        .bind(id)
        .bind(changes.name_cs.as_deref())
        .bind(changes.name_en.as_deref())
        .bind(changes.order_index)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(semester_from_row).transpose()
    }

    async fn delete_semester(&self, id: Uuid) -> Result<bool, RepositoryError> {
        let result = sqlx::query("DELETE FROM semesters WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn count_semester_subjects(&self, id: Uuid) -> Result<i64, RepositoryError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM subjects WHERE semester_id = $1")
            .bind(id)
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}
