use super::{PgRepository, RepositoryError};
use crate::models::{NewSubject, NewTeacher, Subject, SubjectChanges, SubjectDetail, SubjectTeacher};
use async_trait::async_trait;
use sqlx::postgres::PgRow;
use sqlx::{Postgres, Row, Transaction};
use uuid::Uuid;

pub(crate) const SUBJECT_COLUMNS: &str = "id, semester_id, name_cs, name_en, code, description_cs, \
     description_en, credits, created_at, updated_at";

/// Persistence for subjects and their teachers.
#[async_trait]
pub trait SubjectRepository: Send + Sync {
    /// Subjects, optionally of one semester, with the caller's favorites first.
    async fn list_subjects(
        &self,
        user_id: Uuid,
        semester_id: Option<Uuid>,
    ) -> Result<Vec<Subject>, RepositoryError>;

    /// Fetch one subject.
    async fn get_subject(&self, id: Uuid) -> Result<Option<Subject>, RepositoryError>;

    /// Identifiers of every subject.
    async fn list_subject_ids(&self) -> Result<Vec<Uuid>, RepositoryError>;

    /// Teachers of a subject in creation order.
    async fn list_teachers(&self, subject_id: Uuid) -> Result<Vec<SubjectTeacher>, RepositoryError>;

    /// Whether a teacher assignment exists.
    async fn teacher_exists(&self, id: Uuid) -> Result<bool, RepositoryError>;

    /// Insert a subject together with its teachers in one transaction.
    async fn insert_subject(&self, subject: NewSubject) -> Result<SubjectDetail, RepositoryError>;

    /// Apply a partial update; a present teacher list replaces the whole set in the same
    /// transaction. Returns `None` when the subject does not exist.
    async fn update_subject(
        &self,
        id: Uuid,
        changes: SubjectChanges,
    ) -> Result<Option<SubjectDetail>, RepositoryError>;

    /// Delete a subject after its teachers. Returns whether the subject row was removed.
    async fn delete_subject(&self, id: Uuid) -> Result<bool, RepositoryError>;
}

pub(crate) fn subject_from_row(row: &PgRow) -> Result<Subject, RepositoryError> {
    Ok(Subject {
        id: row.try_get("id")?,
        semester_id: row.try_get("semester_id")?,
        name_cs: row.try_get("name_cs")?,
        name_en: row.try_get("name_en")?,
        code: row.try_get("code")?,
        description_cs: row.try_get("description_cs")?,
        description_en: row.try_get("description_en")?,
        credits: row.try_get("credits")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
        is_favorite: row.try_get::<Option<bool>, _>("is_favorite")?.unwrap_or(false),
    })
}

fn teacher_from_row(row: &PgRow) -> Result<SubjectTeacher, RepositoryError> {
    Ok(SubjectTeacher {
        id: row.try_get("id")?,
        subject_id: row.try_get("subject_id")?,
        teacher_name: row.try_get("teacher_name")?,
        topic_cs: row.try_get("topic_cs")?,
        created_at: row.try_get("created_at")?,
    })
}

async fn insert_teachers(
    tx: &mut Transaction<'_, Postgres>,
    subject_id: Uuid,
    teachers: &[NewTeacher],
) -> Result<Vec<SubjectTeacher>, RepositoryError> {
    let mut inserted = Vec::with_capacity(teachers.len());
    for teacher in teachers {
        let row = sqlx::query(
            "INSERT INTO subject_teachers (id, subject_id, teacher_name, topic_cs) \
             VALUES ($1, $2, $3, $4) \
             RETURNING id, subject_id, teacher_name, topic_cs, created_at",
        )
        .bind(Uuid::new_v4())
        .bind(subject_id)
        .bind(&teacher.teacher_name)
        .bind(&teacher.topic_cs)
        .fetch_one(&mut **tx)
        .await?;
        inserted.push(teacher_from_row(&row)?);
    }
    Ok(inserted)
}

#[async_trait]
impl SubjectRepository for PgRepository {
    async fn list_subjects(
        &self,
        user_id: Uuid,
        semester_id: Option<Uuid>,
    ) -> Result<Vec<Subject>, RepositoryError> {
        let rows = sqlx::query(&format!(
            "SELECT {SUBJECT_COLUMNS}, (ufs.user_id IS NOT NULL) AS is_favorite \
             FROM subjects \
             LEFT JOIN user_favorite_subjects ufs \
                ON subjects.id = ufs.subject_id AND ufs.user_id = $1 \
             WHERE ($2::uuid IS NULL OR subjects.semester_id = $2) \
             ORDER BY is_favorite DESC, subjects.name_cs ASC"
        ))
        .bind(user_id)
        .bind(semester_id)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(subject_from_row).collect()
    }

    async fn get_subject(&self, id: Uuid) -> Result<Option<Subject>, RepositoryError> {
        let row = sqlx::query(&format!(
            "SELECT {SUBJECT_COLUMNS}, NULL::boolean AS is_favorite FROM subjects WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(subject_from_row).transpose()
    }

    async fn list_subject_ids(&self) -> Result<Vec<Uuid>, RepositoryError> {
        let ids: Vec<Uuid> = sqlx::query_scalar("SELECT id FROM subjects ORDER BY created_at")
            .fetch_all(&self.pool)
            .await?;
        Ok(ids)
    }

    async fn list_teachers(&self, subject_id: Uuid) -> Result<Vec<SubjectTeacher>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT id, subject_id, teacher_name, topic_cs, created_at \
             FROM subject_teachers WHERE subject_id = $1 ORDER BY created_at ASC",
        )
        .bind(subject_id)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(teacher_from_row).collect()
    }

    async fn teacher_exists(&self, id: Uuid) -> Result<bool, RepositoryError> {
        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM subject_teachers WHERE id = $1)")
                .bind(id)
                .fetch_one(&self.pool)
                .await?;
        Ok(exists)
    }

    async fn insert_subject(&self, subject: NewSubject) -> Result<SubjectDetail, RepositoryError> {
        let mut tx = self.pool.begin().await?;
        let row = sqlx::query(&format!(
            "INSERT INTO subjects \
             (id, semester_id, name_cs, name_en, code, description_cs, description_en, credits) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8) \
             RETURNING {SUBJECT_COLUMNS}, NULL::boolean AS is_favorite"
        ))
        .bind(Uuid::new_v4())
        .bind(subject.semester_id)
        .bind(&subject.name_cs)
        .bind(&subject.name_en)
        .bind(subject.code.as_deref())
        .bind(&subject.description_cs)
        .bind(&subject.description_en)
        .bind(subject.credits)
        .fetch_one(&mut *tx)
        .await?;
        let created = subject_from_row(&row)?;
        let teachers = insert_teachers(&mut tx, created.id, &subject.teachers).await?;
        tx.commit().await?;

        Ok(SubjectDetail {
            subject: created,
            teachers,
        })
    }

    async fn update_subject(
        &self,
        id: Uuid,
        changes: SubjectChanges,
    ) -> Result<Option<SubjectDetail>, RepositoryError> {
        let mut tx = self.pool.begin().await?;
        let row = sqlx::query(&format!(
            "UPDATE subjects SET \
                semester_id = COALESCE($2, semester_id), \
                name_cs = COALESCE($3, name_cs), \
                name_en = COALESCE($4, name_en), \
                code = COALESCE($5, code), \
                description_cs = COALESCE($6, description_cs), \
                description_en = COALESCE($7, description_en), \
                credits = COALESCE($8, credits), \
                updated_at = now() \
             WHERE id = $1 \
             RETURNING {SUBJECT_COLUMNS}, NULL::boolean AS is_favorite"
        ))
        .bind(id)
        .bind(changes.semester_id)
        .bind(changes.name_cs.as_deref())
        .bind(changes.name_en.as_deref())
        .bind(changes.code.as_deref())
        .bind(changes.description_cs.as_deref())
        .bind(changes.description_en.as_deref())
        .bind(changes.credits)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };
        let subject = subject_from_row(&row)?;

        let teachers = match changes.teachers {
            Some(teachers) => {
                sqlx::query("DELETE FROM subject_teachers WHERE subject_id = $1")
                    .bind(id)
                    .execute(&mut *tx)
                    .await?;
                insert_teachers(&mut tx, id, &teachers).await?
            }
            None => {
                let rows = sqlx::query(
                    "SELECT id, subject_id, teacher_name, topic_cs, created_at \
                     FROM subject_teachers WHERE subject_id = $1 ORDER BY created_at ASC",
                )
                .bind(id)
                .fetch_all(&mut *tx)
                .await?;
                rows.iter()
                    .map(teacher_from_row)
                    .collect::<Result<Vec<_>, _>>()?
            }
        };
        tx.commit().await?;

        Ok(Some(SubjectDetail { subject, teachers }))
    }

    async fn delete_subject(&self, id: Uuid) -> Result<bool, RepositoryError> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM subject_teachers WHERE subject_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        let result = sqlx::query("DELETE FROM subjects WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(result.rows_affected() > 0)
    }
}
