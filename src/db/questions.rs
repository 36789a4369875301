use super::documents::{DOCUMENT_COLUMNS, document_from_row};
use super::{PgRepository, RepositoryError};
use crate::models::{Answer, Author, Document, NewAnswer, NewQuestion, Question};
use async_trait::async_trait;
use sqlx::Row;
use sqlx::postgres::PgRow;
use std::collections::HashMap;
use uuid::Uuid;

/// Persistence for questions and their answers.
#[async_trait]
pub trait QuestionRepository: Send + Sync {
    /// Questions of a subject, newest first, each with its answers oldest first.
    async fn list_questions(&self, subject_id: Uuid) -> Result<Vec<Question>, RepositoryError>;

    /// Fetch one question without its answers.
    async fn get_question(&self, id: Uuid) -> Result<Option<Question>, RepositoryError>;

    /// Insert a new question.
    async fn insert_question(&self, question: NewQuestion) -> Result<Question, RepositoryError>;

    /// Insert a new answer.
    async fn insert_answer(&self, answer: NewAnswer) -> Result<Answer, RepositoryError>;

    /// Delete a question; its answers go with it. Returns whether a row was removed.
    async fn delete_question(&self, id: Uuid) -> Result<bool, RepositoryError>;
}

pub(crate) fn author_from_row(row: &PgRow) -> Result<Author, RepositoryError> {
    Ok(Author {
        id: row.try_get("user_id")?,
        display_name: row
            .try_get::<Option<String>, _>("author_display_name")?
            .unwrap_or_default(),
        email: row.try_get::<Option<String>, _>("author_email")?.unwrap_or_default(),
    })
}

fn question_from_row(row: &PgRow) -> Result<Question, RepositoryError> {
    Ok(Question {
        id: row.try_get("id")?,
        subject_id: row.try_get("subject_id")?,
        user_id: row.try_get("user_id")?,
        content: row.try_get("content")?,
        is_anonymous: row.try_get("is_anonymous")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
        user: author_from_row(row)?,
        answers: Vec::new(),
    })
}

fn answer_from_row(row: &PgRow) -> Result<Answer, RepositoryError> {
    Ok(Answer {
        id: row.try_get("id")?,
        question_id: row.try_get("question_id")?,
        user_id: row.try_get("user_id")?,
        content: row.try_get("content")?,
        document_id: row.try_get("document_id")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
        user: author_from_row(row)?,
        document: None,
    })
}

const QUESTION_SELECT: &str = "SELECT q.id, q.subject_id, q.user_id, q.content, q.is_anonymous, \
     q.created_at, q.updated_at, u.display_name AS author_display_name, u.email AS author_email \
     FROM questions q LEFT JOIN users u ON u.id = q.user_id";

const ANSWER_SELECT: &str = "SELECT a.id, a.question_id, a.user_id, a.content, a.document_id, \
     a.created_at, a.updated_at, u.display_name AS author_display_name, u.email AS author_email \
     FROM answers a LEFT JOIN users u ON u.id = a.user_id";

impl PgRepository {
    async fn documents_by_id(&self, ids: &[Uuid]) -> Result<HashMap<Uuid, Document>, RepositoryError> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }
        let rows = sqlx::query(&format!(
            "SELECT {DOCUMENT_COLUMNS}, NULL::boolean AS is_favorite FROM documents WHERE id = ANY($1)"
        ))
        .bind(ids)
        .fetch_all(&self.pool)
        .await?;
        rows.iter()
            .map(|row| document_from_row(row).map(|doc| (doc.id, doc)))
            .collect()
    }
}

#[async_trait]
impl QuestionRepository for PgRepository {
    async fn list_questions(&self, subject_id: Uuid) -> Result<Vec<Question>, RepositoryError> {
        let rows = sqlx::query(&format!(
            "{QUESTION_SELECT} WHERE q.subject_id = $1 ORDER BY q.created_at DESC"
        ))
        .bind(subject_id)
        .fetch_all(&self.pool)
        .await?;
        let mut questions = rows
            .iter()
            .map(question_from_row)
            .collect::<Result<Vec<_>, _>>()?;
        if questions.is_empty() {
            return Ok(questions);
        }

        let question_ids: Vec<Uuid> = questions.iter().map(|question| question.id).collect();
        let rows = sqlx::query(&format!(
            "{ANSWER_SELECT} WHERE a.question_id = ANY($1) ORDER BY a.created_at ASC"
        ))
        .bind(&question_ids)
        .fetch_all(&self.pool)
        .await?;
        let answers = rows
            .iter()
            .map(answer_from_row)
            .collect::<Result<Vec<_>, _>>()?;

        let document_ids: Vec<Uuid> = answers.iter().filter_map(|answer| answer.document_id).collect();
        let mut documents = self.documents_by_id(&document_ids).await?;

        let mut by_question: HashMap<Uuid, Vec<Answer>> = HashMap::new();
        for mut answer in answers {
            answer.document = answer
                .document_id
                .and_then(|id| documents.remove(&id));
            by_question.entry(answer.question_id).or_default().push(answer);
        }
        for question in &mut questions {
            question.answers = by_question.remove(&question.id).unwrap_or_default();
        }
        Ok(questions)
    }

    async fn get_question(&self, id: Uuid) -> Result<Option<Question>, RepositoryError> {
        let row = sqlx::query(&format!("{QUESTION_SELECT} WHERE q.id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(question_from_row).transpose()
    }

    async fn insert_question(&self, question: NewQuestion) -> Result<Question, RepositoryError> {
        let id = Uuid::new_v4();
        sqlx::query(
            "INSERT INTO questions (id, subject_id, user_id, content, is_anonymous) \
             VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(id)
        .bind(question.subject_id)
        .bind(question.user_id)
        .bind(&question.content)
        .bind(question.is_anonymous)
        .execute(&self.pool)
        .await?;

        let row = sqlx::query(&format!("{QUESTION_SELECT} WHERE q.id = $1"))
            .bind(id)
            .fetch_one(&self.pool)
            .await?;
        question_from_row(&row)
    }

    async fn insert_answer(&self, answer: NewAnswer) -> Result<Answer, RepositoryError> {
        let id = Uuid::new_v4();
        sqlx::query(
            "INSERT INTO answers (id, question_id, user_id, content, document_id) \
             VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(id)
        .bind(answer.question_id)
        .bind(answer.user_id)
        .bind(&answer.content)
        .bind(answer.document_id)
        .execute(&self.pool)
        .await?;

        let row = sqlx::query(&format!("{ANSWER_SELECT} WHERE a.id = $1"))
            .bind(id)
            .fetch_one(&self.pool)
            .await?;
        let mut created = answer_from_row(&row)?;
        if let Some(document_id) = created.document_id {
            created.document = self.documents_by_id(&[document_id]).await?.remove(&document_id);
        }
        Ok(created)
    }

    async fn delete_question(&self, id: Uuid) -> Result<bool, RepositoryError> {
        let result = sqlx::query("DELETE FROM questions WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
