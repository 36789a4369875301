//! Questions, answers, and comments attached to a subject.

use super::{Actor, DocumentService, ServiceError, UploadRequest, require_text};
use crate::db::Repository;
use crate::models::{Answer, Comment, DocumentType, NewAnswer, NewComment, NewQuestion, Question};
use std::sync::Arc;
use uuid::Uuid;

const MAX_CONTENT_LEN: usize = 10_000;

/// File uploaded together with an answer.
#[derive(Debug, Clone)]
pub struct Attachment {
    pub original_name: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

#[derive(Clone)]
pub struct QaService {
    repo: Arc<dyn Repository>,
    documents: DocumentService,
}

impl QaService {
    pub fn new(repo: Arc<dyn Repository>, documents: DocumentService) -> Self {
        Self { repo, documents }
    }

    /// Questions of a subject with their answers, anonymous authors hidden.
    pub async fn questions(&self, subject_id: Uuid) -> Result<Vec<Question>, ServiceError> {
        let questions = self.repo.list_questions(subject_id).await?;
        Ok(questions.into_iter().map(Question::sanitize).collect())
    }

    pub async fn ask(
        &self,
        subject_id: Uuid,
        user_id: Uuid,
        content: &str,
        is_anonymous: bool,
    ) -> Result<Question, ServiceError> {
        let content = require_text(content, "content", MAX_CONTENT_LEN)?;
        self.require_subject(subject_id).await?;
        let question = self
            .repo
            .insert_question(NewQuestion {
                subject_id,
                user_id,
                content,
                is_anonymous,
            })
            .await?;
        Ok(question.sanitize())
    }

    /// Answer a question, optionally with a file.
    ///
    /// The attachment is stored first, then the answer, then the document is linked back to the
    /// answer. An attachment whose answer cannot be written is kept, not cleaned up.
    pub async fn answer(
        &self,
        question_id: Uuid,
        user_id: Uuid,
        content: &str,
        attachment: Option<Attachment>,
    ) -> Result<Answer, ServiceError> {
        let content = require_text(content, "content", MAX_CONTENT_LEN)?;
        let question = self
            .repo
            .get_question(question_id)
            .await?
            .ok_or(ServiceError::NotFound("Question"))?;

        let document = match attachment {
            Some(file) => Some(
                self.documents
                    .upload(UploadRequest {
                        subject_id: question.subject_id,
                        uploader: user_id,
                        original_name: file.original_name,
                        mime_type: file.mime_type,
                        bytes: file.bytes,
                        doc_type: DocumentType::Other,
                        category_id: None,
                    })
                    .await?,
            ),
            None => None,
        };
        let document_id = document.as_ref().map(|doc| doc.id);

        let mut answer = match self
            .repo
            .insert_answer(NewAnswer {
                question_id,
                user_id,
                content,
                document_id,
            })
            .await
        {
            Ok(answer) => answer,
            Err(err) => {
                if let Some(document_id) = document_id {
                    tracing::warn!(
                        %document_id,
                        %question_id,
                        error = %err,
                        "Answer insert failed; attachment left without an answer"
                    );
                }
                return Err(err.into());
            }
        };

        if let Some(document_id) = document_id {
            match self.documents.attach_to_answer(document_id, answer.id).await {
                Ok(()) => {
                    if let Some(doc) = answer.document.as_mut() {
                        doc.answer_id = Some(answer.id);
                    }
                }
                Err(err) => tracing::warn!(
                    %document_id,
                    answer_id = %answer.id,
                    error = %err,
                    "Failed to link attachment to its answer"
                ),
            }
        }
        Ok(answer)
    }

    /// Delete a question and its answers. Only the author or an admin may do so.
    pub async fn delete_question(&self, id: Uuid, actor: Actor) -> Result<(), ServiceError> {
        let question = self
            .repo
            .get_question(id)
            .await?
            .ok_or(ServiceError::NotFound("Question"))?;
        if !actor.may_modify(question.user_id) {
            return Err(ServiceError::Forbidden(
                "Only the author or an admin can delete this question".into(),
            ));
        }
        if !self.repo.delete_question(id).await? {
            return Err(ServiceError::NotFound("Question"));
        }
        Ok(())
    }

    pub async fn comments(&self, subject_id: Uuid) -> Result<Vec<Comment>, ServiceError> {
        let comments = self.repo.list_comments(subject_id).await?;
        Ok(comments.into_iter().map(Comment::sanitize).collect())
    }

    pub async fn comment(
        &self,
        subject_id: Uuid,
        user_id: Uuid,
        content: &str,
        is_anonymous: bool,
    ) -> Result<Comment, ServiceError> {
        let content = require_text(content, "content", MAX_CONTENT_LEN)?;
        self.require_subject(subject_id).await?;
        let comment = self
            .repo
            .insert_comment(NewComment {
                subject_id,
                user_id,
                content,
                is_anonymous,
            })
            .await?;
        Ok(comment.sanitize())
    }

    pub async fn delete_comment(&self, id: Uuid, actor: Actor) -> Result<(), ServiceError> {
        let comment = self
            .repo
            .get_comment(id)
            .await?
            .ok_or(ServiceError::NotFound("Comment"))?;
        if !actor.may_modify(comment.user_id) {
            return Err(ServiceError::Forbidden(
                "Only the author or an admin can delete this comment".into(),
            ));
        }
        if !self.repo.delete_comment(id).await? {
            return Err(ServiceError::NotFound("Comment"));
        }
        Ok(())
    }

    async fn require_subject(&self, subject_id: Uuid) -> Result<(), ServiceError> {
        self.repo
            .get_subject(subject_id)
            .await?
            .map(|_| ())
            .ok_or(ServiceError::NotFound("Subject"))
    }
}
