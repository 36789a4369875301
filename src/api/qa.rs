//! Questions, answers, and comments.

use super::auth::CurrentUser;
use super::extract::{ApiJson, ApiMultipart, ApiPath};
use super::multipart::read_form;
use super::response::{created, ok};
use super::{AppError, AppState};
use crate::services::Attachment;
use axum::{
    Router,
    extract::State,
    response::IntoResponse,
    routing::{delete, get, post},
};
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

pub(super) fn routes() -> Router<AppState> {
    Router::new()
        .route(
            "/subjects/:id/questions",
            get(list_questions).post(create_question),
        )
        .route("/questions/:id", delete(delete_question))
        .route("/questions/:id/answers", post(create_answer))
        .route(
            "/subjects/:id/comments",
            get(list_comments).post(create_comment),
        )
        .route("/comments/:id", delete(delete_comment))
}

/// Body shared by question and comment creation.
#[derive(Deserialize)]
struct PostRequest {
    #[serde(default)]
    content: String,
    #[serde(default)]
    is_anonymous: bool,
}

async fn list_questions(
    State(state): State<AppState>,
    _user: CurrentUser,
    ApiPath(subject_id): ApiPath<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    Ok(ok(state.qa.questions(subject_id).await?))
}

async fn create_question(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
    ApiPath(subject_id): ApiPath<Uuid>,
    ApiJson(request): ApiJson<PostRequest>,
) -> Result<impl IntoResponse, AppError> {
    let question = state
        .qa
        .ask(subject_id, actor.id, &request.content, request.is_anonymous)
        .await?;
    Ok(created(question))
}

async fn create_answer(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
    ApiPath(question_id): ApiPath<Uuid>,
    ApiMultipart(mut multipart): ApiMultipart,
) -> Result<impl IntoResponse, AppError> {
    let form = read_form(&mut multipart).await?;
    let content = form.field("content").unwrap_or_default().to_string();
    let attachment = form.file.map(|file| Attachment {
        original_name: file.original_name,
        mime_type: file.mime_type,
        bytes: file.bytes,
    });
    let answer = state
        .qa
        .answer(question_id, actor.id, &content, attachment)
        .await?;
    Ok(created(answer))
}

async fn delete_question(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    state.qa.delete_question(id, actor).await?;
    Ok(ok(json!({ "message": "Question deleted" })))
}

async fn list_comments(
    State(state): State<AppState>,
    _user: CurrentUser,
    ApiPath(subject_id): ApiPath<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    Ok(ok(state.qa.comments(subject_id).await?))
}

async fn create_comment(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
    ApiPath(subject_id): ApiPath<Uuid>,
    ApiJson(request): ApiJson<PostRequest>,
) -> Result<impl IntoResponse, AppError> {
    let comment = state
        .qa
        .comment(subject_id, actor.id, &request.content, request.is_anonymous)
        .await?;
    Ok(created(comment))
}

async fn delete_comment(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    state.qa.delete_comment(id, actor).await?;
    Ok(ok(json!({ "message": "Comment deleted" })))
}
