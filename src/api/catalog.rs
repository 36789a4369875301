//! Semesters and subjects.

use super::auth::{AdminUser, CurrentUser};
use super::extract::{ApiJson, ApiPath, ApiQuery};
use super::response::{created, ok};
use super::{AppError, AppState};
use crate::models::{NewSemester, NewSubject, SemesterChanges, SubjectChanges};
use axum::{
    Router,
    extract::State,
    response::IntoResponse,
    routing::{get, post, put},
};
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

pub(super) fn routes() -> Router<AppState> {
    Router::new()
        .route("/semesters", get(list_semesters))
        .route("/semesters/:id", get(get_semester))
        .route("/subjects", get(list_subjects))
        .route("/subjects/search", get(search_subjects))
        .route("/subjects/:id", get(get_subject))
        .route("/admin/semesters", post(create_semester))
        .route(
            "/admin/semesters/:id",
            put(update_semester).delete(delete_semester),
        )
        .route("/admin/subjects", post(create_subject))
        .route(
            "/admin/subjects/:id",
            put(update_subject).delete(delete_subject),
        )
}

async fn list_semesters(
    State(state): State<AppState>,
    _user: CurrentUser,
) -> Result<impl IntoResponse, AppError> {
    Ok(ok(state.subjects.list_semesters().await?))
}

async fn get_semester(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    Ok(ok(state.subjects.semester(id, actor.id).await?))
}

#[derive(Deserialize)]
struct SubjectsQuery {
    semester_id: Option<Uuid>,
}

async fn list_subjects(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
    ApiQuery(query): ApiQuery<SubjectsQuery>,
) -> Result<impl IntoResponse, AppError> {
    Ok(ok(state
        .subjects
        .list_subjects(actor.id, query.semester_id)
        .await?))
}

#[derive(Deserialize)]
struct SubjectSearchQuery {
    #[serde(default)]
    q: String,
    semester_id: Option<Uuid>,
}

async fn search_subjects(
    State(state): State<AppState>,
    _user: CurrentUser,
    ApiQuery(query): ApiQuery<SubjectSearchQuery>,
) -> Result<impl IntoResponse, AppError> {
    let results = state.subjects.search(&query.q, query.semester_id).await?;
    Ok(ok(results.hits))
}

async fn get_subject(
    State(state): State<AppState>,
    _user: CurrentUser,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    Ok(ok(state.subjects.subject(id).await?))
}

async fn create_semester(
    State(state): State<AppState>,
    _admin: AdminUser,
    ApiJson(semester): ApiJson<NewSemester>,
) -> Result<impl IntoResponse, AppError> {
    Ok(created(state.subjects.create_semester(semester).await?))
}

async fn update_semester(
    State(state): State<AppState>,
    _admin: AdminUser,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(changes): ApiJson<SemesterChanges>,
) -> Result<impl IntoResponse, AppError> {
    Ok(ok(state.subjects.update_semester(id, changes).await?))
}

async fn delete_semester(
    State(state): State<AppState>,
    _admin: AdminUser,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    state.subjects.delete_semester(id).await?;
    Ok(ok(json!({ "message": "Semester deleted" })))
}

async fn create_subject(
    State(state): State<AppState>,
    AdminUser(actor): AdminUser,
    ApiJson(subject): ApiJson<NewSubject>,
) -> Result<impl IntoResponse, AppError> {
    Ok(created(state.subjects.create_subject(subject, actor.id).await?))
}

async fn update_subject(
    State(state): State<AppState>,
    _admin: AdminUser,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(changes): ApiJson<SubjectChanges>,
) -> Result<impl IntoResponse, AppError> {
    Ok(ok(state.subjects.update_subject(id, changes).await?))
}

async fn delete_subject(
    State(state): State<AppState>,
    _admin: AdminUser,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    state.subjects.delete_subject(id).await?;
    Ok(ok(json!({ "message": "Subject deleted" })))
}
