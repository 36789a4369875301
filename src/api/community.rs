//! Teacher ratings, favorites, and the activity feed.

use super::auth::CurrentUser;
use super::extract::{ApiJson, ApiPath, ApiQuery};
use super::response::{ApiResponse, created, ok};
use super::{AppError, AppState};
use crate::models::FavoriteTarget;
use axum::{
    Json, Router,
    extract::State,
    response::{IntoResponse, Response},
    routing::{get, post, put},
};
use serde::Deserialize;
use serde_json::{Value, json};
use uuid::Uuid;

pub(super) fn routes() -> Router<AppState> {
    Router::new()
        .route("/teachers/:id/rating", put(rate_teacher).delete(delete_rating))
        .route("/teachers/:id/ratings", get(teacher_ratings))
        .route("/subjects/:id/favorite", post(toggle_subject_favorite))
        .route("/documents/:id/favorite", post(toggle_document_favorite))
        .route("/favorites", get(list_favorites))
        .route("/activities", get(recent_activities))
}

#[derive(Deserialize)]
struct RatingRequest {
    rating: i32,
}

async fn rate_teacher(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
    ApiPath(teacher_id): ApiPath<Uuid>,
    ApiJson(request): ApiJson<RatingRequest>,
) -> Result<Response, AppError> {
    let outcome = state
        .ratings
        .rate(teacher_id, actor.id, request.rating)
        .await?;
    Ok(if outcome.created {
        created(outcome.rating).into_response()
    } else {
        ok(outcome.rating).into_response()
    })
}

async fn delete_rating(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
    ApiPath(teacher_id): ApiPath<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    state.ratings.remove(teacher_id, actor.id).await?;
    Ok(ok(json!({ "message": "Rating deleted" })))
}

async fn teacher_ratings(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
    ApiPath(teacher_id): ApiPath<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    Ok(ok(state.ratings.summary(teacher_id, actor.id).await?))
}

async fn toggle(
    state: &AppState,
    user_id: Uuid,
    target: FavoriteTarget,
) -> Result<Json<ApiResponse<Value>>, AppError> {
    let is_favorite = state.favorites.toggle(user_id, target).await?;
    Ok(ok(json!({ "is_favorite": is_favorite })))
}

async fn toggle_subject_favorite(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    toggle(&state, actor.id, FavoriteTarget::Subject(id)).await
}

async fn toggle_document_favorite(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    toggle(&state, actor.id, FavoriteTarget::Document(id)).await
}

async fn list_favorites(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
) -> Result<impl IntoResponse, AppError> {
    Ok(ok(state.favorites.list(actor.id).await?))
}

#[derive(Deserialize)]
struct FeedQuery {
    limit: Option<i64>,
}

async fn recent_activities(
    State(state): State<AppState>,
    _user: CurrentUser,
    ApiQuery(query): ApiQuery<FeedQuery>,
) -> Result<impl IntoResponse, AppError> {
    Ok(ok(state.activity.recent(query.limit).await?))
}
