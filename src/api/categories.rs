use super::auth::{AdminUser, CurrentUser};
use super::extract::{ApiJson, ApiPath, ApiQuery};
use super::documents::parse_type;
use super::response::{created, ok};
use super::{AppError, AppState};
use crate::models::CategoryChanges;
use crate::services::{NewCategoryRequest, ReorderItem};
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
        .route("/subjects/:id/categories", get(list_categories))
        .route("/admin/subjects/:id/categories", post(create_category))
        .route("/admin/categories/reorder", put(reorder_categories))
        .route(
            "/admin/categories/:id",
            put(update_category).delete(delete_category),
        )
}

#[derive(Deserialize)]
struct CategoryQuery {
    #[serde(rename = "type")]
    doc_type: Option<String>,
}

async fn list_categories(
    State(state): State<AppState>,
    _user: CurrentUser,
    ApiPath(subject_id): ApiPath<Uuid>,
    ApiQuery(query): ApiQuery<CategoryQuery>,
) -> Result<impl IntoResponse, AppError> {
    let doc_type = query
        .doc_type
        .as_deref()
        .filter(|value| !value.is_empty())
        .map(parse_type)
        .transpose()?;
    Ok(ok(state.categories.list(subject_id, doc_type).await?))
}

async fn create_category(
    State(state): State<AppState>,
    AdminUser(actor): AdminUser,
    ApiPath(subject_id): ApiPath<Uuid>,
    ApiJson(request): ApiJson<NewCategoryRequest>,
) -> Result<impl IntoResponse, AppError> {
    let category = state.categories.create(subject_id, request, actor.id).await?;
    Ok(created(category))
}

async fn update_category(
    State(state): State<AppState>,
    _admin: AdminUser,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(changes): ApiJson<CategoryChanges>,
) -> Result<impl IntoResponse, AppError> {
    Ok(ok(state.categories.update(id, changes).await?))
}

async fn delete_category(
    State(state): State<AppState>,
    _admin: AdminUser,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let moved = state.categories.delete(id).await?;
    Ok(ok(json!({ "message": "Category deleted", "documents_moved": moved })))
}

#[derive(Deserialize)]
struct ReorderRequest {
    categories: Vec<ReorderItem>,
}

async fn reorder_categories(
    State(state): State<AppState>,
    _admin: AdminUser,
    ApiJson(request): ApiJson<ReorderRequest>,
) -> Result<impl IntoResponse, AppError> {
    let updated = state.categories.reorder(&request.categories).await?;
    Ok(ok(json!({ "updated": updated })))
}
