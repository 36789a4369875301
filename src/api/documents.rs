use super::auth::CurrentUser;
use super::extract::{ApiJson, ApiMultipart, ApiPath, ApiQuery};
use super::multipart::read_form;
use super::response::{created, ok};
use super::{AppError, AppState};
use crate::models::DocumentType;
use crate::services::UploadRequest;
use axum::{
    Router,
    extract::State,
    http::{HeaderValue, header},
    response::{IntoResponse, Response},
    routing::{get, put},
};
use serde::Deserialize;
use uuid::Uuid;

pub(super) fn routes() -> Router<AppState> {
    Router::new()
        .route(
            "/subjects/:id/documents",
            get(list_documents).post(upload_document),
        )
        .route("/documents/:id", get(get_document).delete(delete_document))
        .route("/documents/:id/download", get(download_document))
        .route("/documents/:id/category", put(reassign_category))
        .route("/search", get(search_documents))
}

pub(super) fn parse_type(value: &str) -> Result<DocumentType, AppError> {
    value
        .parse()
        .map_err(|_| AppError::bad_request(format!("Invalid document type '{value}'")))
}

async fn upload_document(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
    ApiPath(subject_id): ApiPath<Uuid>,
    ApiMultipart(mut multipart): ApiMultipart,
) -> Result<impl IntoResponse, AppError> {
    let form = read_form(&mut multipart).await?;
    let doc_type = form.field("type").map(parse_type).transpose()?.unwrap_or_default();
    let category_id = form
        .field("category_id")
        .map(|value| {
            value
                .parse::<Uuid>()
                .map_err(|_| AppError::bad_request("Invalid category_id"))
        })
        .transpose()?;
    let file = form
        .file
        .ok_or_else(|| AppError::bad_request("No file uploaded"))?;

    let document = state
        .documents
        .upload(UploadRequest {
            subject_id,
            uploader: actor.id,
            original_name: file.original_name,
            mime_type: file.mime_type,
            bytes: file.bytes,
            doc_type,
            category_id,
        })
        .await?;
    Ok(created(document))
}

#[derive(Deserialize)]
struct PageQuery {
    limit: Option<i64>,
    offset: Option<i64>,
}

async fn list_documents(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
    ApiPath(subject_id): ApiPath<Uuid>,
    ApiQuery(page): ApiQuery<PageQuery>,
) -> Result<impl IntoResponse, AppError> {
    let documents = state
        .documents
        .list(subject_id, actor.id, page.limit, page.offset)
        .await?;
    Ok(ok(documents))
}

async fn get_document(
    State(state): State<AppState>,
    _user: CurrentUser,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    Ok(ok(state.documents.get(id).await?))
}

async fn delete_document(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    state.documents.remove(id, actor).await?;
    Ok(ok(serde_json::json!({ "message": "Document deleted" })))
}

/// `Content-Disposition` value carrying an ASCII fallback and the exact UTF-8 name.
fn attachment_disposition(original_name: &str) -> HeaderValue {
    let fallback: String = original_name
        .chars()
        .map(|c| {
            if (c.is_ascii_graphic() && c != '"' && c != '\\') || c == ' ' {
                c
            } else {
                '_'
            }
        })
        .collect();
    let mut encoded = String::with_capacity(original_name.len());
    for byte in original_name.bytes() {
        if byte.is_ascii_alphanumeric() || b"-._~".contains(&byte) {
            encoded.push(byte as char);
        } else {
            encoded.push_str(&format!("%{byte:02X}"));
        }
    }
    HeaderValue::from_str(&format!(
        "attachment; filename=\"{fallback}\"; filename*=UTF-8''{encoded}"
    ))
    .unwrap_or_else(|_| HeaderValue::from_static("attachment"))
}

async fn download_document(
    State(state): State<AppState>,
    _user: CurrentUser,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<Response, AppError> {
    let (document, blob) = state.documents.download(id).await?;
    let content_type = HeaderValue::from_str(&document.mime_type)
        .unwrap_or_else(|_| HeaderValue::from_static("application/octet-stream"));
    Ok((
        [
            (header::CONTENT_TYPE, content_type),
            (
                header::CONTENT_DISPOSITION,
                attachment_disposition(&document.original_name),
            ),
        ],
        blob.bytes,
    )
        .into_response())
}

#[derive(Deserialize)]
struct ReassignRequest {
    category_id: Uuid,
}

async fn reassign_category(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(request): ApiJson<ReassignRequest>,
) -> Result<impl IntoResponse, AppError> {
    let document = state
        .documents
        .reassign_category(id, request.category_id, actor)
        .await?;
    Ok(ok(document))
}

#[derive(Deserialize)]
struct SearchQuery {
    #[serde(default)]
    q: String,
    subject_id: Option<Uuid>,
}

async fn search_documents(
    State(state): State<AppState>,
    _user: CurrentUser,
    ApiQuery(query): ApiQuery<SearchQuery>,
) -> Result<impl IntoResponse, AppError> {
    let results = state.documents.search(&query.q, query.subject_id).await?;
    Ok(ok(results.hits))
}
