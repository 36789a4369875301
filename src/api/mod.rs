//! HTTP surface of the course portal.
//!
//! Every endpoint except the operational ones lives under `/api/v1` and answers with the
//! `{"success": ..., "data" | "error": ...}` envelope from [`response`]. Callers are identified by
//! the gateway-supplied headers read in [`auth`].
//!
//! - `/health` – Database liveness probe.
//! - `/metrics` – Ingestion and removal counters.

mod auth;
mod catalog;
mod categories;
mod community;
mod documents;
mod extract;
mod multipart;
mod qa;
pub mod response;

use crate::db::Repository;
use crate::extraction::{MAX_UPLOAD_BYTES, TextExtractor};
use crate::metrics::PortalMetrics;
use crate::search::SearchIndex;
use crate::services::{
    ActivityRecorder, CategoryPolicy, DocumentService, FavoriteService, QaService, RatingService,
    SubjectService,
};
use crate::storage::ObjectStore;
use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
};
use serde_json::json;
use std::sync::Arc;

pub use auth::{AdminUser, CurrentUser, USER_ID_HEADER, USER_ROLE_HEADER};
pub use response::AppError;

/// Room left in a request body for multipart framing and text fields next to the file.
const MULTIPART_OVERHEAD: usize = 1024 * 1024;

/// Coordinators shared by every handler.
#[derive(Clone)]
pub struct AppState {
    pub documents: DocumentService,
    pub categories: CategoryPolicy,
    pub subjects: SubjectService,
    pub qa: QaService,
    pub ratings: RatingService,
    pub favorites: FavoriteService,
    pub activity: ActivityRecorder,
    repo: Arc<dyn Repository>,
    metrics: Arc<PortalMetrics>,
}

impl AppState {
    /// Wire every coordinator to the given collaborators.
    pub fn new(
        repo: Arc<dyn Repository>,
        store: Arc<dyn ObjectStore>,
        search: Arc<dyn SearchIndex>,
        extractor: Arc<dyn TextExtractor>,
        metrics: Arc<PortalMetrics>,
    ) -> Self {
        let documents = DocumentService::new(
            repo.clone(),
            store,
            search.clone(),
            extractor,
            metrics.clone(),
        );
        Self {
            categories: CategoryPolicy::new(repo.clone()),
            subjects: SubjectService::new(repo.clone(), search, metrics.clone()),
            qa: QaService::new(repo.clone(), documents.clone()),
            ratings: RatingService::new(repo.clone()),
            favorites: FavoriteService::new(repo.clone()),
            activity: ActivityRecorder::new(repo.clone(), metrics.clone()),
            documents,
            repo,
            metrics,
        }
    }
}

/// Build the HTTP router.
pub fn create_router(state: AppState) -> Router {
    let api = Router::new()
        .merge(catalog::routes())
        .merge(documents::routes())
        .merge(categories::routes())
        .merge(qa::routes())
        .merge(community::routes());

    Router::new()
        .route("/health", get(health))
        .route("/metrics", get(metrics))
        .nest("/api/v1", api)
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES + MULTIPART_OVERHEAD))
        .with_state(state)
}

async fn health(State(state): State<AppState>) -> impl IntoResponse {
    match state.repo.ping().await {
        Ok(()) => (
            StatusCode::OK,
            Json(json!({
                "status": "healthy",
                "database": "ok",
                "service": env!("CARGO_PKG_NAME"),
                "version": env!("CARGO_PKG_VERSION"),
            })),
        ),
        Err(err) => {
            tracing::error!(error = %err, "Health check failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({ "status": "unhealthy", "database": "unreachable" })),
            )
        }
    }
}

async fn metrics(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.metrics.snapshot())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::DocumentType;
    use crate::testing::Harness;
    use axum::{
        body::{Body, to_bytes},
        http::{Method, Request},
    };
    use serde_json::Value;
    use std::sync::atomic::Ordering;
    use tower::ServiceExt;
    use uuid::Uuid;

    const BOUNDARY: &str = "portal-test-boundary";

    struct Caller {
        id: Uuid,
        role: &'static str,
    }

    impl Caller {
        fn student() -> Self {
            Self {
                id: Uuid::new_v4(),
                role: "student",
            }
        }

        fn admin() -> Self {
            Self {
                id: Uuid::new_v4(),
                role: "admin",
            }
        }
    }

    fn multipart_body(fields: &[(&str, &str)], file: Option<(&str, &str, &[u8])>) -> Vec<u8> {
        let mut body = Vec::new();
        for (name, value) in fields {
            body.extend_from_slice(
                format!(
                    "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
                )
                .as_bytes(),
            );
        }
        if let Some((file_name, content_type, bytes)) = file {
            body.extend_from_slice(
                format!(
                    "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{file_name}\"\r\nContent-Type: {content_type}\r\n\r\n"
                )
                .as_bytes(),
            );
            body.extend_from_slice(bytes);
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
        body
    }

    async fn send(
        harness: &Harness,
        method: Method,
        uri: &str,
        caller: Option<&Caller>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(caller) = caller {
            builder = builder
                .header(USER_ID_HEADER, caller.id.to_string())
                .header(USER_ROLE_HEADER, caller.role);
        }
        let request = match body {
            Some(json) => builder
                .header("content-type", "application/json")
                .body(Body::from(json.to_string())),
            None => builder.body(Body::empty()),
        }
        .expect("request");
        into_json(harness, request).await
    }

    async fn upload(
        harness: &Harness,
        uri: &str,
        caller: &Caller,
        fields: &[(&str, &str)],
        file: Option<(&str, &str, &[u8])>,
    ) -> (StatusCode, Value) {
        let request = Request::builder()
            .method(Method::POST)
            .uri(uri)
            .header(USER_ID_HEADER, caller.id.to_string())
            .header(USER_ROLE_HEADER, caller.role)
            .header(
                "content-type",
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(multipart_body(fields, file)))
            .expect("request");
        into_json(harness, request).await
    }

    async fn into_json(harness: &Harness, request: Request<Body>) -> (StatusCode, Value) {
        let response = create_router(harness.state())
            .oneshot(request)
            .await
            .expect("router response");
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body bytes");
        let json = serde_json::from_slice(&body).unwrap_or(Value::Null);
        (status, json)
    }

    #[tokio::test]
    async fn upload_pdf_returns_created_document() {
        let harness = Harness::new();
        let subject = harness.repo.seed_subject();
        let caller = Caller::student();

        let (status, body) = upload(
            &harness,
            &format!("/api/v1/subjects/{}/documents", subject.id),
            &caller,
            &[],
            Some(("notes.pdf", "application/pdf", b"%PDF-1.7 body")),
        )
        .await;

        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["success"], true);
        let data = &body["data"];
        assert_eq!(data["mime_type"], "application/pdf");
        assert_eq!(data["original_name"], "notes.pdf");
        assert_eq!(data["type"], "other");
        assert_eq!(data["uploaded_by"], caller.id.to_string());
        assert_eq!(data["is_favorite"], false);
        assert_eq!(harness.store.len(), 1);
    }

    #[tokio::test]
    async fn upload_honours_type_field() {
        let harness = Harness::new();
        let subject = harness.repo.seed_subject();

        let (status, body) = upload(
            &harness,
            &format!("/api/v1/subjects/{}/documents", subject.id),
            &Caller::student(),
            &[("type", "seminar")],
            Some(("cv1.txt", "text/plain", b"hello")),
        )
        .await;

        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["data"]["type"], "seminar");
        let sentinel = harness.repo.categories_of(subject.id, DocumentType::Seminar);
        assert_eq!(body["data"]["category_id"], sentinel[0].id.to_string());
    }

    #[tokio::test]
    async fn upload_rejects_zip_without_side_effects() {
        let harness = Harness::new();
        let subject = harness.repo.seed_subject();

        let (status, body) = upload(
            &harness,
            &format!("/api/v1/subjects/{}/documents", subject.id),
            &Caller::student(),
            &[],
            Some(("archive.zip", "application/zip", b"PK")),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "UNSUPPORTED_FILE_TYPE");
        assert_eq!(body["error"]["message"], "Unsupported file type");
        assert_eq!(harness.store.len(), 0);
        assert!(harness.repo.documents().is_empty());
    }

    #[tokio::test]
    async fn upload_without_file_is_rejected() {
        let harness = Harness::new();
        let subject = harness.repo.seed_subject();

        let (status, body) = upload(
            &harness,
            &format!("/api/v1/subjects/{}/documents", subject.id),
            &Caller::student(),
            &[("type", "lecture")],
            None,
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn requests_without_identity_are_unauthorized() {
        let harness = Harness::new();
        let (status, body) = send(&harness, Method::GET, "/api/v1/semesters", None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"]["code"], "UNAUTHORIZED");
    }

    #[tokio::test]
    async fn stranger_delete_is_forbidden() {
        let harness = Harness::new();
        let subject = harness.repo.seed_subject();
        let owner = Caller::student();
        let (_, body) = upload(
            &harness,
            &format!("/api/v1/subjects/{}/documents", subject.id),
            &owner,
            &[],
            Some(("notes.pdf", "application/pdf", b"%PDF")),
        )
        .await;
        let id = body["data"]["id"].as_str().unwrap().to_string();
        let uri = format!("/api/v1/documents/{id}");

        let (status, _) = send(&harness, Method::DELETE, &uri, Some(&Caller::student()), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(harness.store.len(), 1);

        let (status, body) = send(&harness, Method::DELETE, &uri, Some(&owner), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        assert_eq!(harness.store.len(), 0);

        let (status, _) = send(&harness, Method::GET, &uri, Some(&owner), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn category_admin_routes_require_admin() {
        let harness = Harness::new();
        let subject = harness.repo.seed_subject();
        let uri = format!("/api/v1/admin/subjects/{}/categories", subject.id);
        let payload = serde_json::json!({ "type": "lecture", "name_cs": "Týden 1", "name_en": "Week 1" });

        let (status, _) = send(
            &harness,
            Method::POST,
            &uri,
            Some(&Caller::student()),
            Some(payload.clone()),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, body) = send(&harness, Method::POST, &uri, Some(&Caller::admin()), Some(payload.clone())).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["data"]["order_index"], 0);

        let (status, body) = send(&harness, Method::POST, &uri, Some(&Caller::admin()), Some(payload)).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["error"]["code"], "CONFLICT");

        let (status, body) = send(
            &harness,
            Method::GET,
            &format!("/api/v1/subjects/{}/categories?type=lecture", subject.id),
            Some(&Caller::student()),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let names: Vec<_> = body["data"]
            .as_array()
            .unwrap()
            .iter()
            .map(|c| c["name_en"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(names, ["Week 1", "Unassigned"]);
    }

    #[tokio::test]
    async fn unknown_category_type_is_rejected() {
        let harness = Harness::new();
        let subject = harness.repo.seed_subject();
        let (status, body) = send(
            &harness,
            Method::GET,
            &format!("/api/v1/subjects/{}/categories?type=slides", subject.id),
            Some(&Caller::student()),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn malformed_document_id_uses_error_envelope() {
        let harness = Harness::new();
        let (status, body) = send(
            &harness,
            Method::GET,
            "/api/v1/documents/not-a-uuid",
            Some(&Caller::student()),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);
        assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn bogus_category_type_in_body_is_400_with_envelope() {
        let harness = Harness::new();
        let subject = harness.repo.seed_subject();
        let (status, body) = send(
            &harness,
            Method::POST,
            &format!("/api/v1/admin/subjects/{}/categories", subject.id),
            Some(&Caller::admin()),
            Some(serde_json::json!({ "type": "bogus", "name_cs": "Týden 1" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);
        assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
        assert!(harness.repo.categories_of(subject.id, DocumentType::Lecture).is_empty());
    }

    #[tokio::test]
    async fn mistyped_rating_is_400_not_422() {
        let harness = Harness::new();
        let subject = harness.repo.seed_subject();
        let teacher = harness.repo.seed_teacher(subject.id);
        let (status, body) = send(
            &harness,
            Method::PUT,
            &format!("/api/v1/teachers/{}/rating", teacher.id),
            Some(&Caller::student()),
            Some(serde_json::json!({ "rating": "five" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn subject_create_with_unknown_semester() {
        let harness = Harness::new();
        let (status, body) = send(
            &harness,
            Method::POST,
            "/api/v1/admin/subjects",
            Some(&Caller::admin()),
            Some(serde_json::json!({ "semester_id": Uuid::new_v4(), "name_cs": "Fyzika" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "INVALID_SEMESTER");
    }

    #[tokio::test]
    async fn rating_upsert_reports_created_then_ok() {
        let harness = Harness::new();
        let subject = harness.repo.seed_subject();
        let teacher = harness.repo.seed_teacher(subject.id);
        let caller = Caller::student();
        let uri = format!("/api/v1/teachers/{}/rating", teacher.id);

        let (status, _) = send(&harness, Method::PUT, &uri, Some(&caller), Some(serde_json::json!({ "rating": 4 }))).await;
        assert_eq!(status, StatusCode::CREATED);
        let (status, body) = send(&harness, Method::PUT, &uri, Some(&caller), Some(serde_json::json!({ "rating": 5 }))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["rating"], 5);

        let (status, body) = send(
            &harness,
            Method::GET,
            &format!("/api/v1/teachers/{}/ratings", teacher.id),
            Some(&caller),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["total_ratings"], 1);
        assert_eq!(body["data"]["user_rating"], 5);
        assert_eq!(body["data"]["rating_distribution"]["1"], 0);
    }

    #[tokio::test]
    async fn favorite_toggle_round_trips() {
        let harness = Harness::new();
        let subject = harness.repo.seed_subject();
        let caller = Caller::student();
        let uri = format!("/api/v1/subjects/{}/favorite", subject.id);

        let (_, first) = send(&harness, Method::POST, &uri, Some(&caller), None).await;
        assert_eq!(first["data"]["is_favorite"], true);
        let (_, favorites) = send(&harness, Method::GET, "/api/v1/favorites", Some(&caller), None).await;
        assert_eq!(favorites["data"]["subjects"].as_array().unwrap().len(), 1);
        let (_, second) = send(&harness, Method::POST, &uri, Some(&caller), None).await;
        assert_eq!(second["data"]["is_favorite"], false);
    }

    #[tokio::test]
    async fn document_favorite_toggle_round_trips() {
        let harness = Harness::new();
        let subject = harness.repo.seed_subject();
        let caller = Caller::student();
        let (_, uploaded) = upload(
            &harness,
            &format!("/api/v1/subjects/{}/documents", subject.id),
            &caller,
            &[],
            Some(("notes.pdf", "application/pdf", b"%PDF")),
        )
        .await;
        let id = uploaded["data"]["id"].as_str().unwrap().to_string();
        let uri = format!("/api/v1/documents/{id}/favorite");

        let (status, first) = send(&harness, Method::POST, &uri, Some(&caller), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(first["data"]["is_favorite"], true);
        let (_, favorites) = send(&harness, Method::GET, "/api/v1/favorites", Some(&caller), None).await;
        assert_eq!(favorites["data"]["documents"].as_array().unwrap().len(), 1);
        let (_, second) = send(&harness, Method::POST, &uri, Some(&caller), None).await;
        assert_eq!(second["data"]["is_favorite"], false);
    }

    #[tokio::test]
    async fn subject_search_returns_hits() {
        let harness = Harness::new();
        harness
            .search
            .set_hits(vec![serde_json::json!({ "id": "abc", "name_cs": "Fyzika" })]);

        let (status, body) = send(
            &harness,
            Method::GET,
            "/api/v1/subjects/search?q=fyz",
            Some(&Caller::student()),
            None,
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"][0]["name_cs"], "Fyzika");
        assert_eq!(harness.search.queries(), vec![("fyz".to_string(), None)]);
    }

    #[tokio::test]
    async fn search_failure_is_internal_error() {
        let harness = Harness::new();
        harness.search.fail.store(true, Ordering::SeqCst);
        let (status, body) = send(
            &harness,
            Method::GET,
            "/api/v1/search?q=x",
            Some(&Caller::student()),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"]["code"], "INTERNAL_ERROR");
    }

    #[tokio::test]
    async fn health_reports_database_state() {
        let harness = Harness::new();
        let (status, body) = send(&harness, Method::GET, "/health", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");

        harness.repo.fail_ping.store(true, Ordering::SeqCst);
        let (status, body) = send(&harness, Method::GET, "/health", None, None).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["database"], "unreachable");
    }

    #[tokio::test]
    async fn metrics_expose_counters() {
        let harness = Harness::new();
        harness.metrics.record_upload();
        let (status, body) = send(&harness, Method::GET, "/metrics", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["documents_uploaded"], 1);
    }
}
