//! HTTP client wrapper for interacting with Meilisearch.

use super::SearchIndex;
use super::types::{
    DOCUMENT_SEARCH_LIMIT, DOCUMENTS_INDEX, SUBJECT_SEARCH_LIMIT, SUBJECTS_INDEX, SearchError,
    SearchResults, document_record, eq_filter, subject_record,
};
use crate::models::{Document, Subject};
use async_trait::async_trait;
use reqwest::{Client, Method, StatusCode};
use serde_json::{Value, json};
use uuid::Uuid;

struct IndexSettings {
    uid: &'static str,
    filterable: &'static [&'static str],
    sortable: &'static [&'static str],
    searchable: Option<&'static [&'static str]>,
}

const INDEXES: [IndexSettings; 2] = [
    IndexSettings {
        uid: DOCUMENTS_INDEX,
        filterable: &["subject_id", "mime_type"],
        sortable: &["created_at"],
        searchable: None,
    },
    IndexSettings {
        uid: SUBJECTS_INDEX,
        filterable: &["semester_id", "code"],
        sortable: &["name_cs", "name_en", "created_at"],
        searchable: Some(&["name_cs", "name_en", "code", "description_cs", "description_en"]),
    },
];

/// Lightweight HTTP client for Meilisearch operations.
pub struct MeiliSearchClient {
    pub(crate) client: Client,
    pub(crate) base_url: String,
    pub(crate) api_key: Option<String>,
}

impl MeiliSearchClient {
    /// Construct a client for the given Meilisearch base URL.
    pub fn new(url: &str, api_key: Option<String>) -> Result<Self, SearchError> {
        let client = Client::builder().user_agent("course-portal/0.1").build()?;
        let base_url = normalize_base_url(url).map_err(SearchError::InvalidUrl)?;
        tracing::debug!(
            url = %base_url,
            has_api_key = %api_key.as_deref().map(|value| !value.is_empty()).unwrap_or(false),
            "Initialized Meilisearch HTTP client"
        );
        Ok(Self {
            client,
            base_url,
            api_key,
        })
    }

    /// Create the `documents` and `subjects` indexes when missing and configure their attributes.
    ///
    /// Settings failures are logged and tolerated; only transport errors are returned.
    pub async fn ensure_indexes(&self) -> Result<(), SearchError> {
        for settings in &INDEXES {
            if self.index_exists(settings.uid).await? {
                continue;
            }

            let response = self
                .request(Method::POST, "indexes")
                .json(&json!({ "uid": settings.uid, "primaryKey": "id" }))
                .send()
                .await?;
            if !response.status().is_success() {
                let error = unexpected(response).await;
                tracing::warn!(index = settings.uid, error = %error, "Failed to create search index");
                continue;
            }

            self.update_setting(settings.uid, "filterable-attributes", settings.filterable)
                .await?;
            self.update_setting(settings.uid, "sortable-attributes", settings.sortable)
                .await?;
            if let Some(searchable) = settings.searchable {
                self.update_setting(settings.uid, "searchable-attributes", searchable)
                    .await?;
            }
            tracing::info!(index = settings.uid, "Search index created");
        }
        Ok(())
    }

    async fn index_exists(&self, uid: &str) -> Result<bool, SearchError> {
        let response = self
            .request(Method::GET, &format!("indexes/{uid}"))
            .send()
            .await?;
        match response.status() {
            status if status.is_success() => Ok(true),
            StatusCode::NOT_FOUND => Ok(false),
            _ => {
                let error = unexpected(response).await;
                tracing::error!(index = uid, error = %error, "Index existence check failed");
                Err(error)
            }
        }
    }

    async fn update_setting(
        &self,
        uid: &str,
        setting: &str,
        attributes: &[&str],
    ) -> Result<(), SearchError> {
        let response = self
            .request(Method::PUT, &format!("indexes/{uid}/settings/{setting}"))
            .json(&attributes)
            .send()
            .await?;
        if !response.status().is_success() {
            let error = unexpected(response).await;
            tracing::warn!(index = uid, setting, error = %error, "Failed to update index setting");
        }
        Ok(())
    }

    async fn add_records(&self, uid: &str, records: Vec<Value>) -> Result<(), SearchError> {
        let count = records.len();
        let response = self
            .request(Method::POST, &format!("indexes/{uid}/documents"))
            .query(&[("primaryKey", "id")])
            .json(&records)
            .send()
            .await?;
        self.ensure_success(response, || {
            tracing::debug!(index = uid, records = count, "Records enqueued for indexing");
        })
        .await
    }

    async fn delete_record(&self, uid: &str, id: Uuid) -> Result<(), SearchError> {
        let response = self
            .request(Method::DELETE, &format!("indexes/{uid}/documents/{id}"))
            .send()
            .await?;
        self.ensure_success(response, || {
            tracing::debug!(index = uid, id = %id, "Record deletion enqueued");
        })
        .await
    }

    async fn search(
        &self,
        uid: &str,
        query: &str,
        limit: usize,
        filter: Option<String>,
    ) -> Result<SearchResults, SearchError> {
        let mut body = json!({ "q": query, "limit": limit });
        if let (Some(filter), Some(obj)) = (filter, body.as_object_mut()) {
            obj.insert("filter".into(), Value::String(filter));
        }

        let response = self
            .request(Method::POST, &format!("indexes/{uid}/search"))
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let error = unexpected(response).await;
            tracing::error!(index = uid, error = %error, "Search request failed");
            return Err(error);
        }

        Ok(response.json().await?)
    }

    fn request(&self, method: Method, path: &str) -> reqwest::RequestBuilder {
        let url = format_endpoint(&self.base_url, path);
        let mut req = self.client.request(method, url);
        if let Some(api_key) = &self.api_key
            && !api_key.is_empty()
        {
            req = req.bearer_auth(api_key);
        }
        req
    }

    async fn ensure_success<F>(
        &self,
        response: reqwest::Response,
        on_success: F,
    ) -> Result<(), SearchError>
    where
        F: FnOnce(),
    {
        if response.status().is_success() {
            on_success();
            Ok(())
        } else {
            let error = unexpected(response).await;
            tracing::error!(error = %error, "Search engine request failed");
            Err(error)
        }
    }
}

#[async_trait]
impl SearchIndex for MeiliSearchClient {
    async fn index_document(&self, document: &Document) -> Result<(), SearchError> {
        self.add_records(DOCUMENTS_INDEX, vec![document_record(document)])
            .await
    }

    async fn delete_document(&self, id: Uuid) -> Result<(), SearchError> {
        self.delete_record(DOCUMENTS_INDEX, id).await
    }

    async fn search_documents(
        &self,
        query: &str,
        subject_id: Option<Uuid>,
    ) -> Result<SearchResults, SearchError> {
        let filter = subject_id.map(|id| eq_filter("subject_id", id));
        self.search(DOCUMENTS_INDEX, query, DOCUMENT_SEARCH_LIMIT, filter)
            .await
    }

    async fn index_subject(&self, subject: &Subject) -> Result<(), SearchError> {
        self.add_records(SUBJECTS_INDEX, vec![subject_record(subject)])
            .await
    }

    async fn delete_subject(&self, id: Uuid) -> Result<(), SearchError> {
        self.delete_record(SUBJECTS_INDEX, id).await
    }

    async fn search_subjects(
        &self,
        query: &str,
        semester_id: Option<Uuid>,
    ) -> Result<SearchResults, SearchError> {
        let filter = semester_id.map(|id| eq_filter("semester_id", id));
        self.search(SUBJECTS_INDEX, query, SUBJECT_SEARCH_LIMIT, filter)
            .await
    }
}

async fn unexpected(response: reqwest::Response) -> SearchError {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    SearchError::UnexpectedStatus { status, body }
}

fn normalize_base_url(url: &str) -> Result<String, String> {
    let mut parsed = reqwest::Url::parse(url).map_err(|err| err.to_string())?;
    let path = parsed.path().trim_end_matches('/').to_string();
    parsed.set_path(&path);
    Ok(parsed.to_string())
}

fn format_endpoint(base: &str, path: &str) -> String {
    let base = base.trim_end_matches('/');
    let path = path.trim_start_matches('/');
    format!("{base}/{path}")
}
