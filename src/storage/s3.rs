//! Path-style S3 REST client (MinIO compatible).

use super::sigv4::{self, Credentials, encode_segment};
use super::{Blob, ObjectStore, ObjectStoreError, validate_key};
use crate::config::S3Config;
use async_trait::async_trait;
use reqwest::{Client, Method, StatusCode, Url, header::CONTENT_TYPE};
use time::OffsetDateTime;

/// Object store backed by an S3-compatible bucket.
pub struct S3ObjectStore {
    client: Client,
    endpoint: String,
    bucket: String,
    region: String,
    credentials: Credentials,
}

impl S3ObjectStore {
    /// Build a client for the configured endpoint and bucket.
    pub fn new(config: &S3Config) -> Result<Self, ObjectStoreError> {
        let client = Client::builder().user_agent("course-portal/0.1").build()?;
        let endpoint = normalize_base_url(&config.endpoint).map_err(ObjectStoreError::InvalidUrl)?;
        tracing::debug!(
            endpoint = %endpoint,
            bucket = %config.bucket,
            region = %config.region,
            "Initialized S3 object store client"
        );
        Ok(Self {
            client,
            endpoint,
            bucket: config.bucket.clone(),
            region: config.region.clone(),
            credentials: Credentials {
                access_key: config.access_key.clone(),
                secret_key: config.secret_key.clone(),
            },
        })
    }

    /// Create the bucket when it does not exist yet.
    pub async fn ensure_bucket(&self) -> Result<(), ObjectStoreError> {
        let response = self.send(Method::HEAD, None, Vec::new(), None).await?;
        match response.status() {
            status if status.is_success() => Ok(()),
            StatusCode::NOT_FOUND => {
                tracing::info!(bucket = %self.bucket, "Creating bucket");
                let response = self.send(Method::PUT, None, Vec::new(), None).await?;
                // a concurrent creator wins the race; the bucket exists either way
                if response.status().is_success() || response.status() == StatusCode::CONFLICT {
                    Ok(())
                } else {
                    Err(unexpected(response).await)
                }
            }
            _ => Err(unexpected(response).await),
        }
    }

    async fn send(
        &self,
        method: Method,
        key: Option<&str>,
        body: Vec<u8>,
        content_type: Option<&str>,
    ) -> Result<reqwest::Response, ObjectStoreError> {
        let url = self.object_url(key)?;
        let content_sha256 = sigv4::payload_hash(&body);
        let signed = sigv4::sign(
            &self.credentials,
            &self.region,
            &method,
            &url,
            &content_sha256,
            OffsetDateTime::now_utc(),
        )?;

        let mut request = self
            .client
            .request(method, url)
            .header("authorization", signed.authorization)
            .header("x-amz-date", signed.amz_date)
            .header("x-amz-content-sha256", signed.content_sha256);
        if let Some(content_type) = content_type {
            request = request.header(CONTENT_TYPE, content_type);
        }
        if !body.is_empty() {
            request = request.body(body);
        }
        Ok(request.send().await?)
    }

    fn object_url(&self, key: Option<&str>) -> Result<Url, ObjectStoreError> {
        let mut path = format!("/{}", encode_segment(&self.bucket));
        if let Some(key) = key {
            validate_key(key)?;
            for segment in key.split('/') {
                path.push('/');
                path.push_str(&encode_segment(segment));
            }
        }
        Url::parse(&format!("{}{}", self.endpoint, path))
            .map_err(|err| ObjectStoreError::InvalidUrl(err.to_string()))
    }
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    async fn put(&self, key: &str, bytes: &[u8], content_type: &str) -> Result<(), ObjectStoreError> {
        let response = self
            .send(Method::PUT, Some(key), bytes.to_vec(), Some(content_type))
            .await?;
        if response.status().is_success() {
            tracing::debug!(storage_key = key, size = bytes.len(), "Object stored");
            Ok(())
        } else {
            let error = unexpected(response).await;
            tracing::error!(storage_key = key, error = %error, "S3 put failed");
            Err(error)
        }
    }

    async fn get(&self, key: &str) -> Result<Blob, ObjectStoreError> {
        let response = self.send(Method::GET, Some(key), Vec::new(), None).await?;
        match response.status() {
            status if status.is_success() => {
                let content_type = response
                    .headers()
                    .get(CONTENT_TYPE)
                    .and_then(|value| value.to_str().ok())
                    .map(str::to_string);
                let bytes = response.bytes().await?.to_vec();
                Ok(Blob {
                    bytes,
                    content_type,
                })
            }
            StatusCode::NOT_FOUND => Err(ObjectStoreError::NotFound(key.to_string())),
            _ => Err(unexpected(response).await),
        }
    }

    async fn delete(&self, key: &str) -> Result<(), ObjectStoreError> {
        let response = self.send(Method::DELETE, Some(key), Vec::new(), None).await?;
        match response.status() {
            status if status.is_success() => Ok(()),
            StatusCode::NOT_FOUND => Ok(()),
            _ => Err(unexpected(response).await),
        }
    }
}

async fn unexpected(response: reqwest::Response) -> ObjectStoreError {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    ObjectStoreError::UnexpectedStatus { status, body }
}

fn normalize_base_url(url: &str) -> Result<String, String> {
    let parsed = Url::parse(url).map_err(|err| err.to_string())?;
    if parsed.host_str().is_none() {
        return Err(format!("missing host in {url}"));
    }
    Ok(parsed.as_str().trim_end_matches('/').to_string())
}
