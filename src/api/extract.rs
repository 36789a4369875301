//! Request extractors that reject with the JSON error envelope.
//!
//! axum's own `Path`, `Query`, `Json` and `Multipart` answer malformed input with a plain-text
//! body and, for JSON, a 422 status. These wrappers delegate to them and turn every rejection
//! into a 400 `VALIDATION_ERROR`.

use super::AppError;
use axum::{
    Json, async_trait,
    extract::{FromRequest, FromRequestParts, Multipart, Path, Query, Request},
    http::request::Parts,
    response::IntoResponse,
};
use serde::de::DeserializeOwned;

/// Path parameters deserialized into `T`.
#[derive(Debug)]
pub(super) struct ApiPath<T>(pub T);

/// Query string deserialized into `T`.
#[derive(Debug)]
pub(super) struct ApiQuery<T>(pub T);

/// JSON request body deserialized into `T`.
#[derive(Debug)]
pub(super) struct ApiJson<T>(pub T);

/// A `multipart/form-data` body.
pub(super) struct ApiMultipart(pub Multipart);

fn rejected(rejection: impl IntoResponse + std::fmt::Display) -> AppError {
    let message = rejection.to_string();
    let status = rejection.into_response().status();
    tracing::debug!(%status, %message, "Request rejected by extractor");
    AppError::bad_request(message)
}

#[async_trait]
impl<S, T> FromRequestParts<S> for ApiPath<T>
where
    T: DeserializeOwned + Send,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        match Path::<T>::from_request_parts(parts, state).await {
            Ok(Path(value)) => Ok(Self(value)),
            Err(rejection) => Err(rejected(rejection)),
        }
    }
}

#[async_trait]
impl<S, T> FromRequestParts<S> for ApiQuery<T>
where
    T: DeserializeOwned + Send,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        match Query::<T>::from_request_parts(parts, state).await {
            Ok(Query(value)) => Ok(Self(value)),
            Err(rejection) => Err(rejected(rejection)),
        }
    }
}

#[async_trait]
impl<S, T> FromRequest<S> for ApiJson<T>
where
    T: DeserializeOwned + Send,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(Self(value)),
            Err(rejection) => Err(rejected(rejection)),
        }
    }
}

#[async_trait]
impl<S> FromRequest<S> for ApiMultipart
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        Multipart::from_request(req, state)
            .await
            .map(Self)
            .map_err(rejected)
    }
}
