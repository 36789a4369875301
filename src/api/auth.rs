//! Caller identity forwarded by the authenticating gateway.

use super::AppError;
use crate::models::Role;
use crate::services::Actor;
use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use uuid::Uuid;

pub const USER_ID_HEADER: &str = "x-user-id";
pub const USER_ROLE_HEADER: &str = "x-user-role";

/// Any authenticated caller.
#[derive(Debug, Clone, Copy)]
pub struct CurrentUser(pub Actor);

/// Authenticated caller holding the admin role.
#[derive(Debug, Clone, Copy)]
pub struct AdminUser(pub Actor);

fn header<'a>(parts: &'a Parts, name: &str) -> Option<&'a str> {
    parts.headers.get(name).and_then(|value| value.to_str().ok())
}

#[async_trait]
impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let id = header(parts, USER_ID_HEADER)
            .and_then(|value| value.trim().parse::<Uuid>().ok())
            .ok_or_else(AppError::unauthorized)?;
        let role = match header(parts, USER_ROLE_HEADER) {
            Some(value) => value.parse::<Role>().map_err(|_| AppError::unauthorized())?,
            None => Role::Student,
        };
        Ok(Self(Actor { id, role }))
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for AdminUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let CurrentUser(actor) = CurrentUser::from_request_parts(parts, state).await?;
        if !actor.is_admin() {
            return Err(AppError::forbidden("Admin access required"));
        }
        Ok(Self(actor))
    }
}
