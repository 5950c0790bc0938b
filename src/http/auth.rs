//! Caller identity forwarded by the gateway.
//!
//! Tokens are verified upstream; this service only reads the resolved user id
//! and role from request headers.

use async_trait::async_trait;
use axum::{extract::FromRequestParts, http::request::Parts};
use uuid::Uuid;

use crate::error::AppError;
use crate::service::Caller;

pub const USER_ID_HEADER: &str = "x-user-id";
pub const USER_ROLE_HEADER: &str = "x-user-role";

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for Caller {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let header = |name: &str| parts.headers.get(name).and_then(|v| v.to_str().ok()).map(str::trim);
        let id = header(USER_ID_HEADER).and_then(|v| Uuid::parse_str(v).ok()).ok_or(AppError::Unauthenticated)?;
        let is_admin = header(USER_ROLE_HEADER).is_some_and(|role| role.eq_ignore_ascii_case("admin"));
        Ok(Caller { id, is_admin })
    }
}

/// A caller that must hold the admin role.
#[derive(Clone, Copy, Debug)]
pub struct Admin(pub Caller);

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for Admin {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let caller = Caller::from_request_parts(parts, state).await?;
        if !caller.is_admin {
            return Err(AppError::Forbidden("Chỉ quản trị viên mới có quyền thực hiện thao tác này"));
        }
        Ok(Self(caller))
    }
}

/// Caller for endpoints that also serve guests. No identity header means a
/// guest; a header that is present but malformed is still rejected.
#[derive(Clone, Copy, Debug)]
pub struct OptionalCaller(pub Option<Caller>);

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for OptionalCaller {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        if !parts.headers.contains_key(USER_ID_HEADER) {
            return Ok(Self(None));
        }
        Caller::from_request_parts(parts, state).await.map(|caller| Self(Some(caller)))
    }
}
