//! Request extractors: bearer authentication and validated JSON bodies.

use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::{FromRequest, FromRequestParts, Request};
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use axum::Json;
use domain::User;
use serde::de::DeserializeOwned;
use store::{Store, UserStore};

use crate::error::ApiError;
use crate::state::AppState;

/// The user behind the request's `Authorization: Bearer <token>` header.
#[derive(Debug, Clone)]
pub struct AuthUser(pub User);

impl<S: Store> FromRequestParts<Arc<AppState<S>>> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState<S>>,
    ) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .ok_or_else(|| {
                ApiError::Unauthorized("Please login to access this resource".to_string())
            })?;

        let user = state
            .store
            .find_by_token(token)
            .await?
            .ok_or_else(|| ApiError::Unauthorized("Invalid or expired token".to_string()))?;
        Ok(AuthUser(user))
    }
}

/// An authenticated Admin or Owner.
#[derive(Debug, Clone)]
pub struct AdminUser(pub User);

impl<S: Store> FromRequestParts<Arc<AppState<S>>> for AdminUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState<S>>,
    ) -> Result<Self, Self::Rejection> {
        let AuthUser(user) = AuthUser::from_request_parts(parts, state).await?;
        if !user.is_privileged() {
            return Err(ApiError::Forbidden(format!(
                "Role ({}) is not allowed to access this resource",
                user.role.as_str()
            )));
        }
        Ok(AdminUser(user))
    }
}

/// `Json<T>` whose rejections render as `Validation` errors.
#[derive(Debug, Clone)]
pub struct ValidJson<T>(pub T);

impl<T, St> FromRequest<St> for ValidJson<T>
where
    T: DeserializeOwned,
    St: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &St) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|rejection: JsonRejection| ApiError::BadRequest(rejection.body_text()))?;
        Ok(ValidJson(value))
    }
}
