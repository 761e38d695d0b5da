//! Request extractors.

use axum::{extract::FromRequestParts, http::request::Parts};
use comunimapp_common::AppError;
use comunimapp_db::entities::User;

/// Authenticated user extractor.
///
/// Reads the user set by the auth middleware; absence means the request
/// carried no valid bearer token.
#[derive(Debug, Clone)]
pub struct AuthUser(pub User);

impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<User>()
            .cloned()
            .map(AuthUser)
            .ok_or(AppError::Unauthorized)
    }
}
