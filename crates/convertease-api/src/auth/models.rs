use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use convertease_core::models::ClientIdentity;
use convertease_core::AppError;
use std::ops::Deref;

use crate::error::HttpAppError;

/// The authenticated client, placed in request extensions by
/// [`auth_middleware`](super::auth_middleware).
///
/// Extracted from request parts so it can sit next to `Multipart`.
#[derive(Debug, Clone)]
pub struct ClientContext(pub ClientIdentity);

impl Deref for ClientContext {
    type Target = ClientIdentity;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl<S> FromRequestParts<S> for ClientContext
where
    S: Send + Sync,
{
    type Rejection = HttpAppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<ClientIdentity>()
            .cloned()
            .map(ClientContext)
            .ok_or_else(|| {
                HttpAppError(AppError::Unauthorized(
                    "Missing client context".to_string(),
                ))
            })
    }
}
