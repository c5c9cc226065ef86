use axum::{extract::FromRequestParts, http::header, http::request::Parts};

use crate::error::AppError;
use crate::ingest::IngestError;
use crate::state::AppState;

/// Caller verified from the `Authorization: Bearer <token>` header.
///
/// Runs before the body is read, so an unauthenticated request never
/// reaches the ingestion pipeline.
pub struct AuthUser {
    pub user_id: String,
    pub email: Option<String>,
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or(IngestError::Unauthorized)?;

        let identity = state.identity.verify(token).await?;

        Ok(AuthUser {
            user_id: identity.user_id,
            email: identity.email,
        })
    }
}
