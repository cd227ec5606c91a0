//! Request-id propagation and the session identity gate.

use anyhow::anyhow;
use axum::async_trait;
use axum::extract::{FromRequestParts, Request};
use axum::http::request::Parts;
use axum::http::HeaderValue;
use axum::middleware::Next;
use axum::response::Response;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::SessionUser;
use crate::AppState;

pub const REQUEST_ID_HEADER: &str = "x-request-id";
pub const SESSION_TOKEN_HEADER: &str = "x-session-token";

/// Ensure every request and response carries an `x-request-id`,
/// generating one when the caller didn't.
pub async fn request_id_middleware(mut req: Request, next: Next) -> Response {
    let request_id = req
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|h| h.to_str().ok())
        .map(|s| s.to_string())
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    if let Ok(header_value) = HeaderValue::from_str(&request_id) {
        req.headers_mut().insert(REQUEST_ID_HEADER, header_value);
    }

    let mut response = next.run(req).await;

    if let Ok(header_value) = HeaderValue::from_str(&request_id) {
        response
            .headers_mut()
            .insert(REQUEST_ID_HEADER, header_value);
    }

    response
}

/// The session gate: resolves the persisted user record behind the
/// caller's session token. Checkout operations cannot proceed without
/// it; absence rejects with a login prompt before any state changes.
#[derive(Debug, Clone)]
pub struct SessionIdentity {
    pub token: String,
    pub user: SessionUser,
}

#[async_trait]
impl FromRequestParts<AppState> for SessionIdentity {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get(SESSION_TOKEN_HEADER)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| AppError::Unauthorized(anyhow!("Please login to continue")))?;

        let user = state
            .sessions
            .read(token)
            .ok_or_else(|| AppError::Unauthorized(anyhow!("Please login to continue")))?;

        tracing::Span::current().record("email", user.email.as_str());

        Ok(SessionIdentity {
            token: token.to_string(),
            user,
        })
    }
}
