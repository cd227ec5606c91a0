//! Login and signup backed by the upstream customer directory.
//!
//! There is no password or token exchange here: the upstream keeps a
//! customer record per email, and a successful login or signup writes
//! the session record that gates checkout.

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::error::AppError;
use crate::middleware::SessionIdentity;
use crate::models::SessionUser;
use crate::AppState;

const SOURCE: &str = "callifo";

#[derive(Debug, Deserialize, Validate)]
pub struct SignupRequest {
    #[validate(length(min = 1))]
    pub name: String,
    #[validate(email)]
    pub email: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(email)]
    pub email: String,
}

#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub token: String,
    pub user: SessionUser,
}

/// Create (or update) the customer record and open a session.
pub async fn signup(
    State(state): State<AppState>,
    Json(payload): Json<SignupRequest>,
) -> Result<(StatusCode, Json<AuthResponse>), AppError> {
    payload.validate()?;

    let record = state
        .licensing
        .sync_customer(&payload.name, &payload.email, SOURCE)
        .await
        .map_err(|e| AppError::BadGateway(format!("customer sync failed: {e:#}")))?;

    let user = SessionUser {
        email: payload.email,
        name: record.name.or(Some(payload.name)),
        source: SOURCE.to_string(),
    };

    tracing::info!(email = %user.email, "Customer signed up");

    let token = state.sessions.write(user.clone());
    Ok((StatusCode::CREATED, Json(AuthResponse { token, user })))
}

/// Open a session for an existing customer.
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<AuthResponse>, AppError> {
    payload.validate()?;

    let exists = state
        .licensing
        .customer_exists(&payload.email)
        .await
        .map_err(|e| AppError::BadGateway(format!("customer check failed: {e:#}")))?;

    if !exists {
        return Err(AppError::NotFound(anyhow::anyhow!(
            "Account not found. Please create an account."
        )));
    }

    let user = SessionUser {
        email: payload.email,
        name: None,
        source: SOURCE.to_string(),
    };

    tracing::info!(email = %user.email, "Customer logged in");

    let token = state.sessions.write(user.clone());
    Ok(Json(AuthResponse { token, user }))
}

/// Current session user.
pub async fn session(identity: SessionIdentity) -> Json<SessionUser> {
    Json(identity.user)
}

/// Explicit logout; the only way a session record goes away.
pub async fn logout(State(state): State<AppState>, identity: SessionIdentity) -> StatusCode {
    state.sessions.clear(&identity.token);
    StatusCode::NO_CONTENT
}
