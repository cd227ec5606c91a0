//! Plan catalog endpoint backing the pricing and checkout views.

use axum::extract::State;
use axum::Json;
use serde::Serialize;

use crate::error::AppError;
use crate::models::Plan;
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct PlansResponse {
    /// First plan in upstream order; selected when the user hasn't
    /// chosen one yet.
    pub default_plan_id: String,
    pub plans: Vec<Plan>,
}

/// List the product's plans.
///
/// An empty catalog is "not ready", never "no plans exist": callers
/// must not render a pricing or checkout view from an error response.
pub async fn list_plans(State(state): State<AppState>) -> Result<Json<PlansResponse>, AppError> {
    let plans = state
        .licensing
        .fetch_plans()
        .await
        .map_err(|e| AppError::BadGateway(format!("plan catalog unavailable: {e:#}")))?;

    let default_plan_id = plans
        .first()
        .map(|p| p.id.clone())
        .ok_or_else(|| AppError::BadGateway("plan catalog is not ready".to_string()))?;

    Ok(Json(PlansResponse {
        default_plan_id,
        plans,
    }))
}
