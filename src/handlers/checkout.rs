//! Checkout endpoints: stateless quotes plus the attempt lifecycle
//! (start, submit, gateway confirmation, status).

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppError;
use crate::middleware::SessionIdentity;
use crate::models::{BillingCycle, CheckoutAttempt, CheckoutPhase, Plan};
use crate::services::pricing::PriceBreakdown;
use crate::services::razorpay::GatewayCheckout;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct QuoteRequest {
    /// Monthly base price in whole currency units; missing means zero.
    #[serde(default)]
    pub monthly_price: Decimal,
    pub billing_cycle: BillingCycle,
    #[serde(default)]
    pub trial: bool,
}

#[derive(Debug, Deserialize)]
pub struct SubmitRequest {
    pub attempt_id: Uuid,
    pub plan_id: String,
    pub billing_cycle: BillingCycle,
    #[serde(default)]
    pub trial: bool,
}

#[derive(Debug, Deserialize)]
pub struct ConfirmRequest {
    pub attempt_id: Uuid,
    pub razorpay_payment_id: String,
    pub razorpay_order_id: String,
    pub razorpay_signature: String,
}

/// Attempt view returned by every checkout endpoint.
#[derive(Debug, Serialize)]
pub struct CheckoutView {
    pub attempt_id: Uuid,
    pub phase: CheckoutPhase,
    pub plans: Vec<Plan>,
    pub selected_plan_id: String,
    pub billing_cycle: BillingCycle,
    pub trial: bool,
    pub breakdown: Option<PriceBreakdown>,
    pub gateway: Option<GatewayCheckout>,
    pub receipt_ref: Option<String>,
    pub failure: Option<String>,
}

impl From<CheckoutAttempt> for CheckoutView {
    fn from(attempt: CheckoutAttempt) -> Self {
        Self {
            attempt_id: attempt.id,
            phase: attempt.phase,
            plans: attempt.plans,
            selected_plan_id: attempt.selected_plan_id,
            billing_cycle: attempt.billing_cycle,
            trial: attempt.trial,
            breakdown: attempt.breakdown,
            gateway: attempt.gateway,
            receipt_ref: attempt.receipt_ref,
            failure: attempt.failure,
        }
    }
}

/// Stateless price breakdown for a plan price and cycle.
pub async fn quote(Json(payload): Json<QuoteRequest>) -> Json<PriceBreakdown> {
    let is_free = payload.monthly_price.is_zero();
    Json(PriceBreakdown::compute(
        payload.monthly_price,
        payload.billing_cycle,
        payload.trial,
        is_free,
    ))
}

/// Start a checkout attempt for the logged-in user.
pub async fn start(
    State(state): State<AppState>,
    identity: SessionIdentity,
) -> Result<(StatusCode, Json<CheckoutView>), AppError> {
    let attempt = state.checkout.start(identity.user).await?;
    Ok((StatusCode::CREATED, Json(attempt.into())))
}

/// Confirm plan, cycle, and trial choice and drive the purchase.
pub async fn submit(
    State(state): State<AppState>,
    _identity: SessionIdentity,
    Json(payload): Json<SubmitRequest>,
) -> Result<Json<CheckoutView>, AppError> {
    let attempt = state
        .checkout
        .submit(
            payload.attempt_id,
            &payload.plan_id,
            payload.billing_cycle,
            payload.trial,
        )
        .await?;
    Ok(Json(attempt.into()))
}

/// Relay the payment widget's success callback for verification.
pub async fn confirm(
    State(state): State<AppState>,
    _identity: SessionIdentity,
    Json(payload): Json<ConfirmRequest>,
) -> Result<Json<CheckoutView>, AppError> {
    let attempt = state
        .checkout
        .confirm(
            payload.attempt_id,
            &payload.razorpay_payment_id,
            &payload.razorpay_order_id,
            &payload.razorpay_signature,
        )
        .await?;
    Ok(Json(attempt.into()))
}

/// Read an attempt's current state.
pub async fn status(
    State(state): State<AppState>,
    Path(attempt_id): Path<Uuid>,
) -> Result<Json<CheckoutView>, AppError> {
    let attempt = state
        .checkout
        .get(attempt_id)
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("unknown checkout attempt")))?;
    Ok(Json(attempt.into()))
}
