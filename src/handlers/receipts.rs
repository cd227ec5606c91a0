//! Success/receipt view: re-derives the checkout numbers from the
//! stored transaction amount so the receipt always matches what was
//! shown at payment time.

use axum::extract::{Query, State};
use axum::Json;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::services::licensing::TransactionRecord;
use crate::services::pricing;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct ReceiptQuery {
    /// Transaction id from the navigation context.
    pub tx: Option<String>,
    /// Free/trial completion tag; no transaction record exists.
    #[serde(default)]
    pub free: bool,
}

#[derive(Debug, Serialize)]
pub struct ReceiptView {
    pub free: bool,
    pub plan: String,
    pub billing_cycle: Option<String>,
    pub subtotal: Decimal,
    pub gst: Decimal,
    pub total: Decimal,
    pub next_billing: Option<DateTime<Utc>>,
    pub payment_id: Option<String>,
    pub invoice_url: Option<String>,
}

/// Render receipt data for a free tag or a transaction id.
///
/// Lookup failures surface once; the client offers a manual retry and
/// an escape to the landing page, never an automatic one.
pub async fn receipt(
    State(state): State<AppState>,
    Query(query): Query<ReceiptQuery>,
) -> Result<Json<ReceiptView>, AppError> {
    if query.free {
        return Ok(Json(ReceiptView {
            free: true,
            plan: "Free / Trial Plan".to_string(),
            billing_cycle: None,
            subtotal: Decimal::ZERO,
            gst: Decimal::ZERO,
            total: Decimal::ZERO,
            next_billing: None,
            payment_id: None,
            invoice_url: None,
        }));
    }

    let transaction_id = query
        .tx
        .ok_or_else(|| AppError::BadRequest(anyhow::anyhow!("no transaction reference")))?;

    let record = state
        .licensing
        .get_transaction(&transaction_id)
        .await
        .map_err(|e| AppError::BadGateway(format!("transaction lookup failed: {e:#}")))?;

    let (subtotal, gst, total) = pricing::rederive_from_amount(record.amount);
    let billing_cycle = cycle_label(&record).map(|label| label.to_string());
    let invoice_url = record
        .payment_id
        .is_some()
        .then(|| state.licensing.invoice_url(&transaction_id));

    Ok(Json(ReceiptView {
        free: false,
        plan: record.plan.unwrap_or_else(|| "—".to_string()),
        billing_cycle,
        subtotal,
        gst,
        total,
        next_billing: record.next_billing,
        payment_id: record.payment_id,
        invoice_url,
    }))
}

/// Billing-cycle label for the receipt. Prefers the cycle stored on
/// the record; older records only carry a next-billing date, so the
/// gap to it is bucketed instead.
fn cycle_label(record: &TransactionRecord) -> Option<&'static str> {
    if let Some(cycle) = record.billing_cycle.as_deref() {
        match cycle {
            "monthly" => return Some("Monthly"),
            "quarterly" => return Some("Quarterly"),
            "yearly" => return Some("Yearly"),
            _ => {}
        }
    }

    let next = record.next_billing?;
    let days = ((next - Utc::now()).num_seconds() as f64 / 86_400.0).round() as i64;
    cycle_from_gap_days(days)
}

fn cycle_from_gap_days(days: i64) -> Option<&'static str> {
    if days <= 32 {
        Some("Monthly")
    } else if days <= 95 {
        Some("Quarterly")
    } else if days <= 370 {
        Some("Yearly")
    } else {
        None
    }
}
