//! Checkout orchestration.
//!
//! Drives one attempt through the purchase flow: catalog load,
//! price computation, purchase record, gateway order, widget
//! directive, and payment verification. Each attempt is a small state
//! machine; a failure parks it in `Failed` with a message and the user
//! restarts by submitting again. No step is retried automatically.

use anyhow::anyhow;
use dashmap::DashMap;
use std::sync::Arc;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::{BillingCycle, CheckoutAttempt, CheckoutPhase, Plan, SessionUser};
use crate::services::licensing::{LicensingClient, OrderRequest, PurchaseRequest, VerifyRequest};
use crate::services::pricing::PriceBreakdown;
use crate::services::razorpay::{PaymentVerification, RazorpayGateway};

const CURRENCY: &str = "INR";
const SOURCE: &str = "callifo";

#[derive(Clone)]
pub struct CheckoutFlow {
    attempts: Arc<DashMap<Uuid, CheckoutAttempt>>,
    licensing: LicensingClient,
    gateway: RazorpayGateway,
}

impl CheckoutFlow {
    pub fn new(licensing: LicensingClient, gateway: RazorpayGateway) -> Self {
        Self {
            attempts: Arc::new(DashMap::new()),
            licensing,
            gateway,
        }
    }

    /// Begin an attempt: load the catalog and auto-select the first
    /// plan. An empty or unreachable catalog means "not ready" and no
    /// attempt is created.
    pub async fn start(&self, user: SessionUser) -> Result<CheckoutAttempt, AppError> {
        let plans = self
            .licensing
            .fetch_plans()
            .await
            .map_err(|e| AppError::BadGateway(format!("plan catalog unavailable: {e:#}")))?;

        let first = plans
            .first()
            .cloned()
            .ok_or_else(|| AppError::BadGateway("plan catalog is not ready".to_string()))?;

        let breakdown =
            PriceBreakdown::compute(first.price, BillingCycle::Monthly, false, first.is_free());

        let attempt = CheckoutAttempt {
            id: Uuid::new_v4(),
            user,
            selected_plan_id: first.id.clone(),
            plans,
            billing_cycle: BillingCycle::Monthly,
            trial: false,
            phase: CheckoutPhase::PlansReady,
            breakdown: Some(breakdown),
            purchase: None,
            gateway: None,
            receipt_ref: None,
            failure: None,
            idempotency_key: Uuid::new_v4(),
        };

        tracing::info!(
            attempt_id = %attempt.id,
            email = %attempt.user.email,
            default_plan = %attempt.selected_plan_id,
            "Checkout attempt started"
        );

        self.attempts.insert(attempt.id, attempt.clone());
        Ok(attempt)
    }

    /// Confirm plan, cycle, and trial choice: create the purchase
    /// record and, for paid checkouts, the gateway order and widget
    /// directive. Allowed from `PlansReady` or `Failed` (restart); an
    /// in-flight attempt refuses re-entry since the upstream purchase
    /// has no server-side dedup.
    pub async fn submit(
        &self,
        attempt_id: Uuid,
        plan_id: &str,
        cycle: BillingCycle,
        trial: bool,
    ) -> Result<CheckoutAttempt, AppError> {
        let (user, plan, breakdown, idempotency_key) = {
            let mut entry = self
                .attempts
                .get_mut(&attempt_id)
                .ok_or_else(|| AppError::NotFound(anyhow!("unknown checkout attempt")))?;

            if entry.phase.is_in_flight() {
                return Err(AppError::Conflict(anyhow!("checkout already in progress")));
            }
            if entry.phase.is_terminal() {
                return Err(AppError::Conflict(anyhow!("checkout already completed")));
            }

            let plan: Plan = entry
                .plans
                .iter()
                .find(|p| p.id == plan_id)
                .cloned()
                .ok_or_else(|| AppError::BadRequest(anyhow!("unknown plan: {plan_id}")))?;

            let breakdown = PriceBreakdown::compute(plan.price, cycle, trial, plan.is_free());

            entry.selected_plan_id = plan.id.clone();
            entry.billing_cycle = cycle;
            entry.trial = trial;
            entry.breakdown = Some(breakdown.clone());
            entry.phase = CheckoutPhase::Submitting;
            entry.failure = None;
            entry.gateway = None;
            entry.receipt_ref = None;

            (entry.user.clone(), plan, breakdown, entry.idempotency_key)
        };

        let waived = trial || plan.is_free();
        let interval = cycle.upstream_interval().to_string();

        let purchase_request = PurchaseRequest {
            name: user.display_name(),
            email: user.email.clone(),
            product_id: self.licensing.product_id().to_string(),
            license_id: plan.id.clone(),
            license_type_id: plan.license_type_id.clone(),
            billing_cycle: interval.clone(),
            interval: interval.clone(),
            trial: waived,
            amount: if waived { 0 } else { breakdown.amount_due_whole() },
            currency: CURRENCY.to_string(),
            payment_mode: (if waived { "free" } else { "razorpay" }).to_string(),
            source: SOURCE.to_string(),
            idempotency_key,
        };

        let purchase = match self.licensing.purchase(&purchase_request).await {
            Ok(purchase) => purchase,
            Err(e) => {
                let msg = self.fail(attempt_id, format!("purchase failed: {e:#}"));
                return Err(AppError::BadGateway(msg));
            }
        };

        if waived {
            return self.update(attempt_id, |entry| {
                entry.purchase = Some(purchase.clone());
                entry.phase = CheckoutPhase::TrialOrFreeComplete;
                entry.receipt_ref = Some("free".to_string());
            });
        }

        let Some(transaction_id) = purchase.transaction_id.clone() else {
            let msg = self.fail(attempt_id, "purchase response missing transaction id");
            return Err(AppError::BadGateway(msg));
        };

        self.update(attempt_id, |entry| {
            entry.purchase = Some(purchase.clone());
            entry.phase = CheckoutPhase::AwaitingGatewayOrder;
        })?;

        let order_request = OrderRequest {
            user_id: purchase.user_id.clone(),
            license_id: plan.id.clone(),
            billing_cycle: interval,
            amount: breakdown.total_paise(),
        };

        let order = match self.licensing.create_order(&order_request).await {
            Ok(order) => order,
            Err(e) => {
                let msg = self.fail(attempt_id, format!("gateway order failed: {e:#}"));
                return Err(AppError::BadGateway(msg));
            }
        };

        let directive = self
            .gateway
            .checkout_directive(&order, breakdown.total_paise(), &user);

        tracing::info!(
            attempt_id = %attempt_id,
            transaction_id = %transaction_id,
            order_id = %directive.order_id,
            amount = directive.amount,
            "Gateway checkout ready"
        );

        self.update(attempt_id, |entry| {
            entry.phase = CheckoutPhase::GatewayOpen;
            entry.gateway = Some(directive.clone());
        })
    }

    /// Handle the widget's success callback: verify the signature
    /// locally when a key secret is configured, then relay to the
    /// upstream verify endpoint.
    pub async fn confirm(
        &self,
        attempt_id: Uuid,
        razorpay_payment_id: &str,
        razorpay_order_id: &str,
        razorpay_signature: &str,
    ) -> Result<CheckoutAttempt, AppError> {
        let (expected_order_id, transaction_id) = {
            let entry = self
                .attempts
                .get(&attempt_id)
                .ok_or_else(|| AppError::NotFound(anyhow!("unknown checkout attempt")))?;

            if entry.phase != CheckoutPhase::GatewayOpen {
                return Err(AppError::Conflict(anyhow!(
                    "no payment awaiting verification"
                )));
            }

            let order_id = entry
                .gateway
                .as_ref()
                .map(|g| g.order_id.clone())
                .ok_or_else(|| AppError::InternalError(anyhow!("attempt has no gateway order")))?;
            let transaction_id = entry
                .purchase
                .as_ref()
                .and_then(|p| p.transaction_id.clone())
                .ok_or_else(|| AppError::InternalError(anyhow!("attempt has no transaction id")))?;

            (order_id, transaction_id)
        };

        if expected_order_id != razorpay_order_id {
            tracing::warn!(
                attempt_id = %attempt_id,
                expected = %expected_order_id,
                received = %razorpay_order_id,
                "Order id mismatch"
            );
            return Err(AppError::BadRequest(anyhow!(
                "order id does not match checkout attempt"
            )));
        }

        self.update(attempt_id, |entry| {
            entry.phase = CheckoutPhase::Verifying;
        })?;

        if self.gateway.is_configured() {
            let verification = PaymentVerification {
                razorpay_order_id: razorpay_order_id.to_string(),
                razorpay_payment_id: razorpay_payment_id.to_string(),
                razorpay_signature: razorpay_signature.to_string(),
            };
            let valid = self
                .gateway
                .verify_payment_signature(&verification)
                .map_err(AppError::InternalError)?;
            if !valid {
                let msg = self.fail(attempt_id, "payment signature verification failed");
                return Err(AppError::BadRequest(anyhow!(msg)));
            }
        }

        let verify_request = VerifyRequest {
            transaction_id: transaction_id.clone(),
            razorpay_payment_id: razorpay_payment_id.to_string(),
            razorpay_order_id: razorpay_order_id.to_string(),
            razorpay_signature: razorpay_signature.to_string(),
        };

        if let Err(e) = self.licensing.verify_payment(&verify_request).await {
            let msg = self.fail(attempt_id, format!("payment verification failed: {e:#}"));
            return Err(AppError::BadGateway(msg));
        }

        tracing::info!(
            attempt_id = %attempt_id,
            transaction_id = %transaction_id,
            "Checkout complete"
        );

        self.update(attempt_id, |entry| {
            entry.phase = CheckoutPhase::Complete;
            entry.receipt_ref = Some(transaction_id.clone());
        })
    }

    pub fn get(&self, attempt_id: Uuid) -> Option<CheckoutAttempt> {
        self.attempts
            .get(&attempt_id)
            .map(|entry| entry.value().clone())
    }

    /// Park the attempt in `Failed` with a dismissible message and
    /// return that message. Submitting again restarts the attempt.
    fn fail(&self, attempt_id: Uuid, message: impl Into<String>) -> String {
        let message = message.into();
        if let Some(mut entry) = self.attempts.get_mut(&attempt_id) {
            entry.phase = CheckoutPhase::Failed;
            entry.failure = Some(message.clone());
        }
        tracing::warn!(attempt_id = %attempt_id, failure = %message, "Checkout attempt failed");
        message
    }

    fn update(
        &self,
        attempt_id: Uuid,
        apply: impl FnOnce(&mut CheckoutAttempt),
    ) -> Result<CheckoutAttempt, AppError> {
        let mut entry = self
            .attempts
            .get_mut(&attempt_id)
            .ok_or_else(|| AppError::NotFound(anyhow!("unknown checkout attempt")))?;
        apply(&mut entry);
        Ok(entry.clone())
    }
}
