use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::services::pricing::PriceBreakdown;
use crate::services::razorpay::GatewayCheckout;

/// Billing cycle selected at checkout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BillingCycle {
    Monthly,
    Quarterly,
    Yearly,
}

impl BillingCycle {
    pub fn as_str(&self) -> &'static str {
        match self {
            BillingCycle::Monthly => "monthly",
            BillingCycle::Quarterly => "quarterly",
            BillingCycle::Yearly => "yearly",
        }
    }

    pub fn from_string(s: &str) -> Self {
        match s {
            "quarterly" => BillingCycle::Quarterly,
            "yearly" => BillingCycle::Yearly,
            _ => BillingCycle::Monthly,
        }
    }

    /// Number of months charged per cycle.
    pub fn multiplier(&self) -> Decimal {
        match self {
            BillingCycle::Monthly => Decimal::from(1),
            BillingCycle::Quarterly => Decimal::from(3),
            BillingCycle::Yearly => Decimal::from(12),
        }
    }

    /// Discount applied to the multiplied base price.
    pub fn discount_rate(&self) -> Decimal {
        match self {
            BillingCycle::Monthly => Decimal::ZERO,
            BillingCycle::Quarterly => Decimal::new(10, 2),
            BillingCycle::Yearly => Decimal::new(20, 2),
        }
    }

    /// Cycle value sent on upstream payloads. The licensing API only
    /// accepts monthly|yearly intervals, so quarterly maps to monthly.
    pub fn upstream_interval(&self) -> &'static str {
        match self {
            BillingCycle::Monthly | BillingCycle::Quarterly => "monthly",
            BillingCycle::Yearly => "yearly",
        }
    }
}

/// Purchasable subscription plan mapped from an upstream license.
#[derive(Debug, Clone, Serialize)]
pub struct Plan {
    pub id: String,
    pub license_type_id: String,
    pub name: String,
    /// Monthly base price in whole currency units.
    pub price: Decimal,
    pub period: String,
    pub features: Vec<String>,
    pub recommended: bool,
}

impl Plan {
    pub fn is_free(&self) -> bool {
        self.price.is_zero()
    }
}

/// Logged-in user record held by the session provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionUser {
    pub email: String,
    pub name: Option<String>,
    pub source: String,
}

impl SessionUser {
    /// Display name: explicit name, then the email local part, then a
    /// generic fallback.
    pub fn display_name(&self) -> String {
        if let Some(name) = &self.name {
            if !name.is_empty() {
                return name.clone();
            }
        }
        self.email
            .split('@')
            .next()
            .filter(|part| !part.is_empty())
            .map(|part| part.to_string())
            .unwrap_or_else(|| "Callifo User".to_string())
    }
}

/// Phase of a single checkout attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckoutPhase {
    PlansLoading,
    PlansReady,
    Submitting,
    TrialOrFreeComplete,
    AwaitingGatewayOrder,
    GatewayOpen,
    Verifying,
    Complete,
    Failed,
}

impl CheckoutPhase {
    /// An attempt in one of these phases has a request in flight and
    /// must not accept another submission.
    pub fn is_in_flight(&self) -> bool {
        matches!(
            self,
            CheckoutPhase::Submitting
                | CheckoutPhase::AwaitingGatewayOrder
                | CheckoutPhase::GatewayOpen
                | CheckoutPhase::Verifying
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            CheckoutPhase::TrialOrFreeComplete | CheckoutPhase::Complete
        )
    }
}

/// Ids returned by the upstream purchase endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct PurchaseReceipt {
    pub user_id: String,
    pub transaction_id: Option<String>,
}

/// Gateway order created upstream for a paid checkout.
#[derive(Debug, Clone, Serialize)]
pub struct GatewayOrder {
    pub order_id: String,
    pub key: String,
    pub currency: String,
}

/// One checkout attempt: the state machine plus everything gathered
/// along the way.
#[derive(Debug, Clone)]
pub struct CheckoutAttempt {
    pub id: Uuid,
    pub user: SessionUser,
    pub plans: Vec<Plan>,
    pub selected_plan_id: String,
    pub billing_cycle: BillingCycle,
    pub trial: bool,
    pub phase: CheckoutPhase,
    pub breakdown: Option<PriceBreakdown>,
    pub purchase: Option<PurchaseReceipt>,
    pub gateway: Option<GatewayCheckout>,
    /// Navigation tag for the success view: "free" or a transaction id.
    pub receipt_ref: Option<String>,
    pub failure: Option<String>,
    /// Attached to the purchase request so the upstream can deduplicate
    /// a re-submitted attempt.
    pub idempotency_key: Uuid,
}

impl CheckoutAttempt {
    pub fn selected_plan(&self) -> Option<&Plan> {
        self.plans.iter().find(|p| p.id == self.selected_plan_id)
    }
}
