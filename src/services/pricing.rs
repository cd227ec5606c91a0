//! Price breakdown computation for a selected plan and billing cycle.
//!
//! Pure arithmetic: cycle multiplier and discount, half-up rounding to
//! whole currency units at the subtotal stage, 18% GST rounded to two
//! decimals, and zeroing for free plans and trials.

use chrono::{Duration, NaiveDate, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::Serialize;

use crate::models::BillingCycle;

/// GST surcharge applied to non-free, non-trial subtotals.
pub const GST_RATE: Decimal = Decimal::from_parts(18, 0, 0, false, 2);

/// Length of the free trial offered on paid plans.
pub const TRIAL_DAYS: i64 = 14;

/// Derived amounts for one plan/cycle/trial combination. Never stored;
/// recomputed wherever it is displayed.
#[derive(Debug, Clone, Serialize)]
pub struct PriceBreakdown {
    /// Monthly base price multiplied out to the cycle, before discount.
    pub base_price_for_cycle: Decimal,
    pub discount_rate: Decimal,
    pub discount_amount: Decimal,
    /// Discounted cycle price, rounded half-up to a whole unit.
    pub subtotal: Decimal,
    /// Whole-unit amount submitted on the purchase request; zero for
    /// free plans and trials.
    pub amount_due_before_tax: Decimal,
    pub gst: Decimal,
    /// Amount due today including GST.
    pub total: Decimal,
    pub trial_ends_on: Option<NaiveDate>,
}

impl PriceBreakdown {
    /// Compute the breakdown for a monthly base price.
    ///
    /// Missing upstream prices are treated as zero before this is
    /// called, so `base_monthly` is always a concrete value.
    pub fn compute(
        base_monthly: Decimal,
        cycle: BillingCycle,
        trial: bool,
        is_free: bool,
    ) -> Self {
        let base_price_for_cycle = base_monthly * cycle.multiplier();
        let discount_rate = cycle.discount_rate();
        let discount_amount = base_price_for_cycle * discount_rate;

        let subtotal = (base_price_for_cycle * (Decimal::ONE - discount_rate))
            .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero);

        let waived = trial || is_free;

        let amount_due_before_tax = if waived { Decimal::ZERO } else { subtotal };
        let gst = if waived {
            Decimal::ZERO
        } else {
            (subtotal * GST_RATE).round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
        };
        let total = if waived {
            Decimal::ZERO
        } else {
            (subtotal + gst).round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
        };

        let trial_ends_on = if trial && !is_free {
            Some(Utc::now().date_naive() + Duration::days(TRIAL_DAYS))
        } else {
            None
        };

        Self {
            base_price_for_cycle,
            discount_rate,
            discount_amount,
            subtotal,
            amount_due_before_tax,
            gst,
            total,
            trial_ends_on,
        }
    }

    /// Whole-unit purchase amount for the upstream payload.
    pub fn amount_due_whole(&self) -> i64 {
        self.amount_due_before_tax
            .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
            .to_i64()
            .unwrap_or(0)
    }

    /// Total in the smallest currency unit (paise) for the gateway
    /// order and widget.
    pub fn total_paise(&self) -> u64 {
        (self.total * Decimal::from(100))
            .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
            .to_u64()
            .unwrap_or(0)
    }
}

/// Re-derive the receipt-side numbers from a stored base amount using
/// the same non-trial formula as checkout.
pub fn rederive_from_amount(amount: Decimal) -> (Decimal, Decimal, Decimal) {
    let gst = (amount * GST_RATE).round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    let total =
        (amount + gst).round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    (amount, gst, total)
}
