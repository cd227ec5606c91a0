//! Razorpay gateway support: the checkout directive handed to the
//! payment widget and local verification of the signature it returns.

use anyhow::{anyhow, Result};
use hmac::{Hmac, Mac};
use secrecy::ExposeSecret;
use serde::Serialize;
use sha2::Sha256;

use crate::config::RazorpayConfig;
use crate::models::{GatewayOrder, SessionUser};

/// Display name shown in the payment widget.
const WIDGET_NAME: &str = "Callifo";
/// Widget accent color.
const WIDGET_THEME: &str = "#06b6d4";

/// Everything the client needs to open the Razorpay widget for one
/// order. The amount is the one submitted at order creation; the order
/// endpoint does not echo an amount back.
#[derive(Debug, Clone, Serialize)]
pub struct GatewayCheckout {
    pub key: String,
    pub order_id: String,
    /// Amount in paise.
    pub amount: u64,
    pub currency: String,
    pub name: String,
    pub prefill_name: String,
    pub prefill_email: String,
    pub theme_color: String,
}

/// Signature fields returned by the widget's success callback.
#[derive(Debug)]
pub struct PaymentVerification {
    pub razorpay_order_id: String,
    pub razorpay_payment_id: String,
    pub razorpay_signature: String,
}

#[derive(Clone)]
pub struct RazorpayGateway {
    config: RazorpayConfig,
}

impl RazorpayGateway {
    pub fn new(config: RazorpayConfig) -> Self {
        Self { config }
    }

    /// Whether a key secret is available for local signature checks.
    /// When unconfigured, verification is left entirely to the
    /// upstream verify endpoint.
    pub fn is_configured(&self) -> bool {
        !self.config.key_secret.expose_secret().is_empty()
    }

    /// Build the widget directive for an order.
    pub fn checkout_directive(
        &self,
        order: &GatewayOrder,
        amount_paise: u64,
        user: &SessionUser,
    ) -> GatewayCheckout {
        GatewayCheckout {
            key: order.key.clone(),
            order_id: order.order_id.clone(),
            amount: amount_paise,
            currency: order.currency.clone(),
            name: WIDGET_NAME.to_string(),
            prefill_name: user.display_name(),
            prefill_email: user.email.clone(),
            theme_color: WIDGET_THEME.to_string(),
        }
    }

    /// Verify the payment signature from the widget callback.
    ///
    /// The signature is computed as
    /// `HMAC-SHA256(order_id + "|" + payment_id, key_secret)`.
    pub fn verify_payment_signature(&self, verification: &PaymentVerification) -> Result<bool> {
        let payload = format!(
            "{}|{}",
            verification.razorpay_order_id, verification.razorpay_payment_id
        );

        let expected = self.compute_signature(&payload, self.config.key_secret.expose_secret())?;
        let is_valid = expected == verification.razorpay_signature;

        if is_valid {
            tracing::info!(
                order_id = %verification.razorpay_order_id,
                payment_id = %verification.razorpay_payment_id,
                "Payment signature verified"
            );
        } else {
            tracing::warn!(
                order_id = %verification.razorpay_order_id,
                payment_id = %verification.razorpay_payment_id,
                "Payment signature verification failed"
            );
        }

        Ok(is_valid)
    }

    fn compute_signature(&self, payload: &str, secret: &str) -> Result<String> {
        type HmacSha256 = Hmac<Sha256>;
        let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
            .map_err(|_| anyhow!("Invalid key length"))?;
        mac.update(payload.as_bytes());
        Ok(hex::encode(mac.finalize().into_bytes()))
    }
}
