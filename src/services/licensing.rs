//! Client for the upstream licensing service.
//!
//! Everything the checkout flow needs from the outside lives behind
//! this one API: the plan catalog, purchase records, Razorpay order
//! creation, payment verification, transaction lookup, and the
//! customer directory used by login/signup.

use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};
use reqwest::Client;
use rust_decimal::Decimal;
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::LicensingConfig;
use crate::models::{GatewayOrder, Plan, PurchaseReceipt};

const API_KEY_HEADER: &str = "x-api-key";

/// Licensing service client. Cheap to clone; shares the underlying
/// connection pool.
#[derive(Clone)]
pub struct LicensingClient {
    client: Client,
    config: LicensingConfig,
}

/// Purchase request submitted when the user confirms checkout.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PurchaseRequest {
    pub name: String,
    pub email: String,
    pub product_id: String,
    pub license_id: String,
    pub license_type_id: String,
    pub billing_cycle: String,
    pub interval: String,
    pub trial: bool,
    /// Whole-unit amount due before tax.
    pub amount: i64,
    pub currency: String,
    pub payment_mode: String,
    pub source: String,
    /// Client-generated token so a re-submitted attempt can be
    /// deduplicated upstream.
    pub idempotency_key: Uuid,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PurchaseResponse {
    user_id: String,
    transaction_id: Option<String>,
}

/// Order request for a paid checkout. Amount is in paise.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderRequest {
    pub user_id: String,
    pub license_id: String,
    pub billing_cycle: String,
    pub amount: u64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OrderResponse {
    order_id: Option<String>,
    key: Option<String>,
    currency: Option<String>,
}

/// Verification payload relayed after the payment widget succeeds.
/// The razorpay_* field names are the gateway's own and cross the wire
/// unchanged.
#[derive(Debug, Serialize)]
pub struct VerifyRequest {
    #[serde(rename = "transactionId")]
    pub transaction_id: String,
    pub razorpay_payment_id: String,
    pub razorpay_order_id: String,
    pub razorpay_signature: String,
}

/// Transaction record behind the success view.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionRecord {
    pub plan: Option<String>,
    #[serde(default)]
    pub amount: Decimal,
    pub next_billing: Option<DateTime<Utc>>,
    /// Explicit cycle when the upstream stores one; older records only
    /// have `next_billing`.
    pub billing_cycle: Option<String>,
    #[serde(alias = "id", alias = "razorpayPaymentId", alias = "transactionId")]
    pub payment_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CustomerExistsResponse {
    exists: bool,
}

#[derive(Debug, Deserialize)]
pub struct CustomerRecord {
    pub name: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LicensesResponse {
    licenses: Vec<LicenseEntry>,
}

#[derive(Debug, Deserialize)]
struct LicenseEntry {
    #[serde(rename = "_id")]
    id: String,
    #[serde(rename = "licenseType")]
    license_type: LicenseType,
}

#[derive(Debug, Deserialize)]
struct LicenseType {
    #[serde(rename = "_id")]
    id: String,
    name: String,
    price: Option<LicensePrice>,
    features: Option<Vec<LicenseFeature>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LicensePrice {
    amount: Option<Decimal>,
    billing_period: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LicenseFeature {
    ui_label: Option<String>,
    display_name: Option<String>,
}

impl LicensingClient {
    pub fn new(config: LicensingConfig) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }

    pub fn product_id(&self) -> &str {
        &self.config.product_id
    }

    /// Receipt download URL for a completed transaction.
    pub fn invoice_url(&self, transaction_id: &str) -> String {
        format!(
            "{}/payment/invoice/{}",
            self.config.base_url, transaction_id
        )
    }

    /// Fetch the plan catalog for the configured product.
    ///
    /// Plans come back in upstream order; the first one is the default
    /// selection. A plan named "starter" is priced at zero regardless
    /// of the catalog amount, and "professional"/"pro" is flagged
    /// recommended.
    pub async fn fetch_plans(&self) -> Result<Vec<Plan>> {
        let url = format!(
            "{}/license/licenses-by-product/{}",
            self.config.base_url, self.config.product_id
        );

        let response = self
            .client
            .get(&url)
            .header(API_KEY_HEADER, self.config.api_key.expose_secret())
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            tracing::error!(status = %status, body = %body, "Plan catalog fetch failed");
            return Err(anyhow!("licensing service returned {}", status));
        }

        let parsed: LicensesResponse = serde_json::from_str(&body)?;

        let plans = parsed
            .licenses
            .into_iter()
            .map(|lic| {
                let name = lic.license_type.name;
                let lowered = name.to_lowercase();
                let price = if lowered == "starter" {
                    Decimal::ZERO
                } else {
                    lic.license_type
                        .price
                        .as_ref()
                        .and_then(|p| p.amount)
                        .unwrap_or(Decimal::ZERO)
                };
                let period = lic
                    .license_type
                    .price
                    .as_ref()
                    .and_then(|p| p.billing_period.clone())
                    .unwrap_or_else(|| "monthly".to_string());
                let features = lic
                    .license_type
                    .features
                    .unwrap_or_default()
                    .into_iter()
                    .filter_map(|f| f.ui_label.or(f.display_name))
                    .collect();

                Plan {
                    id: lic.id,
                    license_type_id: lic.license_type.id,
                    recommended: lowered == "professional" || lowered == "pro",
                    name,
                    price,
                    period,
                    features,
                }
            })
            .collect::<Vec<_>>();

        tracing::info!(count = plans.len(), "Plan catalog loaded");
        Ok(plans)
    }

    /// Create the purchase record for a checkout attempt.
    pub async fn purchase(&self, request: &PurchaseRequest) -> Result<PurchaseReceipt> {
        let url = format!("{}/license/purchase", self.config.base_url);

        let response = self
            .client
            .post(&url)
            .header(API_KEY_HEADER, self.config.api_key.expose_secret())
            .json(request)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            tracing::error!(status = %status, body = %body, "Purchase request failed");
            return Err(anyhow!("purchase failed: {}", status));
        }

        let parsed: PurchaseResponse = serde_json::from_str(&body)?;
        tracing::info!(
            user_id = %parsed.user_id,
            transaction_id = ?parsed.transaction_id,
            payment_mode = %request.payment_mode,
            "Purchase recorded"
        );

        Ok(PurchaseReceipt {
            user_id: parsed.user_id,
            transaction_id: parsed.transaction_id,
        })
    }

    /// Create a gateway order for a paid purchase.
    ///
    /// Returns an error when the response is missing the order id or
    /// key; the widget cannot open without both.
    pub async fn create_order(&self, request: &OrderRequest) -> Result<GatewayOrder> {
        let url = format!("{}/payment/create-order", self.config.base_url);

        let response = self
            .client
            .post(&url)
            .header(API_KEY_HEADER, self.config.api_key.expose_secret())
            .json(request)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            tracing::error!(status = %status, body = %body, "Order creation failed");
            return Err(anyhow!("order creation failed: {}", status));
        }

        let parsed: OrderResponse = serde_json::from_str(&body)?;
        match (parsed.order_id, parsed.key) {
            (Some(order_id), Some(key)) => {
                tracing::info!(order_id = %order_id, amount = request.amount, "Gateway order created");
                Ok(GatewayOrder {
                    order_id,
                    key,
                    currency: parsed.currency.unwrap_or_else(|| "INR".to_string()),
                })
            }
            _ => Err(anyhow!("order response missing order id or key")),
        }
    }

    /// Relay the gateway callback for server-side verification.
    pub async fn verify_payment(&self, request: &VerifyRequest) -> Result<()> {
        let url = format!("{}/payment/verify", self.config.base_url);

        let response = self
            .client
            .post(&url)
            .header(API_KEY_HEADER, self.config.api_key.expose_secret())
            .json(request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = %status, body = %body, "Payment verification failed");
            return Err(anyhow!("payment verification failed: {}", status));
        }

        tracing::info!(
            transaction_id = %request.transaction_id,
            payment_id = %request.razorpay_payment_id,
            "Payment verified upstream"
        );
        Ok(())
    }

    /// Fetch a transaction record for the success view.
    pub async fn get_transaction(&self, transaction_id: &str) -> Result<TransactionRecord> {
        let url = format!(
            "{}/payment/transaction/{}",
            self.config.base_url, transaction_id
        );

        let response = self
            .client
            .get(&url)
            .header(API_KEY_HEADER, self.config.api_key.expose_secret())
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            tracing::error!(status = %status, transaction_id, "Transaction lookup failed");
            return Err(anyhow!("transaction lookup failed: {}", status));
        }

        Ok(serde_json::from_str(&body)?)
    }

    /// Create or update the customer record during signup.
    pub async fn sync_customer(
        &self,
        name: &str,
        email: &str,
        source: &str,
    ) -> Result<CustomerRecord> {
        let url = format!("{}/customer/sync", self.config.base_url);

        let response = self
            .client
            .post(&url)
            .header(API_KEY_HEADER, self.config.api_key.expose_secret())
            .json(&serde_json::json!({
                "name": name,
                "email": email,
                "source": source,
            }))
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            tracing::error!(status = %status, body = %body, "Customer sync failed");
            return Err(anyhow!("customer sync failed: {}", status));
        }

        Ok(serde_json::from_str(&body).unwrap_or(CustomerRecord { name: None }))
    }

    /// Check whether a customer record exists for this email.
    pub async fn customer_exists(&self, email: &str) -> Result<bool> {
        let url = format!("{}/customer/exists/{}", self.config.base_url, email);

        let response = self
            .client
            .get(&url)
            .header(API_KEY_HEADER, self.config.api_key.expose_secret())
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            tracing::error!(status = %status, body = %body, "Customer check failed");
            return Err(anyhow!("customer check failed: {}", status));
        }

        let parsed: CustomerExistsResponse = serde_json::from_str(&body)?;
        Ok(parsed.exists)
    }
}
