use anyhow::Result;
use dotenvy::dotenv;
use secrecy::Secret;
use serde::Deserialize;
use std::env;

#[derive(Deserialize, Clone, Debug)]
pub struct Config {
    pub server: ServerConfig,
    pub licensing: LicensingConfig,
    pub razorpay: RazorpayConfig,
    pub service_name: String,
}

#[derive(Deserialize, Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

/// Upstream licensing service: plan catalog, purchases, payment orders,
/// verification, transaction lookup, and customer sync all live behind it.
#[derive(Deserialize, Clone, Debug)]
pub struct LicensingConfig {
    pub base_url: String,
    pub api_key: Secret<String>,
    pub product_id: String,
}

#[derive(Deserialize, Clone, Debug)]
pub struct RazorpayConfig {
    /// Key secret used for local payment-signature verification.
    /// Leave empty to skip the local check and rely on upstream
    /// verification alone.
    pub key_secret: Secret<String>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenv().ok();

        let host = env::var("CHECKOUT_SERVICE_HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
        let port = env::var("CHECKOUT_SERVICE_PORT")
            .unwrap_or_else(|_| "3006".to_string())
            .parse()?;

        let licensing_base_url = env::var("LICENSING_BASE_URL")
            .unwrap_or_else(|_| "https://lisence-system.onrender.com/api".to_string());
        let licensing_api_key =
            env::var("LICENSING_API_KEY").unwrap_or_else(|_| "dev-api-key".to_string());
        let product_id = env::var("LICENSING_PRODUCT_ID")
            .unwrap_or_else(|_| "6958ee26be14694144dfb879".to_string());

        let razorpay_key_secret = env::var("RAZORPAY_KEY_SECRET").unwrap_or_default();

        Ok(Self {
            server: ServerConfig { host, port },
            licensing: LicensingConfig {
                base_url: licensing_base_url,
                api_key: Secret::new(licensing_api_key),
                product_id,
            },
            razorpay: RazorpayConfig {
                key_secret: Secret::new(razorpay_key_secret),
            },
            service_name: "checkout-service".to_string(),
        })
    }
}
