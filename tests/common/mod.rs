use checkout_service::config::{Config, LicensingConfig, RazorpayConfig, ServerConfig};
use checkout_service::startup::Application;
use hmac::{Hmac, Mac};
use rust_decimal::Decimal;
use secrecy::Secret;
use serde_json::{json, Value};
use sha2::Sha256;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const TEST_API_KEY: &str = "test-api-key";
pub const TEST_PRODUCT_ID: &str = "prod-callifo";
pub const TEST_RAZORPAY_SECRET: &str = "test_key_secret";

pub struct TestApp {
    pub address: String,
    pub client: reqwest::Client,
    pub upstream: MockServer,
}

impl TestApp {
    pub async fn spawn() -> Self {
        let upstream = MockServer::start().await;

        let config = Config {
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 0, // Random port
            },
            licensing: LicensingConfig {
                base_url: upstream.uri(),
                api_key: Secret::new(TEST_API_KEY.to_string()),
                product_id: TEST_PRODUCT_ID.to_string(),
            },
            razorpay: RazorpayConfig {
                key_secret: Secret::new(TEST_RAZORPAY_SECRET.to_string()),
            },
            service_name: "checkout-service-test".to_string(),
        };

        let app = Application::build(config)
            .await
            .expect("Failed to build test application");

        let port = app.port();
        let address = format!("http://127.0.0.1:{}", port);

        tokio::spawn(async move {
            app.run_until_stopped().await.ok();
        });

        // Wait for the server to be ready by polling the health endpoint
        let client = reqwest::Client::new();
        let health_url = format!("{}/health", address);
        for _ in 0..50 {
            if client.get(&health_url).send().await.is_ok() {
                break;
            }
            tokio::time::sleep(tokio::time::Duration::from_millis(50)).await;
        }

        TestApp {
            address,
            client,
            upstream,
        }
    }

    /// Mount the standard three-plan catalog on the upstream mock.
    pub async fn mount_catalog(&self) {
        Mock::given(method("GET"))
            .and(path(format!(
                "/license/licenses-by-product/{}",
                TEST_PRODUCT_ID
            )))
            .and(header("x-api-key", TEST_API_KEY))
            .respond_with(ResponseTemplate::new(200).set_body_json(catalog_body()))
            .mount(&self.upstream)
            .await;
    }

    /// Log in as an existing customer and return the session token.
    pub async fn login(&self, email: &str) -> String {
        Mock::given(method("GET"))
            .and(path(format!("/customer/exists/{}", email)))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "exists": true })))
            .mount(&self.upstream)
            .await;

        let response = self
            .client
            .post(format!("{}/auth/login", self.address))
            .json(&json!({ "email": email }))
            .send()
            .await
            .expect("Failed to log in");
        assert!(response.status().is_success());

        let body: Value = response.json().await.expect("Invalid login response");
        body["token"].as_str().expect("Missing token").to_string()
    }
}

/// Catalog fixture: the "starter" price is deliberately non-zero to
/// exercise the forced-to-zero mapping.
pub fn catalog_body() -> Value {
    json!({
        "licenses": [
            {
                "_id": "lic-starter",
                "licenseType": {
                    "_id": "lt-starter",
                    "name": "Starter",
                    "price": { "amount": 499, "billingPeriod": "monthly" },
                    "features": [
                        { "uiLabel": "1 SIM" },
                        { "displayName": "Basic call logs" }
                    ]
                }
            },
            {
                "_id": "lic-pro",
                "licenseType": {
                    "_id": "lt-pro",
                    "name": "Professional",
                    "price": { "amount": 999, "billingPeriod": "monthly" },
                    "features": [
                        { "uiLabel": "5 SIMs", "displayName": "Five SIM cards" },
                        { "uiLabel": "Call recording" }
                    ]
                }
            },
            {
                "_id": "lic-biz",
                "licenseType": {
                    "_id": "lt-biz",
                    "name": "Business",
                    "price": { "amount": 1999, "billingPeriod": "monthly" },
                    "features": [
                        { "displayName": "Unlimited SIMs" }
                    ]
                }
            }
        ]
    })
}

/// Razorpay checkout signature for the test key secret.
pub fn signature_for(order_id: &str, payment_id: &str) -> String {
    type HmacSha256 = Hmac<Sha256>;
    let mut mac = HmacSha256::new_from_slice(TEST_RAZORPAY_SECRET.as_bytes()).unwrap();
    mac.update(format!("{}|{}", order_id, payment_id).as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

/// Parse a money field serialized by the service (decimal-as-string).
pub fn money(value: &Value) -> Decimal {
    value
        .as_str()
        .unwrap_or_else(|| panic!("expected decimal string, got {value}"))
        .parse()
        .unwrap()
}

pub fn dec(s: &str) -> Decimal {
    s.parse().unwrap()
}
