mod common;

use common::{dec, money, signature_for, TestApp};
use serde_json::{json, Value};
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, ResponseTemplate};

async fn start_attempt(app: &TestApp, token: &str) -> Value {
    let response = app
        .client
        .post(format!("{}/checkout/start", app.address))
        .header("x-session-token", token)
        .send()
        .await
        .expect("Failed to start checkout");
    assert_eq!(response.status().as_u16(), 201);
    response.json().await.expect("Invalid checkout response")
}

#[tokio::test]
async fn paid_checkout_completes_end_to_end() {
    let app = TestApp::spawn().await;
    app.mount_catalog().await;
    let token = app.login("asha@example.com").await;

    let attempt = start_attempt(&app, &token).await;
    assert_eq!(attempt["phase"], "plans_ready");
    assert_eq!(attempt["selected_plan_id"], "lic-starter");
    assert_eq!(attempt["plans"].as_array().unwrap().len(), 3);
    let attempt_id = attempt["attempt_id"].as_str().unwrap().to_string();

    Mock::given(method("POST"))
        .and(path("/license/purchase"))
        .and(body_partial_json(json!({
            "email": "asha@example.com",
            "licenseId": "lic-pro",
            "licenseTypeId": "lt-pro",
            "billingCycle": "monthly",
            "interval": "monthly",
            "trial": false,
            "amount": 999,
            "currency": "INR",
            "paymentMode": "razorpay",
            "source": "callifo"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "userId": "user-1",
            "transactionId": "tx-1"
        })))
        .mount(&app.upstream)
        .await;

    Mock::given(method("POST"))
        .and(path("/payment/create-order"))
        .and(body_partial_json(json!({
            "userId": "user-1",
            "licenseId": "lic-pro",
            "billingCycle": "monthly",
            "amount": 117882
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "orderId": "order_123",
            "key": "rzp_test_key",
            "currency": "INR"
        })))
        .mount(&app.upstream)
        .await;

    let response = app
        .client
        .post(format!("{}/checkout/submit", app.address))
        .header("x-session-token", &token)
        .json(&json!({
            "attempt_id": attempt_id,
            "plan_id": "lic-pro",
            "billing_cycle": "monthly",
            "trial": false
        }))
        .send()
        .await
        .expect("Failed to submit checkout");
    assert!(response.status().is_success());

    let submitted: Value = response.json().await.unwrap();
    assert_eq!(submitted["phase"], "gateway_open");
    assert_eq!(money(&submitted["breakdown"]["subtotal"]), dec("999"));
    assert_eq!(money(&submitted["breakdown"]["gst"]), dec("179.82"));
    assert_eq!(money(&submitted["breakdown"]["total"]), dec("1178.82"));

    let gateway = &submitted["gateway"];
    assert_eq!(gateway["key"], "rzp_test_key");
    assert_eq!(gateway["order_id"], "order_123");
    assert_eq!(gateway["amount"].as_u64().unwrap(), 117_882);
    assert_eq!(gateway["currency"], "INR");
    assert_eq!(gateway["prefill_email"], "asha@example.com");

    Mock::given(method("POST"))
        .and(path("/payment/verify"))
        .and(body_partial_json(json!({
            "transactionId": "tx-1",
            "razorpay_payment_id": "pay_987",
            "razorpay_order_id": "order_123"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .mount(&app.upstream)
        .await;

    let response = app
        .client
        .post(format!("{}/checkout/confirm", app.address))
        .header("x-session-token", &token)
        .json(&json!({
            "attempt_id": attempt_id,
            "razorpay_payment_id": "pay_987",
            "razorpay_order_id": "order_123",
            "razorpay_signature": signature_for("order_123", "pay_987")
        }))
        .send()
        .await
        .expect("Failed to confirm payment");
    assert!(response.status().is_success());

    let confirmed: Value = response.json().await.unwrap();
    assert_eq!(confirmed["phase"], "complete");
    assert_eq!(confirmed["receipt_ref"], "tx-1");
}

#[tokio::test]
async fn free_plan_completes_without_gateway() {
    let app = TestApp::spawn().await;
    app.mount_catalog().await;
    let token = app.login("asha@example.com").await;

    let attempt = start_attempt(&app, &token).await;
    let attempt_id = attempt["attempt_id"].as_str().unwrap().to_string();

    // Starter is forced to zero even though the catalog reports 499
    let starter = attempt["plans"]
        .as_array()
        .unwrap()
        .iter()
        .find(|p| p["id"] == "lic-starter")
        .unwrap();
    assert_eq!(money(&starter["price"]), dec("0"));

    Mock::given(method("POST"))
        .and(path("/license/purchase"))
        .and(body_partial_json(json!({
            "paymentMode": "free",
            "trial": true,
            "amount": 0
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "userId": "user-1"
        })))
        .mount(&app.upstream)
        .await;

    let response = app
        .client
        .post(format!("{}/checkout/submit", app.address))
        .header("x-session-token", &token)
        .json(&json!({
            "attempt_id": attempt_id,
            "plan_id": "lic-starter",
            "billing_cycle": "monthly"
        }))
        .send()
        .await
        .unwrap();
    assert!(response.status().is_success());

    let submitted: Value = response.json().await.unwrap();
    assert_eq!(submitted["phase"], "trial_or_free_complete");
    assert_eq!(submitted["receipt_ref"], "free");
    assert_eq!(money(&submitted["breakdown"]["total"]), dec("0"));
    assert!(submitted["gateway"].is_null());
}

#[tokio::test]
async fn trial_waives_payment_on_paid_plan() {
    let app = TestApp::spawn().await;
    app.mount_catalog().await;
    let token = app.login("asha@example.com").await;

    let attempt = start_attempt(&app, &token).await;
    let attempt_id = attempt["attempt_id"].as_str().unwrap().to_string();

    Mock::given(method("POST"))
        .and(path("/license/purchase"))
        .and(body_partial_json(json!({
            "licenseId": "lic-pro",
            "paymentMode": "free",
            "trial": true,
            "amount": 0
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "userId": "user-1",
            "transactionId": "tx-trial"
        })))
        .mount(&app.upstream)
        .await;

    let response = app
        .client
        .post(format!("{}/checkout/submit", app.address))
        .header("x-session-token", &token)
        .json(&json!({
            "attempt_id": attempt_id,
            "plan_id": "lic-pro",
            "billing_cycle": "monthly",
            "trial": true
        }))
        .send()
        .await
        .unwrap();
    assert!(response.status().is_success());

    let submitted: Value = response.json().await.unwrap();
    assert_eq!(submitted["phase"], "trial_or_free_complete");
    assert_eq!(submitted["receipt_ref"], "free");
    // Subtotal is still shown; nothing is due today
    assert_eq!(money(&submitted["breakdown"]["subtotal"]), dec("999"));
    assert_eq!(money(&submitted["breakdown"]["total"]), dec("0"));
    assert!(submitted["breakdown"]["trial_ends_on"].is_string());
}

#[tokio::test]
async fn checkout_requires_a_session() {
    let app = TestApp::spawn().await;
    app.mount_catalog().await;

    let response = app
        .client
        .post(format!("{}/checkout/start", app.address))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 401);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"], "Please login to continue");

    let response = app
        .client
        .post(format!("{}/checkout/start", app.address))
        .header("x-session-token", "not-a-session")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 401);
}

#[tokio::test]
async fn submit_refuses_reentry_while_gateway_open() {
    let app = TestApp::spawn().await;
    app.mount_catalog().await;
    let token = app.login("asha@example.com").await;

    let attempt = start_attempt(&app, &token).await;
    let attempt_id = attempt["attempt_id"].as_str().unwrap().to_string();

    Mock::given(method("POST"))
        .and(path("/license/purchase"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "userId": "user-1",
            "transactionId": "tx-1"
        })))
        .mount(&app.upstream)
        .await;
    Mock::given(method("POST"))
        .and(path("/payment/create-order"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "orderId": "order_123",
            "key": "rzp_test_key",
            "currency": "INR"
        })))
        .mount(&app.upstream)
        .await;

    let submit_body = json!({
        "attempt_id": attempt_id,
        "plan_id": "lic-pro",
        "billing_cycle": "monthly"
    });

    let first = app
        .client
        .post(format!("{}/checkout/submit", app.address))
        .header("x-session-token", &token)
        .json(&submit_body)
        .send()
        .await
        .unwrap();
    assert!(first.status().is_success());

    let second = app
        .client
        .post(format!("{}/checkout/submit", app.address))
        .header("x-session-token", &token)
        .json(&submit_body)
        .send()
        .await
        .unwrap();
    assert_eq!(second.status().as_u16(), 409);
}

#[tokio::test]
async fn order_without_key_fails_the_attempt() {
    let app = TestApp::spawn().await;
    app.mount_catalog().await;
    let token = app.login("asha@example.com").await;

    let attempt = start_attempt(&app, &token).await;
    let attempt_id = attempt["attempt_id"].as_str().unwrap().to_string();

    Mock::given(method("POST"))
        .and(path("/license/purchase"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "userId": "user-1",
            "transactionId": "tx-1"
        })))
        .mount(&app.upstream)
        .await;
    Mock::given(method("POST"))
        .and(path("/payment/create-order"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "orderId": "order_123"
        })))
        .mount(&app.upstream)
        .await;

    let response = app
        .client
        .post(format!("{}/checkout/submit", app.address))
        .header("x-session-token", &token)
        .json(&json!({
            "attempt_id": attempt_id,
            "plan_id": "lic-pro",
            "billing_cycle": "monthly"
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 502);

    let status: Value = app
        .client
        .get(format!("{}/checkout/{}", app.address, attempt_id))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(status["phase"], "failed");
    assert!(status["failure"]
        .as_str()
        .unwrap()
        .contains("order"));
}

#[tokio::test]
async fn forged_signature_fails_the_attempt() {
    let app = TestApp::spawn().await;
    app.mount_catalog().await;
    let token = app.login("asha@example.com").await;

    let attempt = start_attempt(&app, &token).await;
    let attempt_id = attempt["attempt_id"].as_str().unwrap().to_string();

    Mock::given(method("POST"))
        .and(path("/license/purchase"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "userId": "user-1",
            "transactionId": "tx-1"
        })))
        .mount(&app.upstream)
        .await;
    Mock::given(method("POST"))
        .and(path("/payment/create-order"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "orderId": "order_123",
            "key": "rzp_test_key",
            "currency": "INR"
        })))
        .mount(&app.upstream)
        .await;

    app.client
        .post(format!("{}/checkout/submit", app.address))
        .header("x-session-token", &token)
        .json(&json!({
            "attempt_id": attempt_id,
            "plan_id": "lic-pro",
            "billing_cycle": "monthly"
        }))
        .send()
        .await
        .unwrap();

    let response = app
        .client
        .post(format!("{}/checkout/confirm", app.address))
        .header("x-session-token", &token)
        .json(&json!({
            "attempt_id": attempt_id,
            "razorpay_payment_id": "pay_987",
            "razorpay_order_id": "order_123",
            "razorpay_signature": "forged"
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 400);

    let status: Value = app
        .client
        .get(format!("{}/checkout/{}", app.address, attempt_id))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(status["phase"], "failed");
}

#[tokio::test]
async fn mismatched_order_id_is_rejected_before_verification() {
    let app = TestApp::spawn().await;
    app.mount_catalog().await;
    let token = app.login("asha@example.com").await;

    let attempt = start_attempt(&app, &token).await;
    let attempt_id = attempt["attempt_id"].as_str().unwrap().to_string();

    Mock::given(method("POST"))
        .and(path("/license/purchase"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "userId": "user-1",
            "transactionId": "tx-1"
        })))
        .mount(&app.upstream)
        .await;
    Mock::given(method("POST"))
        .and(path("/payment/create-order"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "orderId": "order_123",
            "key": "rzp_test_key",
            "currency": "INR"
        })))
        .mount(&app.upstream)
        .await;

    app.client
        .post(format!("{}/checkout/submit", app.address))
        .header("x-session-token", &token)
        .json(&json!({
            "attempt_id": attempt_id,
            "plan_id": "lic-pro",
            "billing_cycle": "monthly"
        }))
        .send()
        .await
        .unwrap();

    let response = app
        .client
        .post(format!("{}/checkout/confirm", app.address))
        .header("x-session-token", &token)
        .json(&json!({
            "attempt_id": attempt_id,
            "razorpay_payment_id": "pay_987",
            "razorpay_order_id": "order_999",
            "razorpay_signature": signature_for("order_999", "pay_987")
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 400);

    // The attempt is still waiting on the real callback
    let status: Value = app
        .client
        .get(format!("{}/checkout/{}", app.address, attempt_id))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(status["phase"], "gateway_open");
}

#[tokio::test]
async fn catalog_failure_blocks_start() {
    let app = TestApp::spawn().await;
    let token = app.login("asha@example.com").await;

    Mock::given(method("GET"))
        .and(path(format!(
            "/license/licenses-by-product/{}",
            common::TEST_PRODUCT_ID
        )))
        .respond_with(ResponseTemplate::new(500))
        .mount(&app.upstream)
        .await;

    let response = app
        .client
        .post(format!("{}/checkout/start", app.address))
        .header("x-session-token", &token)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 502);
}

#[tokio::test]
async fn quote_computes_yearly_breakdown() {
    let app = TestApp::spawn().await;

    let response = app
        .client
        .post(format!("{}/checkout/quote", app.address))
        .json(&json!({
            "monthly_price": 999,
            "billing_cycle": "yearly"
        }))
        .send()
        .await
        .unwrap();
    assert!(response.status().is_success());

    let breakdown: Value = response.json().await.unwrap();
    assert_eq!(money(&breakdown["base_price_for_cycle"]), dec("11988"));
    assert_eq!(money(&breakdown["subtotal"]), dec("9590"));
    assert_eq!(money(&breakdown["gst"]), dec("1726.20"));
    assert_eq!(money(&breakdown["total"]), dec("11316.20"));
}
