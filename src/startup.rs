use axum::middleware::from_fn;
use axum::{
    routing::{get, post},
    Router,
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::handlers;
use crate::middleware::request_id_middleware;
use crate::services::{CheckoutFlow, LicensingClient, RazorpayGateway, SessionStore};
use crate::AppState;

pub struct Application {
    port: u16,
    listener: tokio::net::TcpListener,
    router: Router,
}

impl Application {
    pub async fn build(config: Config) -> anyhow::Result<Self> {
        let licensing = LicensingClient::new(config.licensing.clone());
        let gateway = RazorpayGateway::new(config.razorpay.clone());

        if gateway.is_configured() {
            tracing::info!("Local payment-signature verification enabled");
        } else {
            tracing::warn!(
                "Razorpay key secret not configured - relying on upstream verification only"
            );
        }

        let sessions = SessionStore::new();
        let checkout = CheckoutFlow::new(licensing.clone(), gateway.clone());

        let state = AppState {
            config: config.clone(),
            licensing,
            gateway,
            sessions,
            checkout,
        };

        let router = Router::new()
            .route("/health", get(handlers::health_check))
            .route("/plans", get(handlers::plans::list_plans))
            // Checkout lifecycle
            .route("/checkout/quote", post(handlers::checkout::quote))
            .route("/checkout/start", post(handlers::checkout::start))
            .route("/checkout/submit", post(handlers::checkout::submit))
            .route("/checkout/confirm", post(handlers::checkout::confirm))
            .route("/checkout/:id", get(handlers::checkout::status))
            // Success view
            .route("/receipt", get(handlers::receipts::receipt))
            // Login/signup via the upstream customer directory
            .route("/auth/signup", post(handlers::auth::signup))
            .route("/auth/login", post(handlers::auth::login))
            .route("/auth/session", get(handlers::auth::session))
            .route("/auth/logout", post(handlers::auth::logout))
            .layer(CorsLayer::permissive())
            .layer(from_fn(request_id_middleware))
            .layer(
                TraceLayer::new_for_http().make_span_with(|request: &axum::http::Request<_>| {
                    let request_id = request
                        .headers()
                        .get("x-request-id")
                        .and_then(|value| value.to_str().ok())
                        .unwrap_or("-");

                    tracing::info_span!(
                        "http_request",
                        request_id = %request_id,
                        method = %request.method(),
                        uri = %request.uri(),
                        email = tracing::field::Empty,
                    )
                }),
            )
            .with_state(state);

        let listener =
            tokio::net::TcpListener::bind((config.server.host.as_str(), config.server.port))
                .await?;
        let port = listener.local_addr()?.port();

        Ok(Self {
            port,
            listener,
            router,
        })
    }

    pub async fn run_until_stopped(self) -> anyhow::Result<()> {
        tracing::info!("Listening on {}", self.listener.local_addr()?);
        axum::serve(self.listener, self.router).await?;
        Ok(())
    }

    pub fn port(&self) -> u16 {
        self.port
    }
}
