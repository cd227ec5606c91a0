pub mod config;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod services;
pub mod startup;

use config::Config;
use services::{CheckoutFlow, LicensingClient, RazorpayGateway, SessionStore};

#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub licensing: LicensingClient,
    pub gateway: RazorpayGateway,
    pub sessions: SessionStore,
    pub checkout: CheckoutFlow,
}
