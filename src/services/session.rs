//! Session provider for the logged-in user record.
//!
//! One record per token: written on login/signup, cleared only on
//! explicit logout. There is no expiry or refresh; presence of the
//! record is the entire gate condition for checkout.

use dashmap::DashMap;
use std::sync::Arc;
use uuid::Uuid;

use crate::models::SessionUser;

#[derive(Clone, Default)]
pub struct SessionStore {
    sessions: Arc<DashMap<String, SessionUser>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Persist a user record and return its token.
    pub fn write(&self, user: SessionUser) -> String {
        let token = Uuid::new_v4().to_string();
        tracing::debug!(email = %user.email, "Session written");
        self.sessions.insert(token.clone(), user);
        token
    }

    pub fn read(&self, token: &str) -> Option<SessionUser> {
        self.sessions.get(token).map(|entry| entry.value().clone())
    }

    pub fn clear(&self, token: &str) {
        if self.sessions.remove(token).is_some() {
            tracing::debug!("Session cleared");
        }
    }
}
