// ============================
// authority-backend/src/lib.rs
// ============================
//! Account service and session token authority.

pub mod auth;
pub mod config;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod middleware;
pub mod router;
pub mod storage;
pub mod validation;

use std::sync::Arc;
use std::time::Duration;

use crate::auth::{AuthRateLimiter, AuthService, Clock, DefaultAuth, SystemClock};
use crate::config::Settings;
use crate::error::AppError;
use crate::storage::AccountStore;

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    /// Authentication service
    pub auth: Arc<dyn AuthService>,
    /// Validated settings
    pub settings: Arc<Settings>,
    /// Failed-login lockout
    pub login_limiter: Arc<AuthRateLimiter>,
}

impl AppState {
    /// Create a new application state on the wall clock
    pub fn new(store: Arc<dyn AccountStore>, settings: Settings) -> Result<Self, AppError> {
        Self::with_clock(store, settings, Arc::new(SystemClock))
    }

    /// Create a new application state with an explicit time source
    pub fn with_clock(
        store: Arc<dyn AccountStore>,
        settings: Settings,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, AppError> {
        settings
            .validate()
            .map_err(|e| AppError::Internal(e.to_string()))?;

        let auth = Arc::new(DefaultAuth::from_settings(store, &settings, clock)?);
        let login_limiter = Arc::new(AuthRateLimiter::new(
            settings.rate_limit.max_attempts,
            Duration::from_secs(settings.rate_limit.lockout_secs),
        ));

        Ok(Self {
            auth,
            settings: Arc::new(settings),
            login_limiter,
        })
    }
}
