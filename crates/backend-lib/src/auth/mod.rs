// ============================
// authority-backend/src/auth/mod.rs
// ============================
//! Authentication module.

pub mod clock;
pub mod password;
pub mod rate_limit;
pub mod reset;
pub mod session;
pub mod token;
mod service;
mod service_impl;

pub use clock::{Clock, ManualClock, SystemClock};
pub use password::{
    validate_password_strength, verify_password, PasswordRequirements, SecretHasher,
    MIN_PASSWORD_LENGTH,
};
pub use rate_limit::AuthRateLimiter;
pub use reset::ResetTokenStore;
pub use service::AuthService;
pub use service_impl::DefaultAuth;
pub use session::{strip_bearer, AuthState, Principal, SessionAuthority, SESSION_TTL_SECS};
pub use token::{Identity, SessionClaims, SignedToken, TokenCodec, TokenError};
