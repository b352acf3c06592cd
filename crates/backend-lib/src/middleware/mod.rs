// crates/backend-lib/src/middleware/mod.rs

//! Request extractors and middleware for the account service.

pub mod bearer;
pub mod rate_limit;

pub use bearer::{
    access_cookie, expired_access_cookie, presented_token, AdminAccount, CurrentAccount,
    PresentedToken, ACCESS_TOKEN_COOKIE,
};
pub use rate_limit::{login_throttle, ClientIp};
