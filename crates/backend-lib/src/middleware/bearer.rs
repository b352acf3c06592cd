// ============================
// authority-backend/src/middleware/bearer.rs
// ============================
//! Access-token extraction from the `Authorization` header or the
//! `access_token` cookie, and the extractors built on it.
use std::sync::Arc;

use axum::extract::FromRequestParts;
use axum::http::header::{AUTHORIZATION, COOKIE};
use axum::http::request::Parts;
use axum::http::{HeaderMap, HeaderValue};

use crate::auth::{strip_bearer, AuthState, Principal};
use crate::error::AppError;
use crate::AppState;

/// Name of the cookie carrying the access token
pub const ACCESS_TOKEN_COOKIE: &str = "access_token";

/// The token a request presented, if any. The header wins over the cookie.
pub fn presented_token(headers: &HeaderMap) -> Option<String> {
    let from_header = headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .map(strip_bearer)
        .filter(|t| !t.is_empty());

    from_header
        .or_else(|| cookie_value(headers, ACCESS_TOKEN_COOKIE).map(strip_bearer))
        .filter(|t| !t.is_empty())
        .map(str::to_string)
}

fn cookie_value<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value.trim().trim_matches('"'))
}

/// `Set-Cookie` value carrying a freshly issued token
pub fn access_cookie(token: &str, max_age_secs: u64, secure: bool) -> Result<HeaderValue, AppError> {
    let mut cookie = format!(
        "{ACCESS_TOKEN_COOKIE}={token}; HttpOnly; SameSite=Lax; Path=/; Max-Age={max_age_secs}"
    );
    if secure {
        cookie.push_str("; Secure");
    }
    HeaderValue::from_str(&cookie).map_err(|e| AppError::Internal(format!("invalid cookie: {e}")))
}

/// `Set-Cookie` value that clears the access-token cookie
pub fn expired_access_cookie(secure: bool) -> HeaderValue {
    if secure {
        HeaderValue::from_static("access_token=; HttpOnly; SameSite=Lax; Path=/; Max-Age=0; Secure")
    } else {
        HeaderValue::from_static("access_token=; HttpOnly; SameSite=Lax; Path=/; Max-Age=0")
    }
}

/// Raw presented token, not yet verified
#[derive(Debug, Clone)]
pub struct PresentedToken(pub Option<String>);

impl<S: Send + Sync> FromRequestParts<S> for PresentedToken {
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self(presented_token(&parts.headers)))
    }
}

/// A caller holding a valid token for an enabled account
#[derive(Debug, Clone)]
pub struct CurrentAccount(pub Principal);

impl FromRequestParts<Arc<AppState>> for CurrentAccount {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let presented = presented_token(&parts.headers);
        match state.auth.resolve(presented.as_deref()).await {
            AuthState::Authenticated(principal) => Ok(Self(principal)),
            AuthState::Anonymous => Err(AppError::Unauthenticated),
            AuthState::Rejected(err) => Err(err),
        }
    }
}

/// A caller whose token and account both carry the admin flag
#[derive(Debug, Clone)]
pub struct AdminAccount(pub Principal);

impl FromRequestParts<Arc<AppState>> for AdminAccount {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let token = presented_token(&parts.headers).ok_or(AppError::Unauthenticated)?;
        state.auth.authorize_admin(&token).await.map(Self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers(pairs: &[(&'static str, &'static str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.append(*name, HeaderValue::from_static(*value));
        }
        map
    }

    #[test]
    fn test_header_token() {
        let map = headers(&[("authorization", "Bearer abc.def.ghi")]);
        assert_eq!(presented_token(&map).as_deref(), Some("abc.def.ghi"));

        let map = headers(&[("authorization", "abc.def.ghi")]);
        assert_eq!(presented_token(&map).as_deref(), Some("abc.def.ghi"));
    }

    #[test]
    fn test_cookie_token() {
        let map = headers(&[("cookie", "theme=dark; access_token=abc.def.ghi")]);
        assert_eq!(presented_token(&map).as_deref(), Some("abc.def.ghi"));

        let map = headers(&[("cookie", "theme=dark"), ("cookie", "access_token=\"Bearer xyz\"")]);
        assert_eq!(presented_token(&map).as_deref(), Some("xyz"));
    }

    #[test]
    fn test_header_wins_over_cookie() {
        let map = headers(&[
            ("authorization", "Bearer from-header"),
            ("cookie", "access_token=from-cookie"),
        ]);
        assert_eq!(presented_token(&map).as_deref(), Some("from-header"));

        // an empty header falls through to the cookie
        let map = headers(&[("authorization", "Bearer "), ("cookie", "access_token=from-cookie")]);
        assert_eq!(presented_token(&map).as_deref(), Some("from-cookie"));
    }

    #[test]
    fn test_no_token() {
        assert!(presented_token(&HeaderMap::new()).is_none());
        let map = headers(&[("cookie", "access_token=")]);
        assert!(presented_token(&map).is_none());
    }

    #[test]
    fn test_cookie_attributes() {
        let cookie = access_cookie("abc", 1800, true).unwrap();
        let cookie = cookie.to_str().unwrap();
        assert!(cookie.starts_with("access_token=abc;"));
        assert!(cookie.contains("HttpOnly"));
        assert!(cookie.contains("Max-Age=1800"));
        assert!(cookie.ends_with("; Secure"));

        let cleared = expired_access_cookie(false);
        assert!(cleared.to_str().unwrap().contains("Max-Age=0"));
        assert!(!cleared.to_str().unwrap().contains("Secure"));
    }
}
