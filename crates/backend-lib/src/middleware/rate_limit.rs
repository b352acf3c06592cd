// ============================
// authority-backend/src/middleware/rate_limit.rs
// ============================
use std::convert::Infallible;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use axum::{
    extract::{ConnectInfo, FromRequestParts, Request, State},
    http::{header::RETRY_AFTER, request::Parts, HeaderValue, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::{error::AppError, AppState};

/// Caller address used to key login lockouts
#[derive(Debug, Clone, Copy)]
pub struct ClientIp(pub Option<IpAddr>);

/// The peer address, or `x-real-ip` when the deployment trusts its proxy
fn client_ip(parts: &Parts, trust_forwarded: bool) -> Option<IpAddr> {
    let forwarded = trust_forwarded
        .then(|| parts.headers.get("x-real-ip"))
        .flatten()
        .and_then(|h| h.to_str().ok())
        .and_then(|v| v.trim().parse::<IpAddr>().ok());
    let peer = parts
        .extensions
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip());
    forwarded.or(peer)
}

impl FromRequestParts<Arc<AppState>> for ClientIp {
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        Ok(Self(client_ip(parts, state.settings.rate_limit.trust_forwarded_ip)))
    }
}

/// Lock out callers after repeated failed logins.
///
/// A 401 from the login handler counts as a failure and a success clears the
/// record. Requests with no known address pass through unthrottled.
pub async fn login_throttle(
    State(state): State<Arc<AppState>>,
    ClientIp(ip): ClientIp,
    request: Request,
    next: Next,
) -> Response {
    let Some(ip) = ip else {
        return next.run(request).await;
    };

    if let Some(wait) = state.login_limiter.retry_after(ip) {
        tracing::warn!(%ip, retry_after = wait.as_secs(), "login attempt during lockout");
        let mut response = AppError::AuthRateLimited.into_response();
        if let Ok(value) = HeaderValue::from_str(&wait.as_secs().max(1).to_string()) {
            response.headers_mut().insert(RETRY_AFTER, value);
        }
        return response;
    }

    let response = next.run(request).await;
    match response.status() {
        StatusCode::UNAUTHORIZED => state.login_limiter.record_failed_attempt(ip),
        status if status.is_success() => state.login_limiter.record_success(ip),
        _ => {},
    }
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request as HttpRequest;

    fn parts(real_ip: Option<&str>, peer: Option<[u8; 4]>) -> Parts {
        let mut builder = HttpRequest::builder();
        if let Some(value) = real_ip {
            builder = builder.header("x-real-ip", value);
        }
        let mut request = builder.body(Body::empty()).unwrap();
        if let Some(octets) = peer {
            request.extensions_mut().insert(ConnectInfo(SocketAddr::from((octets, 4000))));
        }
        request.into_parts().0
    }

    #[test]
    fn test_spoofed_header_ignored_by_default() {
        let request = parts(Some("203.0.113.7"), Some([10, 0, 0, 1]));
        assert_eq!(client_ip(&request, false), Some("10.0.0.1".parse().unwrap()));

        // without a peer address the header alone is not enough
        let headless = parts(Some("203.0.113.7"), None);
        assert_eq!(client_ip(&headless, false), None);
    }

    #[test]
    fn test_trusted_proxy_header_wins() {
        let request = parts(Some("203.0.113.7"), Some([10, 0, 0, 1]));
        assert_eq!(client_ip(&request, true), Some("203.0.113.7".parse().unwrap()));
    }

    #[test]
    fn test_client_ip_falls_back_to_peer() {
        let request = parts(Some("not-an-ip"), Some([10, 0, 0, 1]));
        assert_eq!(client_ip(&request, true), Some("10.0.0.1".parse().unwrap()));

        assert_eq!(client_ip(&parts(None, None), true), None);
    }
}
