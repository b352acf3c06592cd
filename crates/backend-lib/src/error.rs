// crates/backend-lib/src/error.rs

//! Central error type + Axum integration.
use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::auth::TokenError;
use crate::storage::StoreError;

/// Application error types with error codes and context
#[derive(Error, Debug)]
pub enum AppError {
    /// Login failed. Unknown account and wrong secret are deliberately the same variant.
    #[error("Incorrect username/email/phonenumber or password")]
    BadCredentials,

    #[error("Not authenticated")]
    Unauthenticated,

    #[error("Invalid token")]
    InvalidToken,

    #[error("Token expired")]
    TokenExpired,

    #[error("Malformed token")]
    MalformedToken,

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Account is disabled")]
    AccountDisabled,

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Invalid or expired reset token")]
    InvalidResetToken,

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Authentication rate limit exceeded")]
    AuthRateLimited,

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::BadCredentials
            | AppError::Unauthenticated
            | AppError::InvalidToken
            | AppError::TokenExpired
            | AppError::MalformedToken => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) | AppError::AccountDisabled => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::InvalidResetToken | AppError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            AppError::AuthRateLimited => StatusCode::TOO_MANY_REQUESTS,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get the error code for this error
    pub fn error_code(&self) -> &'static str {
        match self {
            AppError::BadCredentials => "AUTH_001",
            AppError::Unauthenticated => "AUTH_002",
            AppError::InvalidToken => "AUTH_003",
            AppError::TokenExpired => "AUTH_004",
            AppError::MalformedToken => "AUTH_005",
            AppError::Forbidden(_) => "AUTH_006",
            AppError::AccountDisabled => "AUTH_007",
            AppError::AuthRateLimited => "AUTH_008",
            AppError::InvalidResetToken => "RESET_001",
            AppError::NotFound(_) => "NF_001",
            AppError::Conflict(_) => "CONFLICT_001",
            AppError::InvalidInput(_) => "VAL_001",
            AppError::Internal(_) => "INT_001",
        }
    }

    /// Get a sanitized message suitable for production use
    pub fn sanitized_message(&self) -> String {
        match self {
            AppError::BadCredentials => {
                "Incorrect username/email/phonenumber or password".to_string()
            },
            AppError::Unauthenticated => "Not authenticated".to_string(),
            AppError::InvalidToken | AppError::TokenExpired | AppError::MalformedToken => {
                "Invalid token".to_string()
            },
            AppError::Forbidden(_) => "Forbidden".to_string(),
            AppError::AccountDisabled => "Inactive user".to_string(),
            AppError::AuthRateLimited => {
                "Too many authentication attempts, please try again later".to_string()
            },
            AppError::InvalidResetToken => {
                "Invalid or expired reset token. Please request a new password reset.".to_string()
            },
            AppError::NotFound(_) => "Resource not found".to_string(),
            AppError::Conflict(msg) => msg.clone(),
            AppError::InvalidInput(msg) => msg.clone(),
            AppError::Internal(_) => "An internal server error occurred".to_string(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let error_code = self.error_code();

        // Use detailed messages in development, sanitized in production
        let message = if cfg!(debug_assertions) {
            self.to_string()
        } else {
            self.sanitized_message()
        };

        let body = serde_json::json!({
            "error": {
                "code": error_code,
                "message": message,
            }
        });

        let mut response = (status, axum::Json(body)).into_response();
        if status == StatusCode::UNAUTHORIZED {
            response
                .headers_mut()
                .insert(header::WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
        }
        response
    }
}

impl From<TokenError> for AppError {
    fn from(err: TokenError) -> Self {
        match err {
            TokenError::Expired => AppError::TokenExpired,
            TokenError::InvalidSignature => AppError::InvalidToken,
            TokenError::Malformed(_) => AppError::MalformedToken,
            TokenError::Encoding(msg) => AppError::Internal(msg),
        }
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(id) => AppError::NotFound(format!("account {id}")),
            StoreError::Conflict(field) => {
                AppError::Conflict(format!("{} already registered", capitalize(field)))
            },
            other => AppError::Internal(other.to_string()),
        }
    }
}

impl From<tokio::task::JoinError> for AppError {
    fn from(err: tokio::task::JoinError) -> Self {
        AppError::Internal(format!("blocking task failed: {err}"))
    }
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;
    use axum::response::IntoResponse;

    #[test]
    fn test_app_error_display() {
        assert_eq!(
            AppError::BadCredentials.to_string(),
            "Incorrect username/email/phonenumber or password"
        );
        assert_eq!(
            AppError::NotFound("account 7".to_string()).to_string(),
            "Not found: account 7"
        );
        assert_eq!(AppError::AuthRateLimited.to_string(), "Authentication rate limit exceeded");
    }

    #[test]
    fn test_app_error_status_codes() {
        assert_eq!(AppError::BadCredentials.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(AppError::TokenExpired.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            AppError::Forbidden("admin".to_string()).status_code(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(AppError::AccountDisabled.status_code(), StatusCode::FORBIDDEN);
        assert_eq!(AppError::InvalidResetToken.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(
            AppError::Conflict("x".to_string()).status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(AppError::AuthRateLimited.status_code(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(
            AppError::Internal("test".to_string()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_token_errors_collapse_to_unauthenticated() {
        for err in [
            TokenError::Expired,
            TokenError::InvalidSignature,
            TokenError::Malformed("bad base64".to_string()),
        ] {
            let app: AppError = err.into();
            assert_eq!(app.status_code(), StatusCode::UNAUTHORIZED);
        }
    }

    #[test]
    fn test_store_conflict_message() {
        let app: AppError = StoreError::Conflict("username").into();
        assert_eq!(app.to_string(), "Conflict: Username already registered");
        assert_eq!(app.sanitized_message(), "Username already registered");
    }

    #[test]
    fn test_unauthorized_response_has_challenge_header() {
        let response = AppError::InvalidToken.into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(response.headers().get(header::WWW_AUTHENTICATE).unwrap(), "Bearer");

        let response = AppError::NotFound("x".to_string()).into_response();
        assert!(response.headers().get(header::WWW_AUTHENTICATE).is_none());
        assert!(response
            .headers()
            .get("content-type")
            .unwrap()
            .to_str()
            .unwrap()
            .contains("application/json"));
    }
}
