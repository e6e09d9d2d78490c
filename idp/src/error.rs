use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

/// Process-level failures. Key generation is the interesting one: the provider
/// must never serve `/token` or `/jwks.json` without signing keys, so these
/// abort startup instead of being mapped to a response.
#[derive(Debug, Error)]
pub enum IdpError {
    #[error("config error: {0}")]
    Config(#[from] crate::config::ConfigError),

    #[error("key generation failed: {0}")]
    KeyGeneration(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// OAuth2 token-endpoint error responses (RFC 6749 §5.2 shape).
#[derive(Debug, Error)]
pub enum TokenError {
    #[error("unsupported grant type")]
    UnsupportedGrantType,

    #[error("invalid grant: {0}")]
    InvalidGrant(&'static str),

    #[error("signing failed")]
    Signing,
}

#[derive(Serialize)]
struct OAuthErrorBody {
    error: &'static str,
    error_description: String,
}

impl IntoResponse for TokenError {
    fn into_response(self) -> Response {
        let (status, error, description) = match self {
            TokenError::UnsupportedGrantType => (
                StatusCode::BAD_REQUEST,
                "unsupported_grant_type",
                "Only authorization_code grant type is supported.".to_string(),
            ),
            TokenError::InvalidGrant(reason) => {
                (StatusCode::BAD_REQUEST, "invalid_grant", reason.to_string())
            }
            TokenError::Signing => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "server_error",
                "Failed to sign ID token.".to_string(),
            ),
        };

        let body = OAuthErrorBody {
            error,
            error_description: description,
        };

        (status, Json(body)).into_response()
    }
}
