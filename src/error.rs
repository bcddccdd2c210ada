use axum::http::{HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Json, Response};
use serde::Serialize;

/// The full error taxonomy collapsed to what's visible at the boundary
/// (§7). Every variant logs path/status only — never token material,
/// bearer credentials, or decrypted grant contents.
#[derive(Debug)]
pub enum AppError {
    /// Plain-text 400: bad params, malformed form body, bad response_type.
    BadRequest(String),
    /// JSON `{error, error_description}` 400 at the token endpoint, per
    /// RFC 6749 §5.2. Also used for the invalid_grant/invalid_state cases
    /// that must never disclose *which* check failed.
    TokenError {
        error: &'static str,
        description: String,
    },
    /// 401 on MCP endpoints for a missing/malformed bearer credential.
    Unauthorized { base_url: String, error: Option<&'static str> },
    /// 404 on an unknown path prefix.
    NotFound,
    /// 502: downstream unreachable, timed out, or non-2xx.
    BadGateway(String),
    /// 500: a configuration invariant broke at request time even though
    /// it's checked at startup. Bodies are generic by design.
    Internal(String),
}

#[derive(Serialize)]
struct TokenErrorBody {
    error: &'static str,
    error_description: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match self {
            AppError::BadRequest(msg) => {
                tracing::warn!(status = 400, "bad request: {msg}");
                (StatusCode::BAD_REQUEST, msg).into_response()
            }
            AppError::TokenError { error, description } => {
                tracing::warn!(status = 400, error, "token endpoint error");
                (
                    StatusCode::BAD_REQUEST,
                    Json(TokenErrorBody {
                        error,
                        error_description: description,
                    }),
                )
                    .into_response()
            }
            AppError::Unauthorized { base_url, error } => {
                tracing::warn!(status = 401, "unauthorized");
                let www_auth = match error {
                    Some(err) => format!(
                        "Bearer realm=\"{base_url}\", resource_metadata=\"{base_url}/.well-known/oauth-protected-resource\", error=\"{err}\""
                    ),
                    None => format!(
                        "Bearer realm=\"{base_url}\", resource_metadata=\"{base_url}/.well-known/oauth-protected-resource\""
                    ),
                };
                let mut response = StatusCode::UNAUTHORIZED.into_response();
                if let Ok(value) = HeaderValue::from_str(&www_auth) {
                    response.headers_mut().insert(header::WWW_AUTHENTICATE, value);
                }
                response
            }
            AppError::NotFound => {
                tracing::warn!(status = 404, "unknown path prefix");
                StatusCode::NOT_FOUND.into_response()
            }
            AppError::BadGateway(msg) => {
                tracing::warn!(status = 502, "bad gateway: {msg}");
                StatusCode::BAD_GATEWAY.into_response()
            }
            AppError::Internal(msg) => {
                tracing::error!(status = 500, "internal error: {msg}");
                StatusCode::INTERNAL_SERVER_ERROR.into_response()
            }
        }
    }
}

impl From<crate::crypto::CodecError> for AppError {
    fn from(err: crate::crypto::CodecError) -> Self {
        match err {
            crate::crypto::CodecError::InvalidGrant => AppError::TokenError {
                error: "invalid_grant",
                description: "the authorization code is invalid or expired".into(),
            },
            crate::crypto::CodecError::InvalidState => {
                AppError::BadRequest("invalid_state".into())
            }
        }
    }
}
