use axum::http::{HeaderName, HeaderValue};

/// The single outbound auth header to attach to a downstream request,
/// computed per §4.4's table.
pub struct RemappedHeader {
    pub name: HeaderName,
    pub value: HeaderValue,
}

/// Translates the client's bearer credential into whatever header shape
/// the downstream expects.
pub fn remap(auth_header_format: &str, credential: &str) -> Result<RemappedHeader, RemapError> {
    let (name, value) = match auth_header_format {
        "Bearer" => ("Authorization".to_string(), format!("Bearer {credential}")),
        "token" => ("Authorization".to_string(), format!("token {credential}")),
        "Basic" => ("Authorization".to_string(), format!("Basic {credential}")),
        other => (other.to_string(), credential.to_string()),
    };

    Ok(RemappedHeader {
        name: HeaderName::try_from(name).map_err(|_| RemapError::InvalidHeaderName)?,
        value: HeaderValue::try_from(value).map_err(|_| RemapError::InvalidHeaderValue)?,
    })
}

#[derive(Debug, thiserror::Error)]
pub enum RemapError {
    #[error("invalid header name for this downstream")]
    InvalidHeaderName,
    #[error("invalid header value")]
    InvalidHeaderValue,
}

/// Strips the `Bearer ` prefix from an inbound `Authorization` header,
/// returning the raw credential. Anything else is malformed.
pub fn extract_bearer(authorization: &str) -> Option<&str> {
    authorization.strip_prefix("Bearer ")
}
