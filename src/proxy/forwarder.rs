use axum::body::{Body, Bytes};
use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::response::Response;

use crate::auth::header::{extract_bearer, remap};
use crate::auth::resolve_downstream_name;
use crate::error::AppError;
use crate::registry::DownstreamDefinition;
use crate::state::AppState;

fn lookup<'a>(state: &'a AppState, path: &str) -> Result<&'a DownstreamDefinition, AppError> {
    let name = resolve_downstream_name(path);
    state.registry.lookup(name).ok_or(AppError::NotFound)
}

fn bearer_credential<'a>(headers: &'a HeaderMap, state: &AppState) -> Result<&'a str, AppError> {
    let raw = headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| AppError::Unauthorized {
            base_url: state.public_url().to_string(),
            error: None,
        })?;
    extract_bearer(raw).ok_or_else(|| AppError::Unauthorized {
        base_url: state.public_url().to_string(),
        error: Some("invalid_token"),
    })
}

/// SSE passthrough: every byte the downstream writes goes straight to the
/// client, verbatim and unbuffered. No JSON-RPC framing is inspected here.
pub async fn mcp_get_handler(
    State(state): State<AppState>,
    Path(path): Path<String>,
    headers: HeaderMap,
) -> Result<Response, AppError> {
    let downstream = lookup(&state, &path)?;
    let credential = bearer_credential(&headers, &state)?;
    let remapped = remap(downstream.auth_header_format(), credential)
        .map_err(|e| AppError::Internal(format!("header remap failed: {e}")))?;

    let downstream_response = state
        .http_client
        .get(downstream.downstream_url())
        .header(remapped.name, remapped.value)
        .header(axum::http::header::ACCEPT, "text/event-stream")
        .send()
        .await
        .map_err(|e| AppError::BadGateway(format!("downstream request failed: {e}")))?;

    if !downstream_response.status().is_success() {
        return Err(AppError::BadGateway(format!(
            "downstream returned {} during SSE setup",
            downstream_response.status()
        )));
    }

    Response::builder()
        .status(axum::http::StatusCode::OK)
        .header(axum::http::header::CONTENT_TYPE, "text/event-stream")
        .header(axum::http::header::CACHE_CONTROL, "no-cache")
        .header(axum::http::header::CONNECTION, "keep-alive")
        .body(Body::from_stream(downstream_response.bytes_stream()))
        .map_err(|e| AppError::Internal(format!("failed to build downstream response: {e}")))
}

pub async fn mcp_post_handler(
    State(state): State<AppState>,
    Path(path): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, AppError> {
    let downstream = lookup(&state, &path)?;
    let credential = bearer_credential(&headers, &state)?;
    let remapped = remap(downstream.auth_header_format(), credential)
        .map_err(|e| AppError::Internal(format!("header remap failed: {e}")))?;

    let downstream_response = state
        .http_client
        .post(downstream.downstream_url())
        .header(remapped.name, remapped.value)
        .header(axum::http::header::CONTENT_TYPE, "application/json")
        .body(body)
        .send()
        .await
        .map_err(|e| AppError::BadGateway(format!("downstream request failed: {e}")))?;

    let status = downstream_response.status();
    let mut response_builder = Response::builder().status(status);
    if let Some(content_type) = downstream_response.headers().get(axum::http::header::CONTENT_TYPE) {
        response_builder = response_builder.header(axum::http::header::CONTENT_TYPE, content_type);
    }

    response_builder
        .body(Body::from_stream(downstream_response.bytes_stream()))
        .map_err(|e| AppError::Internal(format!("failed to build downstream response: {e}")))
}
