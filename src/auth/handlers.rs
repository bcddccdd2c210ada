use std::time::{SystemTime, UNIX_EPOCH};

use axum::extract::rejection::FormRejection;
use axum::extract::{Form, Path, Query, State};
use axum::response::{Html, IntoResponse, Json, Redirect, Response};
use serde::{Deserialize, Serialize};

use super::grant::{AuthorizationGrant, ChainedOAuthFlowState, DownstreamTokens, PkceMethod};
use super::resolve_downstream_name;
use crate::crypto::{open_grant, seal_grant, sign_state, verify_pkce, verify_state};
use crate::error::AppError;
use crate::registry::DownstreamDefinition;
use crate::state::AppState;

fn now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock is before the unix epoch")
        .as_secs() as i64
}

fn lookup<'a>(state: &'a AppState, path: &str) -> Result<&'a DownstreamDefinition, AppError> {
    let name = resolve_downstream_name(path);
    state.registry.lookup(name).ok_or(AppError::NotFound)
}

// ---- discovery (§4.6, §6) ----------------------------------------------

#[derive(Serialize)]
struct ProtectedResourceMetadata {
    resource: String,
    authorization_servers: Vec<String>,
}

pub async fn protected_resource_metadata_handler(
    State(state): State<AppState>,
    Path(path): Path<String>,
) -> Result<Response, AppError> {
    let downstream = lookup(&state, &path)?;
    let resource = format!("{}/mcp/{}", state.public_url(), downstream.name());
    Ok(Json(ProtectedResourceMetadata {
        authorization_servers: vec![resource.clone()],
        resource,
    })
    .into_response())
}

#[derive(Serialize)]
struct AuthorizationServerMetadata {
    issuer: String,
    authorization_endpoint: String,
    token_endpoint: String,
    response_types_supported: Vec<&'static str>,
    grant_types_supported: Vec<&'static str>,
    code_challenge_methods_supported: Vec<&'static str>,
    token_endpoint_auth_methods_supported: Vec<&'static str>,
}

pub async fn authorization_server_metadata_handler(
    State(state): State<AppState>,
    Path(path): Path<String>,
) -> Result<Response, AppError> {
    let downstream = lookup(&state, &path)?;
    let name = downstream.name();
    let grant_types = if downstream.supports_refresh() {
        vec!["authorization_code", "refresh_token"]
    } else {
        vec!["authorization_code"]
    };

    Ok(Json(AuthorizationServerMetadata {
        issuer: format!("{}/mcp/{}", state.public_url(), name),
        authorization_endpoint: format!("{}/authorize/mcp/{}", state.public_url(), name),
        token_endpoint: format!("{}/token/mcp/{}", state.public_url(), name),
        response_types_supported: vec!["code"],
        grant_types_supported: grant_types,
        code_challenge_methods_supported: vec!["S256"],
        token_endpoint_auth_methods_supported: vec!["none"],
    })
    .into_response())
}

// ---- authorize (§4.6) ---------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct AuthorizeQuery {
    pub response_type: Option<String>,
    #[allow(dead_code)]
    pub client_id: Option<String>,
    pub redirect_uri: Option<String>,
    pub code_challenge: Option<String>,
    pub code_challenge_method: Option<String>,
    pub state: Option<String>,
    #[allow(dead_code)]
    pub scope: Option<String>,
    #[allow(dead_code)]
    pub resource: Option<String>,
}

pub async fn authorize_get_handler(
    State(state): State<AppState>,
    Path(path): Path<String>,
    Query(query): Query<AuthorizeQuery>,
) -> Result<Response, AppError> {
    let downstream = lookup(&state, &path)?;

    if query.response_type.as_deref() != Some("code") {
        return Err(AppError::BadRequest(
            "response_type must be \"code\"".into(),
        ));
    }
    if query.code_challenge_method.as_deref() != Some("S256") {
        return Err(AppError::BadRequest(
            "code_challenge_method must be \"S256\"".into(),
        ));
    }
    let redirect_uri = query
        .redirect_uri
        .ok_or_else(|| AppError::BadRequest("missing required parameter: redirect_uri".into()))?;
    let code_challenge = query.code_challenge.ok_or_else(|| {
        AppError::BadRequest("missing required parameter: code_challenge".into())
    })?;

    match downstream {
        DownstreamDefinition::Passthrough {
            display_name,
            auth_hint,
            ..
        } => {
            let html = passthrough_form(
                display_name,
                auth_hint,
                query.state.as_deref().unwrap_or(""),
                &redirect_uri,
                &code_challenge,
            );
            Ok(Html(html).into_response())
        }
        DownstreamDefinition::ChainedOauth {
            name,
            oauth_authorize_url,
            oauth_client_id,
            oauth_scopes,
            ..
        } => {
            let flow_state = ChainedOAuthFlowState {
                claude_state: query.state.unwrap_or_default(),
                claude_redirect_uri: redirect_uri,
                pkce_challenge: code_challenge,
                pkce_method: PkceMethod::S256,
                exp: now() + 600,
            };
            let signed = sign_state(&flow_state, state.state_secret())
                .map_err(|_| AppError::Internal("failed to sign flow state".into()))?;

            let callback_url = format!("{}/callback/mcp/{name}", state.public_url());
            let mut target = url::Url::parse(oauth_authorize_url).map_err(|_| {
                AppError::Internal("downstream oauth_authorize_url is invalid".into())
            })?;
            target
                .query_pairs_mut()
                .append_pair("client_id", oauth_client_id)
                .append_pair("redirect_uri", &callback_url)
                .append_pair("state", &signed)
                .append_pair("scope", oauth_scopes)
                .append_pair("response_type", "code");

            Ok(Redirect::to(target.as_str()).into_response())
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct AuthorizeForm {
    pub state: Option<String>,
    pub redirect_uri: String,
    pub code_challenge: String,
    pub code_challenge_method: String,
    pub token: String,
}

pub async fn authorize_post_handler(
    State(state): State<AppState>,
    Path(path): Path<String>,
    Form(form): Form<AuthorizeForm>,
) -> Result<Response, AppError> {
    let downstream = lookup(&state, &path)?;
    let DownstreamDefinition::Passthrough { .. } = downstream else {
        return Err(AppError::BadRequest(
            "this downstream does not accept a form submission".into(),
        ));
    };

    if form.code_challenge_method != "S256" {
        return Err(AppError::BadRequest(
            "code_challenge_method must be \"S256\"".into(),
        ));
    }

    let grant = AuthorizationGrant {
        downstream_tokens: DownstreamTokens::Passthrough {
            access_token: form.token,
        },
        pkce_challenge: form.code_challenge,
        redirect_uri: form.redirect_uri.clone(),
        exp: now() + state.auth_code_ttl() as i64,
    };
    let code = seal_grant(&grant, state.state_secret())
        .map_err(|_| AppError::Internal("failed to seal authorization code".into()))?;

    let mut redirect_url = form.redirect_uri;
    redirect_url.push_str(if redirect_url.contains('?') { "&" } else { "?" });
    redirect_url.push_str(&format!("code={}", urlencoding::encode(&code)));
    if let Some(client_state) = form.state {
        redirect_url.push_str(&format!("&state={}", urlencoding::encode(&client_state)));
    }

    Ok(Redirect::to(&redirect_url).into_response())
}

fn passthrough_form(
    display_name: &str,
    auth_hint: &str,
    state: &str,
    redirect_uri: &str,
    code_challenge: &str,
) -> String {
    format!(
        r#"<!DOCTYPE html>
<html>
<head>
<title>Authorize {display_name}</title>
<meta name="viewport" content="width=device-width, initial-scale=1">
</head>
<body>
<h1>Authorize {display_name}</h1>
<p>{auth_hint}</p>
<form method="post">
<input type="hidden" name="state" value="{state}">
<input type="hidden" name="redirect_uri" value="{redirect_uri}">
<input type="hidden" name="code_challenge" value="{code_challenge}">
<input type="hidden" name="code_challenge_method" value="S256">
<input type="password" name="token" placeholder="paste your credential" required>
<button type="submit">Authorize</button>
</form>
</body>
</html>"#,
        display_name = html_escape(display_name),
        auth_hint = html_escape(auth_hint),
        state = html_escape(state),
        redirect_uri = html_escape(redirect_uri),
        code_challenge = html_escape(code_challenge),
    )
}

fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

// ---- callback (chained-OAuth only, §4.6) -------------------------------

#[derive(Debug, Deserialize)]
pub struct CallbackQuery {
    pub code: String,
    pub state: String,
}

#[derive(Debug, Deserialize)]
struct TokenExchangeResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    expires_in: Option<u64>,
}

pub async fn callback_handler(
    State(state): State<AppState>,
    Path(path): Path<String>,
    Query(query): Query<CallbackQuery>,
) -> Result<Response, AppError> {
    let downstream = lookup(&state, &path)?;
    let DownstreamDefinition::ChainedOauth {
        name,
        oauth_token_url,
        oauth_client_id,
        oauth_client_secret,
        oauth_token_accept,
        ..
    } = downstream
    else {
        return Err(AppError::BadRequest(
            "this downstream has no chained OAuth callback".into(),
        ));
    };

    let flow_state = verify_state(&query.state, state.state_secret(), now())?;

    let callback_url = format!("{}/callback/mcp/{name}", state.public_url());
    let exchange_response = state
        .http_client
        .post(oauth_token_url)
        .header("Accept", oauth_token_accept)
        .json(&serde_json::json!({
            "client_id": oauth_client_id,
            "client_secret": oauth_client_secret,
            "code": query.code,
            "redirect_uri": callback_url,
        }))
        .send()
        .await
        .map_err(|e| AppError::BadGateway(format!("code exchange request failed: {e}")))?;

    if !exchange_response.status().is_success() {
        return Err(AppError::BadGateway(format!(
            "downstream token endpoint returned {}",
            exchange_response.status()
        )));
    }

    let tokens: TokenExchangeResponse = exchange_response.json().await.map_err(|e| {
        AppError::BadGateway(format!("downstream token response was not valid JSON: {e}"))
    })?;

    let grant = AuthorizationGrant {
        downstream_tokens: DownstreamTokens::ChainedOAuth {
            access_token: tokens.access_token,
            refresh_token: tokens.refresh_token,
            expires_in: tokens.expires_in,
        },
        pkce_challenge: flow_state.pkce_challenge,
        redirect_uri: flow_state.claude_redirect_uri.clone(),
        exp: now() + state.auth_code_ttl() as i64,
    };
    let code = seal_grant(&grant, state.state_secret())
        .map_err(|_| AppError::Internal("failed to seal authorization code".into()))?;

    let mut redirect_url = flow_state.claude_redirect_uri;
    redirect_url.push_str(if redirect_url.contains('?') { "&" } else { "?" });
    redirect_url.push_str(&format!("code={}", urlencoding::encode(&code)));
    redirect_url.push_str(&format!(
        "&state={}",
        urlencoding::encode(&flow_state.claude_state)
    ));

    Ok(Redirect::to(&redirect_url).into_response())
}

// ---- token exchange (§4.6) ----------------------------------------------

#[derive(Debug, Deserialize)]
pub struct TokenForm {
    pub grant_type: String,
    pub code: Option<String>,
    pub code_verifier: Option<String>,
    pub redirect_uri: Option<String>,
    pub refresh_token: Option<String>,
    #[allow(dead_code)]
    pub client_id: Option<String>,
}

#[derive(Debug, Serialize)]
struct TokenResponseBody {
    access_token: String,
    token_type: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    expires_in: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    refresh_token: Option<String>,
}

pub async fn token_handler(
    State(state): State<AppState>,
    Path(path): Path<String>,
    form: Result<Form<TokenForm>, FormRejection>,
) -> Result<Response, AppError> {
    let downstream = lookup(&state, &path)?;
    let Form(form) = form.map_err(|rejection| AppError::TokenError {
        error: "invalid_request",
        description: format!("malformed request body: {rejection}"),
    })?;

    match form.grant_type.as_str() {
        "authorization_code" => {
            let body = handle_authorization_code_grant(&state, form)?;
            Ok(Json(body).into_response())
        }
        "refresh_token" => handle_refresh_token_grant(&state, downstream, form).await,
        other => Err(AppError::TokenError {
            error: "unsupported_grant_type",
            description: format!("grant_type '{other}' is not supported"),
        }),
    }
}

fn handle_authorization_code_grant(
    state: &AppState,
    form: TokenForm,
) -> Result<TokenResponseBody, AppError> {
    let code = form.code.ok_or_else(|| AppError::TokenError {
        error: "invalid_request",
        description: "missing required parameter: code".into(),
    })?;
    let code_verifier = form.code_verifier.ok_or_else(|| AppError::TokenError {
        error: "invalid_request",
        description: "missing required parameter: code_verifier".into(),
    })?;
    let redirect_uri = form.redirect_uri.ok_or_else(|| AppError::TokenError {
        error: "invalid_request",
        description: "missing required parameter: redirect_uri".into(),
    })?;

    let grant = open_grant(&code, state.state_secret(), now())?;

    if redirect_uri != grant.redirect_uri {
        return Err(AppError::TokenError {
            error: "invalid_grant",
            description: "redirect_uri does not match the authorization request".into(),
        });
    }

    if !verify_pkce(&code_verifier, &grant.pkce_challenge) {
        return Err(AppError::TokenError {
            error: "invalid_grant",
            description: "PKCE verification failed".into(),
        });
    }

    Ok(match grant.downstream_tokens {
        DownstreamTokens::Passthrough { access_token } => TokenResponseBody {
            access_token,
            token_type: "Bearer",
            expires_in: None,
            refresh_token: None,
        },
        DownstreamTokens::ChainedOAuth {
            access_token,
            refresh_token,
            expires_in,
        } => TokenResponseBody {
            access_token,
            token_type: "Bearer",
            expires_in,
            refresh_token,
        },
    })
}

async fn handle_refresh_token_grant(
    state: &AppState,
    downstream: &DownstreamDefinition,
    form: TokenForm,
) -> Result<Response, AppError> {
    let DownstreamDefinition::ChainedOauth {
        oauth_token_url,
        oauth_client_id,
        oauth_client_secret,
        ..
    } = downstream
    else {
        return Err(AppError::TokenError {
            error: "unsupported_grant_type",
            description: "refresh_token is only supported for chained-OAuth downstreams".into(),
        });
    };

    if !downstream.supports_refresh() {
        return Err(AppError::TokenError {
            error: "unsupported_grant_type",
            description: "this downstream does not support refresh tokens".into(),
        });
    }

    let refresh_token = form.refresh_token.ok_or_else(|| AppError::TokenError {
        error: "invalid_request",
        description: "missing required parameter: refresh_token".into(),
    })?;

    let response = state
        .http_client
        .post(oauth_token_url)
        .form(&[
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token.as_str()),
            ("client_id", oauth_client_id.as_str()),
            ("client_secret", oauth_client_secret.as_str()),
        ])
        .send()
        .await
        .map_err(|e| AppError::BadGateway(format!("refresh request failed: {e}")))?;

    if !response.status().is_success() {
        return Err(AppError::TokenError {
            error: "invalid_grant",
            description: "Refresh token invalid or expired. User must re-authorize.".into(),
        });
    }

    let body: serde_json::Value = response.json().await.map_err(|e| {
        AppError::BadGateway(format!("downstream refresh response was not valid JSON: {e}"))
    })?;

    Ok(Json(body).into_response())
}
