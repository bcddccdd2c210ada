pub mod auth;
pub mod config;
pub mod crypto;
pub mod error;
pub mod http_client;
pub mod proxy;
pub mod registry;
pub mod state;

use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post},
};
use tower_governor::{
    GovernorLayer, governor::GovernorConfigBuilder, key_extractor::SmartIpKeyExtractor,
};
use tower_http::cors::CorsLayer;

use state::AppState;

/// Assembles the full HTTP surface (§6): discovery/authorize/callback/token
/// routes rate-limited at half the standard rate, MCP SSE/JSON-RPC routes at
/// the standard rate, CORS permissive across both (the client is a
/// browser-resident AI assistant, not same-origin with any downstream).
pub fn build_router(state: AppState, rate_limit_per_second: u64, rate_limit_burst: u32) -> Router {
    let standard_governor = Arc::new(
        GovernorConfigBuilder::default()
            .key_extractor(SmartIpKeyExtractor)
            .per_second(rate_limit_per_second)
            .burst_size(rate_limit_burst)
            .finish()
            .expect("failed to build rate limiter config"),
    );
    let auth_governor = Arc::new(
        GovernorConfigBuilder::default()
            .key_extractor(SmartIpKeyExtractor)
            .per_second((rate_limit_per_second / 2).max(1))
            .burst_size((rate_limit_burst / 3).max(1))
            .finish()
            .expect("failed to build auth rate limiter config"),
    );

    // Bounds the governors' per-IP state maps on a long-running process.
    let standard_limiter = standard_governor.limiter().clone();
    let auth_limiter = auth_governor.limiter().clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(std::time::Duration::from_secs(60));
        loop {
            interval.tick().await;
            standard_limiter.retain_recent();
            auth_limiter.retain_recent();
        }
    });

    let auth_routes = Router::new()
        .route(
            "/.well-known/oauth-protected-resource/{*path}",
            get(auth::handlers::protected_resource_metadata_handler),
        )
        .route(
            "/.well-known/oauth-authorization-server/{*path}",
            get(auth::handlers::authorization_server_metadata_handler),
        )
        .route(
            "/authorize/{*path}",
            get(auth::handlers::authorize_get_handler).post(auth::handlers::authorize_post_handler),
        )
        .route("/callback/{*path}", get(auth::handlers::callback_handler))
        .route("/token/{*path}", post(auth::handlers::token_handler))
        .layer(GovernorLayer::new(auth_governor))
        .with_state(state.clone());

    let mcp_routes = Router::new()
        .route(
            "/mcp/{*path}",
            get(proxy::forwarder::mcp_get_handler).post(proxy::forwarder::mcp_post_handler),
        )
        .layer(GovernorLayer::new(standard_governor))
        .with_state(state);

    auth_routes.merge(mcp_routes).layer(CorsLayer::permissive())
}
