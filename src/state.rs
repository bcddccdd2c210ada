use std::sync::Arc;

use crate::registry::Registry;

/// Threaded through every handler via `State<AppState>`. Cheap to clone:
/// the registry is behind an `Arc` and the HTTP client carries its own
/// internal `Arc`-backed connection pool.
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<Registry>,
    pub http_client: reqwest::Client,
}

impl AppState {
    pub fn public_url(&self) -> &str {
        &self.registry.server.public_url
    }

    pub fn state_secret(&self) -> &[u8] {
        &self.registry.server.state_secret
    }

    pub fn auth_code_ttl(&self) -> u64 {
        self.registry.server.auth_code_ttl
    }
}
