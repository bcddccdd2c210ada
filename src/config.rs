use serde::Deserialize;
use std::path::Path;

fn default_auth_code_ttl() -> u64 {
    300
}

/// The root TOML document. Deserialized as-is, then handed to
/// [`crate::registry::Registry::build`] for validation — deserialization
/// failure is a malformed file; validation failure is a bad *value*.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    #[serde(rename = "downstream", default)]
    pub downstreams: Vec<RawDownstream>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub public_url: String,
    /// base64-encoded, ≥32 bytes after decode
    pub state_secret: String,
    #[serde(default = "default_auth_code_ttl")]
    pub auth_code_ttl: u64,
}

/// Untyped-by-strategy config record as it appears in TOML. The strategy
/// string and the fields that go with it are cross-checked in
/// `registry::Registry::build`, not here — deserialization only needs to
/// succeed on well-formed TOML, not on semantically complete config.
#[derive(Debug, Clone, Deserialize)]
pub struct RawDownstream {
    pub name: String,
    pub display_name: String,
    pub strategy: String,
    pub downstream_url: String,
    pub auth_header_format: String,
    #[serde(default)]
    pub scopes: String,

    pub auth_hint: Option<String>,

    pub oauth_authorize_url: Option<String>,
    pub oauth_token_url: Option<String>,
    pub oauth_client_id: Option<String>,
    pub oauth_client_secret: Option<String>,
    pub oauth_scopes: Option<String>,
    #[serde(default)]
    pub oauth_supports_refresh: bool,
    pub oauth_token_accept: Option<String>,
}

impl Config {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("reading config file {}: {e}", path.display()))?;
        let mut config: Config = toml::from_str(&raw)
            .map_err(|e| anyhow::anyhow!("parsing config file {}: {e}", path.display()))?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Environment values always win over file values (§6). Convention:
    /// `MCPGW_STATE_SECRET`, `MCPGW_<UPPERCASED_NAME>_CLIENT_SECRET`.
    fn apply_env_overrides(&mut self) {
        if let Ok(secret) = std::env::var("MCPGW_STATE_SECRET") {
            self.server.state_secret = secret;
        }

        for downstream in &mut self.downstreams {
            let var_name = format!(
                "MCPGW_{}_CLIENT_SECRET",
                downstream.name.to_uppercase().replace('-', "_")
            );
            if let Ok(secret) = std::env::var(var_name) {
                downstream.oauth_client_secret = Some(secret);
            }
        }
    }
}
