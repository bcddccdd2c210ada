use std::collections::HashMap;

use base64::{Engine, engine::general_purpose::STANDARD as BASE64};

use crate::config::{Config, RawDownstream};

/// A validated, immutable downstream definition. Constructing one outside
/// `Registry::build` is not possible — every field here has already
/// passed the checks in §4.5.
#[derive(Debug, Clone)]
pub enum DownstreamDefinition {
    Passthrough {
        name: String,
        display_name: String,
        downstream_url: String,
        auth_header_format: String,
        scopes: String,
        auth_hint: String,
    },
    ChainedOauth {
        name: String,
        display_name: String,
        downstream_url: String,
        auth_header_format: String,
        scopes: String,
        oauth_authorize_url: String,
        oauth_token_url: String,
        oauth_client_id: String,
        oauth_client_secret: String,
        oauth_scopes: String,
        oauth_supports_refresh: bool,
        oauth_token_accept: String,
    },
}

impl DownstreamDefinition {
    pub fn name(&self) -> &str {
        match self {
            Self::Passthrough { name, .. } => name,
            Self::ChainedOauth { name, .. } => name,
        }
    }

    pub fn display_name(&self) -> &str {
        match self {
            Self::Passthrough { display_name, .. } => display_name,
            Self::ChainedOauth { display_name, .. } => display_name,
        }
    }

    pub fn downstream_url(&self) -> &str {
        match self {
            Self::Passthrough { downstream_url, .. } => downstream_url,
            Self::ChainedOauth { downstream_url, .. } => downstream_url,
        }
    }

    pub fn auth_header_format(&self) -> &str {
        match self {
            Self::Passthrough {
                auth_header_format, ..
            } => auth_header_format,
            Self::ChainedOauth {
                auth_header_format, ..
            } => auth_header_format,
        }
    }

    pub fn supports_refresh(&self) -> bool {
        matches!(
            self,
            Self::ChainedOauth {
                oauth_supports_refresh: true,
                ..
            }
        )
    }
}

/// The immutable, validated set of downstream definitions, keyed by path
/// segment. Built once at startup; never mutated afterward.
pub struct Registry {
    downstreams: HashMap<String, DownstreamDefinition>,
    pub server: ValidatedServerConfig,
}

pub struct ValidatedServerConfig {
    pub host: String,
    pub port: u16,
    pub public_url: String,
    pub state_secret: Vec<u8>,
    pub auth_code_ttl: u64,
}

fn is_valid_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
}

impl Registry {
    pub fn build(config: Config) -> anyhow::Result<Self> {
        let state_secret = BASE64
            .decode(&config.server.state_secret)
            .map_err(|e| anyhow::anyhow!("server.state_secret is not valid base64: {e}"))?;
        if state_secret.len() < 32 {
            anyhow::bail!(
                "server.state_secret must decode to at least 32 bytes, got {}",
                state_secret.len()
            );
        }

        let public_url = config.server.public_url.trim_end_matches('/').to_string();
        match url::Url::parse(&public_url) {
            Ok(parsed) if parsed.scheme() != "https" => {
                tracing::warn!(
                    "server.public_url '{}' does not use https; fine for local dev, not for production",
                    public_url
                );
            }
            Ok(_) => {}
            Err(e) => anyhow::bail!("server.public_url is not a valid URL: {e}"),
        }

        let mut downstreams = HashMap::with_capacity(config.downstreams.len());
        for raw in &config.downstreams {
            if downstreams.contains_key(&raw.name) {
                anyhow::bail!("duplicate downstream name: {}", raw.name);
            }
            if !is_valid_name(&raw.name) {
                anyhow::bail!(
                    "downstream name '{}' must match [a-z0-9-]+",
                    raw.name
                );
            }
            let definition = build_definition(raw)?;
            downstreams.insert(raw.name.clone(), definition);
        }

        Ok(Self {
            downstreams,
            server: ValidatedServerConfig {
                host: config.server.host,
                port: config.server.port,
                public_url,
                state_secret,
                auth_code_ttl: config.server.auth_code_ttl,
            },
        })
    }

    pub fn lookup(&self, path_suffix: &str) -> Option<&DownstreamDefinition> {
        self.downstreams.get(path_suffix)
    }

    pub fn downstream_count(&self) -> usize {
        self.downstreams.len()
    }
}

fn build_definition(raw: &RawDownstream) -> anyhow::Result<DownstreamDefinition> {
    match raw.strategy.as_str() {
        "passthrough" => Ok(DownstreamDefinition::Passthrough {
            name: raw.name.clone(),
            display_name: raw.display_name.clone(),
            downstream_url: raw.downstream_url.clone(),
            auth_header_format: raw.auth_header_format.clone(),
            scopes: raw.scopes.clone(),
            auth_hint: raw.auth_hint.clone().unwrap_or_default(),
        }),
        "chained_oauth" => {
            let require = |field: &Option<String>, field_name: &str| -> anyhow::Result<String> {
                field.clone().ok_or_else(|| {
                    anyhow::anyhow!(
                        "downstream '{}' (chained_oauth) is missing required field '{}'",
                        raw.name,
                        field_name
                    )
                })
            };

            Ok(DownstreamDefinition::ChainedOauth {
                name: raw.name.clone(),
                display_name: raw.display_name.clone(),
                downstream_url: raw.downstream_url.clone(),
                auth_header_format: raw.auth_header_format.clone(),
                scopes: raw.scopes.clone(),
                oauth_authorize_url: require(&raw.oauth_authorize_url, "oauth_authorize_url")?,
                oauth_token_url: require(&raw.oauth_token_url, "oauth_token_url")?,
                oauth_client_id: require(&raw.oauth_client_id, "oauth_client_id")?,
                oauth_client_secret: require(&raw.oauth_client_secret, "oauth_client_secret")?,
                oauth_scopes: raw.oauth_scopes.clone().unwrap_or_default(),
                oauth_supports_refresh: raw.oauth_supports_refresh,
                oauth_token_accept: raw
                    .oauth_token_accept
                    .clone()
                    .unwrap_or_else(|| "application/json".to_string()),
            })
        }
        other => anyhow::bail!(
            "downstream '{}' has unknown strategy '{}' (expected passthrough or chained_oauth)",
            raw.name,
            other
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ServerConfig;

    fn base_server() -> ServerConfig {
        ServerConfig {
            host: "0.0.0.0".into(),
            port: 8080,
            public_url: "https://proxy.example.com/".into(),
            state_secret: BASE64.encode([0u8; 32]),
            auth_code_ttl: 300,
        }
    }

    fn passthrough_raw(name: &str) -> RawDownstream {
        RawDownstream {
            name: name.into(),
            display_name: "Linear".into(),
            strategy: "passthrough".into(),
            downstream_url: "https://mcp.linear.app/sse".into(),
            auth_header_format: "Bearer".into(),
            scopes: String::new(),
            auth_hint: Some("paste key".into()),
            oauth_authorize_url: None,
            oauth_token_url: None,
            oauth_client_id: None,
            oauth_client_secret: None,
            oauth_scopes: None,
            oauth_supports_refresh: false,
            oauth_token_accept: None,
        }
    }

    #[test]
    fn public_url_loses_trailing_slash() {
        let registry = Registry::build(Config {
            server: base_server(),
            downstreams: vec![],
        })
        .unwrap();
        assert_eq!(registry.server.public_url, "https://proxy.example.com");
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let config = Config {
            server: base_server(),
            downstreams: vec![passthrough_raw("linear"), passthrough_raw("linear")],
        };
        assert!(Registry::build(config).is_err());
    }

    #[test]
    fn invalid_name_pattern_is_rejected() {
        let config = Config {
            server: base_server(),
            downstreams: vec![passthrough_raw("Linear_App")],
        };
        assert!(Registry::build(config).is_err());
    }

    #[test]
    fn short_state_secret_is_rejected() {
        let mut server = base_server();
        server.state_secret = BASE64.encode([0u8; 16]);
        let config = Config {
            server,
            downstreams: vec![],
        };
        assert!(Registry::build(config).is_err());
    }

    #[test]
    fn chained_oauth_missing_field_is_rejected() {
        let mut raw = passthrough_raw("github");
        raw.strategy = "chained_oauth".into();
        let config = Config {
            server: base_server(),
            downstreams: vec![raw],
        };
        assert!(Registry::build(config).is_err());
    }

    #[test]
    fn lookup_finds_registered_downstream() {
        let config = Config {
            server: base_server(),
            downstreams: vec![passthrough_raw("linear")],
        };
        let registry = Registry::build(config).unwrap();
        assert!(registry.lookup("linear").is_some());
        assert!(registry.lookup("missing").is_none());
    }
}
