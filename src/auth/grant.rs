use serde::{Deserialize, Serialize};

/// What the proxy hands back to the client as the OAuth access token.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DownstreamTokens {
    Passthrough {
        access_token: String,
    },
    ChainedOAuth {
        access_token: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        refresh_token: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        expires_in: Option<u64>,
    },
}

/// The payload sealed into an authorization code (§4.2). Self-describing:
/// nothing about a grant lives anywhere but inside this encrypted blob.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthorizationGrant {
    pub downstream_tokens: DownstreamTokens,
    pub pkce_challenge: String,
    pub redirect_uri: String,
    /// absolute expiry, unix seconds
    pub exp: i64,
}

/// Carried through a third-party IdP round trip, HMAC-signed (§4.3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainedOAuthFlowState {
    pub claude_state: String,
    pub claude_redirect_uri: String,
    pub pkce_challenge: String,
    pub pkce_method: PkceMethod,
    /// absolute expiry, unix seconds
    pub exp: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PkceMethod {
    S256,
}
