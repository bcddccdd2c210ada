use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use hmac::{Hmac, Mac};
use sha2::Sha256;

use super::CodecError;
use crate::auth::grant::ChainedOAuthFlowState;

type HmacSha256 = Hmac<Sha256>;

fn mac(secret: &[u8], payload: &[u8]) -> Vec<u8> {
    let mut mac = HmacSha256::new_from_slice(secret).expect("HMAC accepts any key length");
    mac.update(payload);
    mac.finalize().into_bytes().to_vec()
}

/// Signs a flow-state payload as `b64url(payload).b64url(tag)`.
pub fn sign_state(state: &ChainedOAuthFlowState, secret: &[u8]) -> Result<String, CodecError> {
    let payload = serde_json::to_vec(state).map_err(|_| CodecError::InvalidState)?;
    let tag = mac(secret, &payload);
    Ok(format!(
        "{}.{}",
        URL_SAFE_NO_PAD.encode(&payload),
        URL_SAFE_NO_PAD.encode(&tag)
    ))
}

/// Verifies and decodes a signed flow-state blob. Every failure mode —
/// malformed encoding, bad MAC, expired state — collapses to
/// `invalid_state`; callers must not branch on the reason.
pub fn verify_state(
    signed: &str,
    secret: &[u8],
    now: i64,
) -> Result<ChainedOAuthFlowState, CodecError> {
    let (payload_b64, tag_b64) = signed
        .rsplit_once('.')
        .ok_or(CodecError::InvalidState)?;

    let payload = URL_SAFE_NO_PAD
        .decode(payload_b64)
        .map_err(|_| CodecError::InvalidState)?;
    let tag = URL_SAFE_NO_PAD
        .decode(tag_b64)
        .map_err(|_| CodecError::InvalidState)?;

    let mut verifier =
        HmacSha256::new_from_slice(secret).expect("HMAC accepts any key length");
    verifier.update(&payload);
    verifier
        .verify_slice(&tag)
        .map_err(|_| CodecError::InvalidState)?;

    let state: ChainedOAuthFlowState =
        serde_json::from_slice(&payload).map_err(|_| CodecError::InvalidState)?;

    if state.exp <= now {
        return Err(CodecError::InvalidState);
    }

    Ok(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::grant::PkceMethod;

    fn sample(exp: i64) -> ChainedOAuthFlowState {
        ChainedOAuthFlowState {
            claude_state: "xyz".into(),
            claude_redirect_uri: "http://c/cb".into(),
            pkce_challenge: "E9Melhoa2OwvFrEMTJguCHaoeK1t8URWbuGJSstw-cM".into(),
            pkce_method: PkceMethod::S256,
            exp,
        }
    }

    #[test]
    fn round_trips() {
        let secret = b"a secret of at least 32 bytes!!";
        let state = sample(i64::MAX - 1);
        let signed = sign_state(&state, secret).unwrap();
        let verified = verify_state(&signed, secret, 1_000).unwrap();
        assert_eq!(verified.claude_state, "xyz");
    }

    #[test]
    fn expired_state_is_rejected() {
        let secret = b"a secret of at least 32 bytes!!";
        let signed = sign_state(&sample(100), secret).unwrap();
        assert!(verify_state(&signed, secret, 100).is_err());
    }

    #[test]
    fn tampered_tag_is_rejected() {
        let secret = b"a secret of at least 32 bytes!!";
        let signed = sign_state(&sample(i64::MAX - 1), secret).unwrap();
        let mut tampered = signed.clone();
        tampered.push('x');
        assert!(verify_state(&tampered, secret, 1_000).is_err());
    }

    #[test]
    fn missing_dot_is_rejected() {
        let secret = b"a secret of at least 32 bytes!!";
        assert!(verify_state("notadotdelimitedstring", secret, 1_000).is_err());
    }
}
