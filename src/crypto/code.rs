use aes_gcm::aead::Aead;
use aes_gcm::{Aes256Gcm, KeyInit, Nonce};
use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use rand::RngCore;
use sha2::{Digest, Sha256};

use super::CodecError;
use crate::auth::grant::AuthorizationGrant;

const NONCE_LEN: usize = 12;
/// decrypted plaintext above this is treated as abuse, not a real grant
const MAX_PLAINTEXT_LEN: usize = 64 * 1024;

fn derive_key(secret: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(secret);
    hasher.finalize().into()
}

/// Seals a grant into an opaque authorization code string.
pub fn seal_grant(grant: &AuthorizationGrant, secret: &[u8]) -> Result<String, CodecError> {
    let plaintext = serde_json::to_vec(grant).map_err(|_| CodecError::InvalidGrant)?;

    let key = derive_key(secret);
    let cipher = Aes256Gcm::new(key.as_ref().into());

    let mut nonce_bytes = [0u8; NONCE_LEN];
    rand::rngs::OsRng.fill_bytes(&mut nonce_bytes);
    let nonce = Nonce::from_slice(&nonce_bytes);

    let ciphertext = cipher
        .encrypt(nonce, plaintext.as_ref())
        .map_err(|_| CodecError::InvalidGrant)?;

    let mut sealed = Vec::with_capacity(NONCE_LEN + ciphertext.len());
    sealed.extend_from_slice(&nonce_bytes);
    sealed.extend_from_slice(&ciphertext);

    Ok(URL_SAFE_NO_PAD.encode(sealed))
}

/// Opens a sealed authorization code. Decryption failure, malformed JSON,
/// and expiry all collapse to the same `invalid_grant` error so a caller
/// can never distinguish tampering from staleness.
pub fn open_grant(
    code: &str,
    secret: &[u8],
    now: i64,
) -> Result<AuthorizationGrant, CodecError> {
    let sealed = URL_SAFE_NO_PAD
        .decode(code)
        .map_err(|_| CodecError::InvalidGrant)?;

    if sealed.len() < NONCE_LEN {
        return Err(CodecError::InvalidGrant);
    }
    let (nonce_bytes, ciphertext) = sealed.split_at(NONCE_LEN);
    let nonce = Nonce::from_slice(nonce_bytes);

    let key = derive_key(secret);
    let cipher = Aes256Gcm::new(key.as_ref().into());

    let plaintext = cipher
        .decrypt(nonce, ciphertext)
        .map_err(|_| CodecError::InvalidGrant)?;

    if plaintext.len() > MAX_PLAINTEXT_LEN {
        return Err(CodecError::InvalidGrant);
    }

    let grant: AuthorizationGrant =
        serde_json::from_slice(&plaintext).map_err(|_| CodecError::InvalidGrant)?;

    if grant.exp <= now {
        return Err(CodecError::InvalidGrant);
    }

    Ok(grant)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::grant::DownstreamTokens;

    fn sample_grant(exp: i64) -> AuthorizationGrant {
        AuthorizationGrant {
            downstream_tokens: DownstreamTokens::Passthrough {
                access_token: "SECRET".into(),
            },
            pkce_challenge: "E9Melhoa2OwvFrEMTJguCHaoeK1t8URWbuGJSstw-cM".into(),
            redirect_uri: "http://c/cb".into(),
            exp,
        }
    }

    #[test]
    fn round_trips() {
        let secret = [0u8; 32];
        let grant = sample_grant(i64::MAX - 1);
        let code = seal_grant(&grant, &secret).unwrap();
        let opened = open_grant(&code, &secret, 1_000).unwrap();
        match opened.downstream_tokens {
            DownstreamTokens::Passthrough { access_token } => assert_eq!(access_token, "SECRET"),
            _ => panic!("wrong variant"),
        }
    }

    #[test]
    fn expired_grant_is_rejected() {
        let secret = [0u8; 32];
        let grant = sample_grant(100);
        let code = seal_grant(&grant, &secret).unwrap();
        assert!(open_grant(&code, &secret, 100).is_err());
        assert!(open_grant(&code, &secret, 101).is_err());
    }

    #[test]
    fn tampered_code_is_rejected() {
        let secret = [0u8; 32];
        let grant = sample_grant(i64::MAX - 1);
        let mut sealed = URL_SAFE_NO_PAD
            .decode(seal_grant(&grant, &secret).unwrap())
            .unwrap();
        let last = sealed.len() - 1;
        sealed[last] ^= 0x01;
        let tampered = URL_SAFE_NO_PAD.encode(sealed);
        assert!(open_grant(&tampered, &secret, 1_000).is_err());
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let grant = sample_grant(i64::MAX - 1);
        let code = seal_grant(&grant, &[0u8; 32]).unwrap();
        assert!(open_grant(&code, &[1u8; 32], 1_000).is_err());
    }
}
