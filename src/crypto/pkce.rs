use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

/// RFC 7636 code_verifier charset: unreserved URI characters only.
fn is_verifier_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '-' | '.' | '_' | '~')
}

/// Verifies a PKCE S256 code_verifier against a stored challenge.
///
/// `verify("", anything)` and out-of-range/out-of-charset verifiers are
/// rejected up front; everything else goes through a constant-time compare
/// so failure and success take the same code path.
pub fn verify_pkce(code_verifier: &str, stored_challenge: &str) -> bool {
    let len = code_verifier.chars().count();
    if !(43..=128).contains(&len) {
        return false;
    }
    if !code_verifier.chars().all(is_verifier_char) {
        return false;
    }

    let mut hasher = Sha256::new();
    hasher.update(code_verifier.as_bytes());
    let computed = URL_SAFE_NO_PAD.encode(hasher.finalize());

    computed.as_bytes().ct_eq(stored_challenge.as_bytes()).into()
}

#[cfg(test)]
mod tests {
    use super::*;

    const VERIFIER: &str = "dBjftJeZ4CVP-mB92K27uhbUJU1p1r_wW1gFWFOEjXk";
    const CHALLENGE: &str = "E9Melhoa2OwvFrEMTJguCHaoeK1t8URWbuGJSstw-cM";

    #[test]
    fn matching_verifier_passes() {
        assert!(verify_pkce(VERIFIER, CHALLENGE));
    }

    #[test]
    fn wrong_verifier_fails() {
        assert!(!verify_pkce("wrong", CHALLENGE));
    }

    #[test]
    fn too_short_verifier_fails() {
        assert!(!verify_pkce("short", CHALLENGE));
    }

    #[test]
    fn verifier_with_disallowed_chars_fails() {
        let bad = "a".repeat(42) + "!";
        assert!(!verify_pkce(&bad, CHALLENGE));
    }

    #[test]
    fn empty_challenge_is_a_non_match_not_a_panic() {
        assert!(!verify_pkce(VERIFIER, ""));
    }
}
