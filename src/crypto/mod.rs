mod code;
mod pkce;
mod state;

pub use code::{open_grant, seal_grant};
pub use pkce::verify_pkce;
pub use state::{sign_state, verify_state};

/// Shared "this was garbage, not just wrong" failure. Every codec collapses
/// its internal failure modes (bad base64, short ciphertext, bad tag, bad
/// JSON, expired) into this one variant so callers can't branch on which.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("invalid_grant")]
    InvalidGrant,
    #[error("invalid_state")]
    InvalidState,
}
