//! Owner authentication.
//!
//! A project owner proves themselves by signing an arbitrary message with
//! the key behind the project's receiving address. The check is a pure
//! function over the request parameters and the project's verifying key;
//! nothing is cached or stored.
//!
//! Signatures travel in query strings, so they are base64url (no padding) —
//! the standard alphabet's `+` does not survive form-style percent-decoding.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use ed25519_dalek::{Signature, VerifyingKey};

use crate::errors::AuthError;
use crate::types::Project;

/// Verify that `signature` over `message` was produced by the key behind
/// `project.address`.
///
/// Returns `Ok(false)` on a well-formed signature that does not verify —
/// callers degrade to the unauthenticated view, they never abort. Returns
/// an error only when the inputs cannot be checked at all.
pub fn verify_owner(
    project: &Project,
    message: &str,
    signature: &str,
) -> Result<bool, AuthError> {
    let sig_bytes = URL_SAFE_NO_PAD
        .decode(signature)
        .map_err(|e| AuthError::BadEncoding(e.to_string()))?;
    let sig_bytes: [u8; 64] = sig_bytes
        .try_into()
        .map_err(|_| AuthError::BadEncoding("signature must be 64 bytes".to_string()))?;
    let sig = Signature::from_bytes(&sig_bytes);

    let key = verifying_key(project)?;
    Ok(key.verify_strict(message.as_bytes(), &sig).is_ok())
}

/// Parse the project's receiving address into a verifying key. Also used at
/// project load time to reject bad project files early.
pub fn verifying_key(project: &Project) -> Result<VerifyingKey, AuthError> {
    let key_bytes = hex::decode(&project.address).map_err(|_| AuthError::BadAddress)?;
    let key_bytes: [u8; 32] = key_bytes.try_into().map_err(|_| AuthError::BadAddress)?;
    VerifyingKey::from_bytes(&key_bytes).map_err(|_| AuthError::BadAddress)
}

// ─────────────────────────────────────────────────────────
// Unit tests
// ─────────────────────────────────────────────────────────
