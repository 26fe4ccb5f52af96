//! Session secret handling and key derivation.

use sha2::{Digest, Sha256};
use std::fmt;

use crate::error::SessionError;

/// Minimum accepted secret length, in bytes.
pub const MIN_SECRET_LEN: usize = 32;

/// The process-wide session key.
///
/// The 256-bit AES key is the SHA-256 digest of the configured secret, so every
/// byte of the secret contributes to the key. The value is immutable after
/// startup and shared read-only by every request.
#[derive(Clone)]
pub struct SessionSecret {
    key: [u8; 32],
}

impl SessionSecret {
    /// Derives the session key from a configured secret.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::WeakSecret` if the secret is shorter than
    /// [`MIN_SECRET_LEN`] bytes.
    pub fn new(secret: &str) -> Result<Self, SessionError> {
        if secret.len() < MIN_SECRET_LEN {
            return Err(SessionError::WeakSecret {
                length: secret.len(),
            });
        }
        let key: [u8; 32] = Sha256::digest(secret.as_bytes()).into();
        Ok(Self { key })
    }

    pub(crate) fn key(&self) -> &[u8; 32] {
        &self.key
    }
}

impl fmt::Debug for SessionSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SessionSecret(..)")
    }
}
