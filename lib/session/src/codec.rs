//! Stateless session tokens.
//!
//! A token is `base64url(nonce || AES-256-GCM(json(session)))`. The nonce is
//! drawn from the OS RNG inside [`SessionCodec::issue`] immediately before
//! sealing and there is no API for supplying one, so a nonce is never reused
//! under the process key.

use aes_gcm::{
    Aes256Gcm,
    aead::{Aead, AeadCore, KeyInit, OsRng},
};
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use chrono::{DateTime, Utc};
use tracing::debug;

use crate::error::{InvalidReason, SessionError};
use crate::secret::SessionSecret;
use crate::session::Session;

const NONCE_LEN: usize = 12;
const TAG_LEN: usize = 16;

/// Seals and opens session tokens with the process-wide key.
#[derive(Clone)]
pub struct SessionCodec {
    cipher: Aes256Gcm,
}

impl SessionCodec {
    /// Creates a codec keyed by `secret`.
    #[must_use]
    pub fn new(secret: &SessionSecret) -> Self {
        let key: [u8; 32] = *secret.key();
        let key = key.into();
        Self {
            cipher: Aes256Gcm::new(&key),
        }
    }

    /// Seals a session into an opaque cookie-safe token.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Encode` if serialization or encryption fails.
    pub fn issue(&self, session: &Session) -> Result<String, SessionError> {
        let plaintext = serde_json::to_vec(session).map_err(|e| SessionError::Encode {
            details: e.to_string(),
        })?;

        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
        let ciphertext = self
            .cipher
            .encrypt(&nonce, plaintext.as_ref())
            .map_err(|e| SessionError::Encode {
                details: format!("AES-GCM encryption failed: {e}"),
            })?;

        let mut sealed = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        sealed.extend_from_slice(&nonce);
        sealed.extend_from_slice(&ciphertext);
        Ok(URL_SAFE_NO_PAD.encode(sealed))
    }

    /// Opens a token.
    ///
    /// Returns `Ok(None)` for an empty token and for a session past its
    /// expiry, so callers treat both exactly like a missing cookie.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Invalid` when the token cannot be decoded or
    /// authenticated.
    pub fn parse(&self, token: &str) -> Result<Option<Session>, SessionError> {
        self.parse_at(token, Utc::now())
    }

    /// Opens a token, judging expiry against `now`.
    ///
    /// # Errors
    ///
    /// See [`SessionCodec::parse`].
    pub fn parse_at(&self, token: &str, now: DateTime<Utc>) -> Result<Option<Session>, SessionError> {
        if token.is_empty() {
            return Ok(None);
        }

        let sealed = URL_SAFE_NO_PAD
            .decode(token)
            .map_err(|_| InvalidReason::Encoding)?;
        if sealed.len() < NONCE_LEN + TAG_LEN {
            return Err(InvalidReason::Truncated.into());
        }

        let (nonce, ciphertext) = sealed.split_at(NONCE_LEN);
        let nonce: [u8; NONCE_LEN] = nonce.try_into().map_err(|_| InvalidReason::Truncated)?;
        let nonce = nonce.into();
        let plaintext = self
            .cipher
            .decrypt(&nonce, ciphertext)
            .map_err(|_| InvalidReason::Authentication)?;

        let session: Session =
            serde_json::from_slice(&plaintext).map_err(|_| InvalidReason::Payload)?;

        if session.is_expired_at(now) {
            debug!(expires_at = %session.expires_at(), "session expired");
            return Ok(None);
        }

        Ok(Some(session))
    }
}
