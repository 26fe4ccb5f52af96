//! Session error types.

use std::fmt;

/// Why a presented session token was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvalidReason {
    /// The token is not valid base64url.
    Encoding,
    /// The token is too short to contain a nonce and tag.
    Truncated,
    /// The authentication tag did not verify (wrong key or tampering).
    Authentication,
    /// The decrypted payload is not a session.
    Payload,
}

impl InvalidReason {
    /// Stable code used in log events.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::Encoding => "malformed_encoding",
            Self::Truncated => "truncated",
            Self::Authentication => "authentication_failed",
            Self::Payload => "malformed_payload",
        }
    }
}

/// Errors from session operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// The configured session secret is too short.
    WeakSecret {
        /// Length of the rejected secret in bytes.
        length: usize,
    },
    /// A presented session token could not be read.
    Invalid {
        /// Why the token was rejected.
        reason: InvalidReason,
    },
    /// A session could not be sealed.
    Encode {
        /// Error details.
        details: String,
    },
    /// The session store failed.
    Store {
        /// Error details.
        details: String,
    },
}

impl SessionError {
    /// Returns a stable reason code for log events.
    #[must_use]
    pub fn reason_code(&self) -> &'static str {
        match self {
            Self::WeakSecret { .. } => "weak_secret",
            Self::Invalid { reason } => reason.code(),
            Self::Encode { .. } => "encode_failed",
            Self::Store { .. } => "store_failed",
        }
    }

    /// Returns true if the error describes a bad token from the caller.
    #[must_use]
    pub fn is_invalid_token(&self) -> bool {
        matches!(self, Self::Invalid { .. })
    }
}

impl From<InvalidReason> for SessionError {
    fn from(reason: InvalidReason) -> Self {
        Self::Invalid { reason }
    }
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::WeakSecret { length } => {
                write!(
                    f,
                    "session secret must be at least {} bytes, got {}",
                    crate::secret::MIN_SECRET_LEN,
                    length
                )
            }
            Self::Invalid { reason } => write!(f, "invalid session: {}", reason.code()),
            Self::Encode { details } => write!(f, "failed to seal session: {}", details),
            Self::Store { details } => write!(f, "session store error: {}", details),
        }
    }
}

impl std::error::Error for SessionError {}
