//! The seam between the HTTP layer and session persistence.

use async_trait::async_trait;

use crate::codec::SessionCodec;
use crate::error::SessionError;
use crate::session::Session;

/// Issues, loads and revokes the value carried in the session cookie.
///
/// Implementations must treat an unknown or expired token as absent
/// (`Ok(None)`) and reserve `SessionError::Invalid` for tokens that are
/// malformed or fail authentication.
#[async_trait]
pub trait SessionBackend: Send + Sync {
    /// Returns the cookie value for a freshly created session.
    async fn issue(&self, session: &Session) -> Result<String, SessionError>;

    /// Resolves a cookie value back into a live session.
    async fn load(&self, token: &str) -> Result<Option<Session>, SessionError>;

    /// Forgets the session behind a cookie value. Revoking an unknown token
    /// is not an error.
    async fn revoke(&self, token: &str) -> Result<(), SessionError>;
}

#[async_trait]
impl SessionBackend for SessionCodec {
    async fn issue(&self, session: &Session) -> Result<String, SessionError> {
        SessionCodec::issue(self, session)
    }

    async fn load(&self, token: &str) -> Result<Option<Session>, SessionError> {
        self.parse(token)
    }

    async fn revoke(&self, _token: &str) -> Result<(), SessionError> {
        // Stateless tokens die with the cookie.
        Ok(())
    }
}
