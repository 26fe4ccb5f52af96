//! The authenticated session bound to a browser.
//!
//! Sessions are created only after a completed OAuth callback. Their lifetime
//! is fixed at creation and never extended; an expired session is simply
//! rejected on the next read.

use chrono::{DateTime, Duration, Utc};
use portcullis_core::Identity;
use serde::{Deserialize, Serialize};

/// Fixed session lifetime, in seconds.
pub const SESSION_DURATION_SECONDS: i64 = 60 * 60;

/// Represents a completed login.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    /// Subject identifier from the identity provider.
    subject_id: String,
    /// Email address from the identity provider.
    email: String,
    /// Display name from the identity provider.
    display_name: String,
    /// Access token issued by the provider during the code exchange.
    upstream_access_token: String,
    /// When the session was created.
    created_at: DateTime<Utc>,
    /// When the session expires.
    expires_at: DateTime<Utc>,
}

impl Session {
    /// Creates a session starting now.
    #[must_use]
    pub fn new(identity: Identity, upstream_access_token: String) -> Self {
        Self::issued_at(identity, upstream_access_token, Utc::now())
    }

    /// Creates a session as if it had been created at `created_at`.
    #[must_use]
    pub fn issued_at(
        identity: Identity,
        upstream_access_token: String,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            subject_id: identity.subject_id().to_string(),
            email: identity.email().to_string(),
            display_name: identity.display_name().to_string(),
            upstream_access_token,
            created_at,
            expires_at: created_at + Self::duration(),
        }
    }

    /// Returns the fixed session lifetime.
    #[must_use]
    pub fn duration() -> Duration {
        Duration::seconds(SESSION_DURATION_SECONDS)
    }

    /// Returns the identity this session proves.
    #[must_use]
    pub fn identity(&self) -> Identity {
        Identity::new(
            self.subject_id.clone(),
            self.email.clone(),
            self.display_name.clone(),
        )
    }

    /// Returns the provider subject identifier.
    #[must_use]
    pub fn subject_id(&self) -> &str {
        &self.subject_id
    }

    /// Returns the email address.
    #[must_use]
    pub fn email(&self) -> &str {
        &self.email
    }

    /// Returns the display name.
    #[must_use]
    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    /// Returns the upstream access token.
    #[must_use]
    pub fn upstream_access_token(&self) -> &str {
        &self.upstream_access_token
    }

    /// Returns when the session was created.
    #[must_use]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Returns when the session expires.
    #[must_use]
    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    /// Returns true if the session is past its expiry at `now`.
    #[must_use]
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }

    /// Returns true if the session has expired.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_identity() -> Identity {
        Identity::new("u1".to_string(), "a@b.com".to_string(), "A".to_string())
    }

    #[test]
    fn new_session_has_correct_fields() {
        let before = Utc::now();
        let session = Session::new(test_identity(), "token".to_string());
        let after = Utc::now();

        assert_eq!(session.subject_id(), "u1");
        assert_eq!(session.email(), "a@b.com");
        assert_eq!(session.display_name(), "A");
        assert_eq!(session.upstream_access_token(), "token");
        assert!(session.created_at() >= before);
        assert!(session.created_at() <= after);
    }

    #[test]
    fn expiry_is_one_hour_after_creation() {
        let session = Session::new(test_identity(), "token".to_string());
        assert_eq!(
            session.expires_at() - session.created_at(),
            Duration::hours(1)
        );
    }

    #[test]
    fn session_expiration() {
        let created = Utc::now() - Duration::hours(2);
        let session = Session::issued_at(test_identity(), "token".to_string(), created);
        assert!(session.is_expired());

        let fresh = Session::new(test_identity(), "token".to_string());
        assert!(!fresh.is_expired());
    }

    #[test]
    fn expiry_boundary_is_exclusive() {
        let session = Session::new(test_identity(), "token".to_string());
        assert!(!session.is_expired_at(session.expires_at()));
        assert!(session.is_expired_at(session.expires_at() + Duration::milliseconds(1)));
    }

    #[test]
    fn identity_matches_session_fields() {
        let session = Session::new(test_identity(), "token".to_string());
        assert_eq!(session.identity(), test_identity());
    }
}
