//! Verified caller identity.
//!
//! An `Identity` is only ever constructed from a session that the gateway
//! itself issued. The gate inserts it into the request extensions and the
//! reverse proxy turns it into `X-Auth-*` headers, so the value travels as an
//! explicit typed request-scoped value rather than through ambient lookup.

use serde::{Deserialize, Serialize};

/// The identity of an authenticated caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    /// Subject identifier issued by the upstream identity provider.
    subject_id: String,
    /// Email address reported by the provider (may be empty).
    email: String,
    /// Human-readable name reported by the provider (may be empty).
    display_name: String,
}

impl Identity {
    /// Creates a new identity.
    #[must_use]
    pub fn new(subject_id: String, email: String, display_name: String) -> Self {
        Self {
            subject_id,
            email,
            display_name,
        }
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
}
