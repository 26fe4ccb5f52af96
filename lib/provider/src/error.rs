//! Provider error types.
//!
//! Each variant names the stage of the login flow that failed, so operators
//! can tell a rejected code exchange from a broken membership query.

use std::fmt;

/// Errors from talking to the identity provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderError {
    /// Invalid provider configuration.
    Configuration {
        /// Error details.
        details: String,
    },
    /// Exchanging the authorization code for tokens failed.
    TokenExchange {
        /// Error details.
        details: String,
    },
    /// Fetching the caller's identity failed.
    UserInfo {
        /// Error details.
        details: String,
    },
    /// The resource-membership query failed.
    AccessCheck {
        /// Error details.
        details: String,
    },
}

impl ProviderError {
    /// Stable stage name used in log events.
    #[must_use]
    pub fn stage(&self) -> &'static str {
        match self {
            Self::Configuration { .. } => "configuration",
            Self::TokenExchange { .. } => "token_exchange",
            Self::UserInfo { .. } => "user_info",
            Self::AccessCheck { .. } => "access_check",
        }
    }
}

impl fmt::Display for ProviderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Configuration { details } => {
                write!(f, "invalid provider configuration: {}", details)
            }
            Self::TokenExchange { details } => write!(f, "token exchange failed: {}", details),
            Self::UserInfo { details } => write!(f, "failed to fetch user info: {}", details),
            Self::AccessCheck { details } => {
                write!(f, "failed to check resource access: {}", details)
            }
        }
    }
}

impl std::error::Error for ProviderError {}
