//! Authentication for the gateway.
//!
//! This module provides:
//! - The OAuth2 login, callback and logout handlers
//! - Cookie construction for the login transaction and the session
//! - The gate middleware that admits only callers with a live session
//!
//! # Authorization model
//!
//! Access is decided once, at login: a caller who completes the OAuth flow
//! and is a member of the configured resource gets a session. The gate then
//! only checks that the session is authentic and unexpired. Losing
//! membership takes effect when the session expires (one hour).

pub mod cookies;
pub mod flow;
pub mod middleware;

use axum::http::{HeaderMap, Uri};
use portcullis_provider::IdentityProvider;
use portcullis_session::SessionBackend;
use std::sync::Arc;

use crate::http::is_https;
use crate::routes::Routes;
use crate::views::Views;

pub use flow::{callback, health, login, logout};
pub use middleware::require_session;

/// Behavior switches for the auth handlers.
#[derive(Debug, Clone)]
pub struct AuthSettings {
    /// Name of the session cookie.
    pub session_cookie: String,
    /// Path prefix that marks API requests.
    pub api_path_prefix: String,
    /// Whether to trust `X-Forwarded-Proto`.
    pub trust_forwarded_proto: bool,
    /// Human name of the resource kind, used on the denial page.
    pub resource_label: String,
}

/// Shared authentication state.
pub struct AppState {
    /// Upstream identity provider.
    pub provider: Arc<dyn IdentityProvider>,
    /// Session issue/load/revoke.
    pub sessions: Arc<dyn SessionBackend>,
    /// Route table.
    pub routes: Routes,
    /// Page renderer.
    pub views: Views,
    /// Behavior switches.
    pub settings: AuthSettings,
}

impl AppState {
    /// Creates a new application state.
    pub fn new(
        provider: Arc<dyn IdentityProvider>,
        sessions: Arc<dyn SessionBackend>,
        routes: Routes,
        settings: AuthSettings,
    ) -> Self {
        let views = Views::new(&routes);
        Self {
            provider,
            sessions,
            routes,
            views,
            settings,
        }
    }

    /// Returns true if cookies set on this request should be `Secure`.
    #[must_use]
    pub fn secure_cookies(&self, headers: &HeaderMap, uri: &Uri) -> bool {
        is_https(headers, uri, self.settings.trust_forwarded_proto)
    }
}
