//! Gateway route table.
//!
//! Every gateway endpoint lives under one configurable prefix so it cannot
//! collide with paths of the protected backend.

/// A gateway endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteKey {
    /// Starts a login, or reports a failed one.
    Login,
    /// Provider redirect target.
    Callback,
    /// Ends the session.
    Logout,
    /// Liveness probe.
    Health,
    /// Stylesheet for gateway pages.
    Stylesheet,
}

impl RouteKey {
    fn suffix(self) -> &'static str {
        match self {
            Self::Login => "/login",
            Self::Callback => "/callback",
            Self::Logout => "/logout",
            Self::Health => "/health",
            Self::Stylesheet => "/static/style.css",
        }
    }
}

/// Whether a URI should be relative or absolute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UrlKind {
    /// Path only, e.g. `/_gateway/login`.
    Path,
    /// Public absolute URL, e.g. `https://gw.example.com/_gateway/callback`.
    Absolute,
}

/// Resolves [`RouteKey`]s against the configured prefix and public origin.
#[derive(Debug, Clone)]
pub struct Routes {
    prefix: String,
    public_origin: String,
}

impl Routes {
    /// Creates a route table. Trailing slashes on either argument are ignored.
    #[must_use]
    pub fn new(prefix: &str, public_origin: &str) -> Self {
        Self {
            prefix: prefix.trim_end_matches('/').to_string(),
            public_origin: public_origin.trim_end_matches('/').to_string(),
        }
    }

    /// Returns the route prefix.
    #[must_use]
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Returns the URI of a gateway endpoint.
    #[must_use]
    pub fn uri(&self, key: RouteKey, kind: UrlKind) -> String {
        let path = format!("{}{}", self.prefix, key.suffix());
        match kind {
            UrlKind::Path => path,
            UrlKind::Absolute => format!("{}{}", self.public_origin, path),
        }
    }

    /// Returns the login path carrying an error code for the login page to render.
    #[must_use]
    pub fn login_error(&self, code: &str) -> String {
        format!(
            "{}?error={}",
            self.uri(RouteKey::Login, UrlKind::Path),
            urlencoding::encode(code)
        )
    }

    /// Returns the login path that forces the provider to ask for consent again.
    #[must_use]
    pub fn reconsent(&self) -> String {
        format!("{}?reconsent=true", self.uri(RouteKey::Login, UrlKind::Path))
    }
}
