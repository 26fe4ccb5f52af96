//! Centralized gateway configuration.
//!
//! This module provides strongly-typed configuration for the gateway,
//! loaded via the `config` crate from environment variables. Nested
//! sections use `__` as the separator, so `SESSION__SECRET` populates
//! `session.secret`.
//!
//! See [`ProviderConfig`] for the identity provider settings.

use config::ConfigError;
use portcullis_provider::ProviderConfig;
use portcullis_session::SessionSecret;
use serde::Deserialize;
use std::fmt;
use url::Url;

/// Gateway configuration composed from library configs.
#[derive(Debug, Deserialize)]
pub struct ServerConfig {
    /// Port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Origin of the protected backend, e.g. `http://app.internal:3000`.
    pub backend_url: String,

    /// Public origin browsers use to reach the gateway.
    pub public_url: String,

    /// Path prefix under which every gateway endpoint lives.
    #[serde(default = "default_route_prefix")]
    pub route_prefix: String,

    /// Requests under this path are answered with JSON instead of redirects.
    #[serde(default = "default_api_path_prefix")]
    pub api_path_prefix: String,

    /// Whether `X-Forwarded-Proto` from the fronting proxy is trusted when
    /// deciding to mark cookies `Secure`.
    #[serde(default = "default_trust_forwarded_proto")]
    pub trust_forwarded_proto: bool,

    /// Session configuration.
    pub session: SessionSettings,

    /// Identity provider configuration.
    pub provider: ProviderConfig,

    /// Reverse proxy configuration.
    #[serde(default)]
    pub proxy: ProxySettings,
}

/// Where sessions live.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStoreKind {
    /// The encrypted session travels in the cookie.
    #[default]
    Cookie,
    /// The cookie carries a random key into a process-local map.
    Memory,
}

/// Session-related configuration.
#[derive(Clone, Deserialize)]
pub struct SessionSettings {
    /// Secret the session key is derived from. At least 32 bytes.
    pub secret: String,

    /// Session storage mode.
    #[serde(default)]
    pub store: SessionStoreKind,

    /// Name of the session cookie.
    #[serde(default = "default_cookie_name")]
    pub cookie_name: String,
}

impl fmt::Debug for SessionSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionSettings")
            .field("secret", &"[redacted]")
            .field("store", &self.store)
            .field("cookie_name", &self.cookie_name)
            .finish()
    }
}

/// Reverse proxy configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ProxySettings {
    /// Timeout for each individual connection attempt to the backend.
    #[serde(default = "default_dial_timeout_seconds")]
    pub dial_timeout_seconds: u64,
}

impl Default for ProxySettings {
    fn default() -> Self {
        Self {
            dial_timeout_seconds: default_dial_timeout_seconds(),
        }
    }
}

fn default_port() -> u16 {
    8080
}

fn default_route_prefix() -> String {
    "/_gateway".to_string()
}

fn default_api_path_prefix() -> String {
    "/api/".to_string()
}

fn default_trust_forwarded_proto() -> bool {
    true
}

fn default_cookie_name() -> String {
    "gateway_session".to_string()
}

fn default_dial_timeout_seconds() -> u64 {
    30
}

impl ServerConfig {
    /// Loads configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if required configuration is missing or invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::load(None)
    }

    fn load(vars: Option<config::Map<String, String>>) -> Result<Self, ConfigError> {
        config::Config::builder()
            .add_source(
                // Values stay strings until deserialized, so an all-digit
                // secret or client id keeps its exact text.
                config::Environment::default()
                    .separator("__")
                    .source(vars),
            )
            .build()?
            .try_deserialize()
    }

    /// Checks every value the gateway cannot start without.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Message` describing the first problem found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        SessionSecret::new(&self.session.secret)
            .map_err(|e| ConfigError::Message(format!("SESSION__SECRET: {e}")))?;

        if self.session.cookie_name.trim().is_empty() {
            return Err(ConfigError::Message(
                "SESSION__COOKIE_NAME must not be empty".to_string(),
            ));
        }

        self.backend()?;
        self.public_origin()?;
        self.prefix()?;

        if !self.api_path_prefix.starts_with('/') {
            return Err(ConfigError::Message(format!(
                "API_PATH_PREFIX '{}' must start with '/'",
                self.api_path_prefix
            )));
        }

        if self.proxy.dial_timeout_seconds == 0 {
            return Err(ConfigError::Message(
                "PROXY__DIAL_TIMEOUT_SECONDS must be greater than zero".to_string(),
            ));
        }

        self.provider
            .validate()
            .map_err(|e| ConfigError::Message(format!("PROVIDER: {e}")))
    }

    /// Returns the parsed backend URL.
    ///
    /// # Errors
    ///
    /// Returns an error unless the URL parses, uses `http` and names a host.
    pub fn backend(&self) -> Result<Url, ConfigError> {
        let url = Url::parse(&self.backend_url).map_err(|e| {
            ConfigError::Message(format!("BACKEND_URL '{}': {e}", self.backend_url))
        })?;
        if url.scheme() != "http" {
            return Err(ConfigError::Message(format!(
                "BACKEND_URL '{}' must use http",
                self.backend_url
            )));
        }
        if url.host_str().is_none() {
            return Err(ConfigError::Message(format!(
                "BACKEND_URL '{}' has no host",
                self.backend_url
            )));
        }
        Ok(url)
    }

    /// Returns the public origin without a trailing slash.
    ///
    /// # Errors
    ///
    /// Returns an error unless the URL is an absolute http(s) URL.
    pub fn public_origin(&self) -> Result<String, ConfigError> {
        let url = Url::parse(&self.public_url).map_err(|e| {
            ConfigError::Message(format!("PUBLIC_URL '{}': {e}", self.public_url))
        })?;
        if !matches!(url.scheme(), "http" | "https") || url.host_str().is_none() {
            return Err(ConfigError::Message(format!(
                "PUBLIC_URL '{}' must be an absolute http(s) URL",
                self.public_url
            )));
        }
        Ok(self.public_url.trim_end_matches('/').to_string())
    }

    /// Returns the route prefix without a trailing slash.
    ///
    /// # Errors
    ///
    /// Returns an error if the prefix is empty, `/`, or relative, or if it
    /// contains characters the router treats as captures or wildcards.
    pub fn prefix(&self) -> Result<String, ConfigError> {
        let prefix = self.route_prefix.trim_end_matches('/');
        if prefix.is_empty() || !prefix.starts_with('/') {
            return Err(ConfigError::Message(format!(
                "ROUTE_PREFIX '{}' must start with '/' and name a path",
                self.route_prefix
            )));
        }
        if prefix.contains("//")
            || prefix
                .chars()
                .any(|c| matches!(c, '{' | '}' | '*' | ':' | '?' | '#') || c.is_whitespace())
        {
            return Err(ConfigError::Message(format!(
                "ROUTE_PREFIX '{}' must be a plain path without '{{', '}}', '*', ':', '?', '#', '//' or whitespace",
                self.route_prefix
            )));
        }
        Ok(prefix.to_string())
    }
}
