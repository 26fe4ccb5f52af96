//! Identity provider configuration.

use serde::{Deserialize, Serialize};
use std::fmt;
use url::Url;

use crate::error::ProviderError;

/// Which kind of resource the membership check targets.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
    /// Membership of a workspace.
    #[default]
    Workspace,
    /// Access to a project.
    Project,
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Workspace => f.write_str("workspace"),
            Self::Project => f.write_str("project"),
        }
    }
}

/// Configuration for the upstream OAuth2 provider.
///
/// Fields with defaults can be omitted when loading from environment variables.
#[derive(Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// The OAuth2 client ID registered with the provider.
    client_id: String,
    /// The OAuth2 client secret.
    client_secret: String,
    /// Identifier of the workspace or project callers must belong to.
    resource_id: String,
    /// Whether `resource_id` names a workspace or a project.
    #[serde(default)]
    resource_kind: ResourceKind,
    /// Authorization endpoint browsers are redirected to.
    #[serde(default = "default_authorize_url")]
    authorize_url: String,
    /// Token endpoint used for the code exchange.
    #[serde(default = "default_token_url")]
    token_url: String,
    /// Endpoint returning the caller's identity for an access token.
    #[serde(default = "default_userinfo_url")]
    userinfo_url: String,
    /// GraphQL endpoint used for membership queries.
    #[serde(default = "default_graphql_url")]
    graphql_url: String,
    /// Space-separated scopes to request.
    #[serde(default = "default_scopes")]
    scopes: String,
    /// Timeout for every outbound provider call, in seconds.
    #[serde(default = "default_timeout_seconds")]
    timeout_seconds: u64,
}

fn default_authorize_url() -> String {
    "https://backboard.railway.com/oauth/auth".to_string()
}

fn default_token_url() -> String {
    "https://backboard.railway.com/oauth/token".to_string()
}

fn default_userinfo_url() -> String {
    "https://backboard.railway.com/oauth/me".to_string()
}

fn default_graphql_url() -> String {
    "https://backboard.railway.com/graphql/v2".to_string()
}

fn default_scopes() -> String {
    "openid email profile project:viewer".to_string()
}

fn default_timeout_seconds() -> u64 {
    30
}

impl ProviderConfig {
    /// Creates a configuration with default endpoints.
    #[must_use]
    pub fn new(client_id: String, client_secret: String, resource_id: String) -> Self {
        Self {
            client_id,
            client_secret,
            resource_id,
            resource_kind: ResourceKind::default(),
            authorize_url: default_authorize_url(),
            token_url: default_token_url(),
            userinfo_url: default_userinfo_url(),
            graphql_url: default_graphql_url(),
            scopes: default_scopes(),
            timeout_seconds: default_timeout_seconds(),
        }
    }

    /// Points every endpoint at `base` using the provider's standard paths.
    #[must_use]
    pub fn with_endpoint_base(mut self, base: &str) -> Self {
        let base = base.trim_end_matches('/');
        self.authorize_url = format!("{base}/oauth/auth");
        self.token_url = format!("{base}/oauth/token");
        self.userinfo_url = format!("{base}/oauth/me");
        self.graphql_url = format!("{base}/graphql/v2");
        self
    }

    /// Sets the kind of resource the membership check targets.
    #[must_use]
    pub fn with_resource_kind(mut self, kind: ResourceKind) -> Self {
        self.resource_kind = kind;
        self
    }

    /// Sets the outbound call timeout.
    #[must_use]
    pub fn with_timeout_seconds(mut self, seconds: u64) -> Self {
        self.timeout_seconds = seconds;
        self
    }

    /// Returns the OAuth2 client ID.
    #[must_use]
    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    /// Returns the OAuth2 client secret.
    #[must_use]
    pub fn client_secret(&self) -> &str {
        &self.client_secret
    }

    /// Returns the resource callers must belong to.
    #[must_use]
    pub fn resource_id(&self) -> &str {
        &self.resource_id
    }

    /// Returns the kind of the configured resource.
    #[must_use]
    pub fn resource_kind(&self) -> ResourceKind {
        self.resource_kind
    }

    /// Returns the authorization endpoint.
    #[must_use]
    pub fn authorize_url(&self) -> &str {
        &self.authorize_url
    }

    /// Returns the token endpoint.
    #[must_use]
    pub fn token_url(&self) -> &str {
        &self.token_url
    }

    /// Returns the user info endpoint.
    #[must_use]
    pub fn userinfo_url(&self) -> &str {
        &self.userinfo_url
    }

    /// Returns the GraphQL endpoint.
    #[must_use]
    pub fn graphql_url(&self) -> &str {
        &self.graphql_url
    }

    /// Returns the scopes to request.
    #[must_use]
    pub fn scopes(&self) -> Vec<&str> {
        self.scopes.split_whitespace().collect()
    }

    /// Returns the outbound call timeout in seconds.
    #[must_use]
    pub fn timeout_seconds(&self) -> u64 {
        self.timeout_seconds
    }

    /// Checks that required values are present and endpoints are absolute URLs.
    ///
    /// # Errors
    ///
    /// Returns `ProviderError::Configuration` describing the first problem.
    pub fn validate(&self) -> Result<(), ProviderError> {
        let required = [
            ("client_id", &self.client_id),
            ("client_secret", &self.client_secret),
            ("resource_id", &self.resource_id),
        ];
        for (name, value) in required {
            if value.trim().is_empty() {
                return Err(ProviderError::Configuration {
                    details: format!("{name} is required"),
                });
            }
        }

        let endpoints = [
            ("authorize_url", &self.authorize_url),
            ("token_url", &self.token_url),
            ("userinfo_url", &self.userinfo_url),
            ("graphql_url", &self.graphql_url),
        ];
        for (name, value) in endpoints {
            Url::parse(value).map_err(|e| ProviderError::Configuration {
                details: format!("invalid {name} '{value}': {e}"),
            })?;
        }

        if self.timeout_seconds == 0 {
            return Err(ProviderError::Configuration {
                details: "timeout_seconds must be greater than zero".to_string(),
            });
        }

        Ok(())
    }
}

impl fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("client_id", &self.client_id)
            .field("client_secret", &"[redacted]")
            .field("resource_id", &self.resource_id)
            .field("resource_kind", &self.resource_kind)
            .field("authorize_url", &self.authorize_url)
            .field("token_url", &self.token_url)
            .field("userinfo_url", &self.userinfo_url)
            .field("graphql_url", &self.graphql_url)
            .field("scopes", &self.scopes)
            .field("timeout_seconds", &self.timeout_seconds)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> ProviderConfig {
        ProviderConfig::new(
            "client".to_string(),
            "secret".to_string(),
            "ws_123".to_string(),
        )
    }

    #[test]
    fn defaults_are_applied() {
        let config = test_config();
        assert_eq!(config.resource_kind(), ResourceKind::Workspace);
        assert_eq!(config.timeout_seconds(), 30);
        assert_eq!(
            config.scopes(),
            vec!["openid", "email", "profile", "project:viewer"]
        );
        assert!(config.validate().is_ok());
    }

    #[test]
    fn deserializes_with_defaults() {
        let config: ProviderConfig = serde_json::from_value(serde_json::json!({
            "client_id": "client",
            "client_secret": "secret",
            "resource_id": "prj_1",
            "resource_kind": "project",
        }))
        .expect("deserialize");
        assert_eq!(config.resource_kind(), ResourceKind::Project);
        assert_eq!(config.token_url(), "https://backboard.railway.com/oauth/token");
    }

    #[test]
    fn endpoint_base_rewrites_all_endpoints() {
        let config = test_config().with_endpoint_base("http://127.0.0.1:9999/");
        assert_eq!(config.authorize_url(), "http://127.0.0.1:9999/oauth/auth");
        assert_eq!(config.token_url(), "http://127.0.0.1:9999/oauth/token");
        assert_eq!(config.userinfo_url(), "http://127.0.0.1:9999/oauth/me");
        assert_eq!(config.graphql_url(), "http://127.0.0.1:9999/graphql/v2");
    }

    #[test]
    fn missing_client_secret_is_rejected() {
        let config = ProviderConfig::new("client".to_string(), " ".to_string(), "ws".to_string());
        let err = config.validate().expect_err("should fail");
        assert!(err.to_string().contains("client_secret"));
    }

    #[test]
    fn relative_endpoint_is_rejected() {
        let config = test_config().with_endpoint_base("not-a-url");
        assert!(config.validate().is_err());
    }

    #[test]
    fn debug_redacts_secret() {
        let rendered = format!("{:?}", test_config());
        assert!(rendered.contains("[redacted]"));
        assert!(!rendered.contains("\"secret\""));
    }
}
