//! The identity provider seam used by the login flow.

use async_trait::async_trait;
use portcullis_core::Result;
use tracing::debug;

use crate::api::{ApiClient, UserInfo};
use crate::config::{ProviderConfig, ResourceKind};
use crate::error::ProviderError;
use crate::oauth::{OAuthClient, TokenSet};

/// Everything the login flow needs from the upstream provider.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Builds the URL the browser is sent to in order to authorize.
    fn authorization_url(&self, state: &str, reconsent: bool) -> String;

    /// Exchanges an authorization code for tokens.
    async fn exchange_code(&self, code: &str) -> Result<TokenSet, ProviderError>;

    /// Fetches the identity behind an access token.
    async fn fetch_user_info(&self, access_token: &str) -> Result<UserInfo, ProviderError>;

    /// Returns true if the token's owner is a member of the configured resource.
    async fn has_access(&self, access_token: &str) -> Result<bool, ProviderError>;
}

/// [`IdentityProvider`] backed by the real OAuth2 and API endpoints.
pub struct OAuthProvider {
    oauth: OAuthClient,
    api: ApiClient,
    resource_kind: ResourceKind,
    resource_id: String,
}

impl OAuthProvider {
    /// Creates a provider from validated configuration.
    ///
    /// `redirect_uri` is the absolute callback URL registered with the provider.
    ///
    /// # Errors
    ///
    /// Returns `ProviderError::Configuration` if the configuration is invalid.
    pub fn new(config: &ProviderConfig, redirect_uri: &str) -> Result<Self, ProviderError> {
        config.validate()?;

        Ok(Self {
            oauth: OAuthClient::new(config, redirect_uri)?,
            api: ApiClient::new(config)?,
            resource_kind: config.resource_kind(),
            resource_id: config.resource_id().to_string(),
        })
    }
}

#[async_trait]
impl IdentityProvider for OAuthProvider {
    fn authorization_url(&self, state: &str, reconsent: bool) -> String {
        self.oauth.authorization_url(state, reconsent)
    }

    async fn exchange_code(&self, code: &str) -> Result<TokenSet, ProviderError> {
        self.oauth.exchange_code(code).await
    }

    async fn fetch_user_info(&self, access_token: &str) -> Result<UserInfo, ProviderError> {
        self.api.fetch_user_info(access_token).await
    }

    async fn has_access(&self, access_token: &str) -> Result<bool, ProviderError> {
        let allowed = self
            .api
            .has_access(access_token, self.resource_kind, &self.resource_id)
            .await?;
        debug!(
            resource_kind = %self.resource_kind,
            resource_id = %self.resource_id,
            allowed,
            "membership checked"
        );
        Ok(allowed)
    }
}
