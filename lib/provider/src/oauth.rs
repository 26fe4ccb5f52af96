//! OAuth2 authorization-code client built on the `oauth2` crate.

use oauth2::basic::BasicClient;
use oauth2::{
    AuthUrl, AuthorizationCode, ClientId, ClientSecret, CsrfToken, EndpointNotSet, EndpointSet,
    RedirectUrl, Scope, TokenResponse, TokenUrl,
};
use portcullis_core::Result;
use std::time::Duration;
use tracing::{debug, instrument};

use crate::config::ProviderConfig;
use crate::error::ProviderError;

type ConfiguredClient =
    BasicClient<EndpointSet, EndpointNotSet, EndpointNotSet, EndpointNotSet, EndpointSet>;

/// Tokens returned by a successful code exchange.
#[derive(Clone)]
pub struct TokenSet {
    /// Bearer token for provider API calls.
    pub access_token: String,
    /// Lifetime reported by the provider, if any.
    pub expires_in: Option<Duration>,
}

impl std::fmt::Debug for TokenSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenSet")
            .field("access_token", &"[redacted]")
            .field("expires_in", &self.expires_in)
            .finish()
    }
}

/// Builds authorization URLs and exchanges authorization codes.
pub struct OAuthClient {
    client: ConfiguredClient,
    http_client: reqwest::Client,
    scopes: Vec<Scope>,
}

/// Generates a fresh state token for one authorization attempt.
///
/// The token carries 256 bits from the operating system's CSPRNG, encoded
/// as URL-safe base64.
#[must_use]
pub fn new_state_token() -> String {
    CsrfToken::new_random_len(32).secret().clone()
}

/// Builds the HTTP client used for every server-to-server provider call.
///
/// Redirects are never followed and every call is bounded by the configured
/// timeout.
pub(crate) fn build_http_client(config: &ProviderConfig) -> Result<reqwest::Client, ProviderError> {
    let client = reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .timeout(Duration::from_secs(config.timeout_seconds()))
        .build()
        .map_err(|e| ProviderError::Configuration {
            details: format!("failed to create HTTP client: {}", e),
        })?;
    Ok(client)
}

impl OAuthClient {
    /// Creates a client that sends callers back to `redirect_uri`.
    ///
    /// # Errors
    ///
    /// Returns `ProviderError::Configuration` if an endpoint or the redirect
    /// URI is not a valid URL.
    pub fn new(config: &ProviderConfig, redirect_uri: &str) -> Result<Self, ProviderError> {
        let auth_url = AuthUrl::new(config.authorize_url().to_string()).map_err(|e| {
            ProviderError::Configuration {
                details: format!("invalid authorize URL: {}", e),
            }
        })?;
        let token_url = TokenUrl::new(config.token_url().to_string()).map_err(|e| {
            ProviderError::Configuration {
                details: format!("invalid token URL: {}", e),
            }
        })?;
        let redirect_url = RedirectUrl::new(redirect_uri.to_string()).map_err(|e| {
            ProviderError::Configuration {
                details: format!("invalid redirect URI: {}", e),
            }
        })?;

        let client = BasicClient::new(ClientId::new(config.client_id().to_string()))
            .set_client_secret(ClientSecret::new(config.client_secret().to_string()))
            .set_auth_uri(auth_url)
            .set_token_uri(token_url)
            .set_redirect_uri(redirect_url);

        let scopes = config
            .scopes()
            .into_iter()
            .map(|scope| Scope::new(scope.to_string()))
            .collect();

        Ok(Self {
            client,
            http_client: build_http_client(config)?,
            scopes,
        })
    }

    /// Generates the authorization URL for redirecting the caller.
    ///
    /// The URL carries `response_type=code`, the client id, the callback
    /// redirect URI, the configured scopes and `state`. With `reconsent` the
    /// provider is asked to show the consent screen again.
    #[must_use]
    pub fn authorization_url(&self, state: &str, reconsent: bool) -> String {
        let state = state.to_string();
        let mut request = self
            .client
            .authorize_url(move || CsrfToken::new(state))
            .add_scopes(self.scopes.iter().cloned());

        if reconsent {
            request = request.add_extra_param("prompt", "consent");
        }

        let (url, _state) = request.url();
        url.to_string()
    }

    /// Exchanges an authorization code for tokens.
    ///
    /// The request authenticates with HTTP basic client credentials and a
    /// form-encoded body. Anything other than HTTP 200 with a decodable token
    /// payload is an error.
    ///
    /// # Errors
    ///
    /// Returns `ProviderError::TokenExchange` on transport failure, timeout,
    /// non-200 status, or an undecodable body.
    #[instrument(skip_all)]
    pub async fn exchange_code(&self, code: &str) -> Result<TokenSet, ProviderError> {
        let response = self
            .client
            .exchange_code(AuthorizationCode::new(code.to_string()))
            .request_async(&self.http_client)
            .await
            .map_err(|e| ProviderError::TokenExchange {
                details: e.to_string(),
            })?;

        debug!(expires_in = ?response.expires_in(), "token exchange succeeded");

        Ok(TokenSet {
            access_token: response.access_token().secret().clone(),
            expires_in: response.expires_in(),
        })
    }
}
