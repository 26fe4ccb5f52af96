//! OAuth2 login, callback and logout handlers.
//!
//! A login moves through `Anonymous -> LoginInitiated -> CallbackPending`
//! and ends in exactly one of [`CallbackOutcome`]'s variants. The callback
//! resolves the outcome first and only then turns it into a response, so
//! every branch has a single terminal action.

use axum::{
    Json,
    extract::{Query, State},
    http::{HeaderMap, StatusCode, Uri},
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::CookieJar;
use portcullis_core::{is_safe_redirect, safe_redirect_or_default};
use portcullis_provider::new_state_token;
use portcullis_session::Session;
use serde::Deserialize;
use serde_json::json;
use std::fmt;
use std::sync::Arc;
use tracing::{error, info, warn};

use super::{
    AppState,
    cookies::{self, REDIRECT_COOKIE, STATE_COOKIE},
};
use crate::routes::{RouteKey, UrlKind};
use crate::views::{Button, ErrorPage};

/// Error code the callback hands to the login page on denial.
pub const NO_ACCESS: &str = "no_access";

/// Query parameters for the login endpoint.
#[derive(Debug, Default, Deserialize)]
pub struct LoginQuery {
    redirect: Option<String>,
    reconsent: Option<String>,
    error: Option<String>,
}

/// Query parameters for the provider callback.
#[derive(Debug, Default, Deserialize)]
pub struct CallbackQuery {
    code: Option<String>,
    state: Option<String>,
    error: Option<String>,
    error_description: Option<String>,
}

/// Why a callback could not complete.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlowError {
    /// No state cookie accompanied the callback.
    MissingState,
    /// The `state` parameter did not match the cookie.
    StateMismatch,
    /// The provider redirected back without a code.
    Provider {
        /// Message reported by the provider.
        message: String,
    },
    /// The code could not be exchanged for tokens.
    TokenExchange {
        /// Error details.
        details: String,
    },
    /// The caller's identity could not be fetched.
    UserInfo {
        /// Error details.
        details: String,
    },
    /// The membership check failed.
    AccessCheck {
        /// Error details.
        details: String,
    },
    /// The session could not be created.
    SessionIssue {
        /// Error details.
        details: String,
    },
}

impl FlowError {
    /// Stable stage name used in log events.
    #[must_use]
    pub fn stage(&self) -> &'static str {
        match self {
            Self::MissingState | Self::StateMismatch => "csrf",
            Self::Provider { .. } => "authorize",
            Self::TokenExchange { .. } => "token_exchange",
            Self::UserInfo { .. } => "user_info",
            Self::AccessCheck { .. } => "access_check",
            Self::SessionIssue { .. } => "session_issue",
        }
    }

    fn page(&self, login: &str, reconsent: &str) -> ErrorPage {
        let back = || Button::new("Back to login", login);
        let retry = || Button::new("Try again", reconsent);
        match self {
            Self::MissingState => ErrorPage::bad_request("Missing state cookie.").with_button(back()),
            Self::StateMismatch => {
                ErrorPage::bad_request("Invalid state parameter.").with_button(back())
            }
            Self::Provider { message } => {
                ErrorPage::bad_request(message.as_str()).with_button(back())
            }
            Self::TokenExchange { .. } => {
                ErrorPage::sign_in_failed("Failed to exchange the authorization code.")
                    .with_button(retry())
            }
            Self::UserInfo { .. } => {
                ErrorPage::sign_in_failed("Failed to fetch user info.").with_button(retry())
            }
            Self::AccessCheck { .. } => {
                ErrorPage::sign_in_failed("Failed to check access.").with_button(retry())
            }
            Self::SessionIssue { .. } => {
                ErrorPage::sign_in_failed("Failed to create session.").with_button(retry())
            }
        }
    }
}

impl fmt::Display for FlowError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingState => write!(f, "missing state cookie"),
            Self::StateMismatch => write!(f, "state parameter does not match cookie"),
            Self::Provider { message } => write!(f, "provider returned no code: {}", message),
            Self::TokenExchange { details } => write!(f, "token exchange failed: {}", details),
            Self::UserInfo { details } => write!(f, "user info failed: {}", details),
            Self::AccessCheck { details } => write!(f, "access check failed: {}", details),
            Self::SessionIssue { details } => write!(f, "session issue failed: {}", details),
        }
    }
}

impl std::error::Error for FlowError {}

/// Terminal state of a callback.
#[derive(Debug)]
pub enum CallbackOutcome {
    /// Login succeeded and a session token was minted.
    Authorized {
        /// Session cookie value.
        token: String,
        /// Where to send the browser next.
        destination: String,
    },
    /// The caller authenticated but is not a member of the resource.
    Denied,
    /// The flow failed.
    Errored(FlowError),
}

/// Initiates the OAuth flow by redirecting to the identity provider.
///
/// With an `error` query parameter the previous attempt is reported instead,
/// so a failed login never loops straight back to the provider.
pub async fn login(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    uri: Uri,
    Query(query): Query<LoginQuery>,
    jar: CookieJar,
) -> Response {
    if let Some(code) = query.error.as_deref().filter(|code| !code.is_empty()) {
        return login_error_page(&state, code);
    }

    let secure = state.secure_cookies(&headers, &uri);
    let reconsent = query.reconsent.as_deref() == Some("true");
    let state_token = new_state_token();

    let mut jar = jar.add(cookies::transaction(
        STATE_COOKIE,
        state_token.clone(),
        secure,
    ));
    jar = match query.redirect.filter(|target| is_safe_redirect(target)) {
        Some(target) => jar.add(cookies::transaction(REDIRECT_COOKIE, target, secure)),
        None => jar.add(cookies::removal(REDIRECT_COOKIE, secure)),
    };

    info!(
        redirect_uri = %state.routes.uri(RouteKey::Callback, UrlKind::Absolute),
        secure,
        reconsent,
        "oauth_login"
    );

    let authorization_url = state.provider.authorization_url(&state_token, reconsent);
    (jar, Redirect::temporary(&authorization_url)).into_response()
}

fn login_error_page(state: &AppState, code: &str) -> Response {
    let reconsent = state.routes.reconsent();
    let page = if code == NO_ACCESS {
        ErrorPage::new(
            StatusCode::FORBIDDEN,
            "Forbidden: 403",
            "You don't have permission to view this application.",
        )
        .with_note(format!(
            "Make sure you authorized the gateway against the correct {}.",
            state.settings.resource_label
        ))
        .with_button(Button::new("Reauthenticate & change permissions", reconsent))
    } else {
        ErrorPage::sign_in_failed(
            "An unknown error occurred during authentication. Try again below. \
             If the issue persists, consult the gateway logs.",
        )
        .with_button(Button::new("Try again", reconsent))
    };
    state.views.error_page(&page)
}

/// Handles the provider's redirect back to the gateway.
///
/// Both transaction cookies are cleared on every outcome, so a state token
/// can be redeemed at most once.
pub async fn callback(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    uri: Uri,
    Query(query): Query<CallbackQuery>,
    jar: CookieJar,
) -> Response {
    info!(
        has_code = query.code.is_some(),
        has_state = query.state.is_some(),
        provider_error = query.error.as_deref().unwrap_or_default(),
        "oauth_callback"
    );

    let secure = state.secure_cookies(&headers, &uri);
    let expected_state = jar.get(STATE_COOKIE).map(|c| c.value().to_string());
    let destination = safe_redirect_or_default(jar.get(REDIRECT_COOKIE).map(|c| c.value()))
        .to_string();
    let jar = jar
        .add(cookies::removal(STATE_COOKIE, secure))
        .add(cookies::removal(REDIRECT_COOKIE, secure));

    let outcome = resolve_callback(&state, expected_state.as_deref(), &query, destination).await;
    finish_callback(&state, jar, secure, outcome)
}

/// Runs the callback state machine up to its terminal state.
pub async fn resolve_callback(
    state: &AppState,
    expected_state: Option<&str>,
    query: &CallbackQuery,
    destination: String,
) -> CallbackOutcome {
    let Some(expected_state) = expected_state.filter(|s| !s.is_empty()) else {
        return CallbackOutcome::Errored(FlowError::MissingState);
    };
    if query.state.as_deref() != Some(expected_state) {
        return CallbackOutcome::Errored(FlowError::StateMismatch);
    }

    let Some(code) = query.code.as_deref().filter(|code| !code.is_empty()) else {
        let message = [&query.error_description, &query.error]
            .into_iter()
            .flatten()
            .find(|m| !m.is_empty())
            .cloned()
            .unwrap_or_else(|| "Authorization failed.".to_string());
        return CallbackOutcome::Errored(FlowError::Provider { message });
    };

    let tokens = match state.provider.exchange_code(code).await {
        Ok(tokens) => tokens,
        Err(e) => {
            return CallbackOutcome::Errored(FlowError::TokenExchange {
                details: e.to_string(),
            });
        }
    };

    let user_info = match state.provider.fetch_user_info(&tokens.access_token).await {
        Ok(user_info) => user_info,
        Err(e) => {
            return CallbackOutcome::Errored(FlowError::UserInfo {
                details: e.to_string(),
            });
        }
    };

    match state.provider.has_access(&tokens.access_token).await {
        Ok(true) => {}
        Ok(false) => {
            warn!(subject = %user_info.sub, "access_denied");
            return CallbackOutcome::Denied;
        }
        Err(e) => {
            return CallbackOutcome::Errored(FlowError::AccessCheck {
                details: e.to_string(),
            });
        }
    }

    let session = Session::new(user_info.into_identity(), tokens.access_token);
    match state.sessions.issue(&session).await {
        Ok(token) => {
            info!(subject = %session.subject_id(), "oauth_authorized");
            CallbackOutcome::Authorized { token, destination }
        }
        Err(e) => CallbackOutcome::Errored(FlowError::SessionIssue {
            details: e.to_string(),
        }),
    }
}

fn finish_callback(
    state: &AppState,
    jar: CookieJar,
    secure: bool,
    outcome: CallbackOutcome,
) -> Response {
    match outcome {
        CallbackOutcome::Authorized { token, destination } => {
            let jar = jar.add(cookies::session(
                &state.settings.session_cookie,
                token,
                secure,
            ));
            (jar, Redirect::temporary(&destination)).into_response()
        }
        CallbackOutcome::Denied => {
            (jar, Redirect::temporary(&state.routes.login_error(NO_ACCESS))).into_response()
        }
        CallbackOutcome::Errored(err) => {
            error!(stage = err.stage(), error = %err, "oauth_callback_error");
            let page = err.page(
                &state.routes.uri(RouteKey::Login, UrlKind::Path),
                &state.routes.reconsent(),
            );
            (jar, state.views.error_page(&page)).into_response()
        }
    }
}

/// Ends the session and sends the browser to `/`. Safe to call repeatedly.
pub async fn logout(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    uri: Uri,
    jar: CookieJar,
) -> Response {
    let secure = state.secure_cookies(&headers, &uri);
    let cookie_name = &state.settings.session_cookie;

    if let Some(cookie) = jar.get(cookie_name) {
        if let Err(e) = state.sessions.revoke(cookie.value()).await {
            warn!(reason = e.reason_code(), "session_revoke_failed");
        }
    }

    (jar.add(cookies::removal(cookie_name, secure)), Redirect::temporary("/")).into_response()
}

/// Liveness probe. Never gated.
pub async fn health() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::AuthSettings;
    use crate::routes::Routes;
    use async_trait::async_trait;
    use portcullis_provider::{IdentityProvider, ProviderError, TokenSet, UserInfo};
    use portcullis_session::{SessionBackend, SessionCodec, SessionSecret};

    #[derive(Clone, Copy)]
    enum Behavior {
        Allow,
        Deny,
        FailExchange,
        FailUserInfo,
        FailAccess,
    }

    struct StubProvider(Behavior);

    #[async_trait]
    impl IdentityProvider for StubProvider {
        fn authorization_url(&self, state: &str, _reconsent: bool) -> String {
            format!("https://provider.test/oauth/auth?state={state}")
        }

        async fn exchange_code(&self, _code: &str) -> portcullis_core::Result<TokenSet, ProviderError> {
            if matches!(self.0, Behavior::FailExchange) {
                return Err(ProviderError::TokenExchange {
                    details: "invalid_grant".to_string(),
                }
                .into());
            }
            Ok(TokenSet {
                access_token: "upstream".to_string(),
                expires_in: None,
            })
        }

        async fn fetch_user_info(
            &self,
            _access_token: &str,
        ) -> portcullis_core::Result<UserInfo, ProviderError> {
            if matches!(self.0, Behavior::FailUserInfo) {
                return Err(ProviderError::UserInfo {
                    details: "unexpected status: 500".to_string(),
                }
                .into());
            }
            Ok(UserInfo {
                sub: "u1".to_string(),
                email: "a@b.com".to_string(),
                name: "A".to_string(),
                picture: None,
            })
        }

        async fn has_access(&self, _access_token: &str) -> portcullis_core::Result<bool, ProviderError> {
            match self.0 {
                Behavior::Deny => Ok(false),
                Behavior::FailAccess => Err(ProviderError::AccessCheck {
                    details: "timeout".to_string(),
                }
                .into()),
                _ => Ok(true),
            }
        }
    }

    fn codec() -> SessionCodec {
        SessionCodec::new(&SessionSecret::new(&"s".repeat(32)).expect("secret"))
    }

    fn app_state(behavior: Behavior) -> AppState {
        AppState::new(
            Arc::new(StubProvider(behavior)),
            Arc::new(codec()),
            Routes::new("/_gateway", "https://gw.example.com"),
            AuthSettings {
                session_cookie: "gateway_session".to_string(),
                api_path_prefix: "/api/".to_string(),
                trust_forwarded_proto: true,
                resource_label: "workspace".to_string(),
            },
        )
    }

    fn query(state: Option<&str>, code: Option<&str>) -> CallbackQuery {
        CallbackQuery {
            code: code.map(str::to_string),
            state: state.map(str::to_string),
            ..CallbackQuery::default()
        }
    }

    #[tokio::test]
    async fn authorized_mints_parseable_session() {
        let state = app_state(Behavior::Allow);
        let outcome = resolve_callback(
            &state,
            Some("st"),
            &query(Some("st"), Some("code")),
            "/dashboard".to_string(),
        )
        .await;

        let CallbackOutcome::Authorized { token, destination } = outcome else {
            panic!("expected authorized");
        };
        assert_eq!(destination, "/dashboard");
        let session = codec().load(&token).await.expect("load").expect("present");
        assert_eq!(session.subject_id(), "u1");
        assert_eq!(session.upstream_access_token(), "upstream");
    }

    #[tokio::test]
    async fn missing_state_cookie_is_csrf_error() {
        let state = app_state(Behavior::Allow);
        let outcome =
            resolve_callback(&state, None, &query(Some("st"), Some("code")), "/".to_string()).await;
        assert!(matches!(
            outcome,
            CallbackOutcome::Errored(FlowError::MissingState)
        ));
    }

    #[tokio::test]
    async fn state_comparison_is_exact() {
        let state = app_state(Behavior::Allow);
        for presented in [Some("ST"), Some("st "), Some(""), None] {
            let outcome = resolve_callback(
                &state,
                Some("st"),
                &query(presented, Some("code")),
                "/".to_string(),
            )
            .await;
            assert!(matches!(
                outcome,
                CallbackOutcome::Errored(FlowError::StateMismatch)
            ));
        }
    }

    #[tokio::test]
    async fn empty_state_cookie_never_matches() {
        let state = app_state(Behavior::Allow);
        for presented in [Some(""), None] {
            let outcome = resolve_callback(
                &state,
                Some(""),
                &query(presented, Some("code")),
                "/".to_string(),
            )
            .await;
            assert!(matches!(
                outcome,
                CallbackOutcome::Errored(FlowError::MissingState)
            ));
        }
    }

    #[tokio::test]
    async fn provider_error_is_surfaced() {
        let state = app_state(Behavior::Allow);
        let q = CallbackQuery {
            state: Some("st".to_string()),
            error: Some("access_denied".to_string()),
            error_description: Some("User declined".to_string()),
            ..CallbackQuery::default()
        };
        let outcome = resolve_callback(&state, Some("st"), &q, "/".to_string()).await;
        let CallbackOutcome::Errored(FlowError::Provider { message }) = outcome else {
            panic!("expected provider error");
        };
        assert_eq!(message, "User declined");
    }

    #[tokio::test]
    async fn each_failing_stage_is_reported() {
        let cases = [
            (Behavior::FailExchange, "token_exchange"),
            (Behavior::FailUserInfo, "user_info"),
            (Behavior::FailAccess, "access_check"),
        ];
        for (behavior, stage) in cases {
            let state = app_state(behavior);
            let outcome = resolve_callback(
                &state,
                Some("st"),
                &query(Some("st"), Some("code")),
                "/".to_string(),
            )
            .await;
            let CallbackOutcome::Errored(err) = outcome else {
                panic!("expected error for {stage}");
            };
            assert_eq!(err.stage(), stage);
        }
    }

    #[tokio::test]
    async fn non_member_is_denied() {
        let state = app_state(Behavior::Deny);
        let outcome = resolve_callback(
            &state,
            Some("st"),
            &query(Some("st"), Some("code")),
            "/".to_string(),
        )
        .await;
        assert!(matches!(outcome, CallbackOutcome::Denied));
    }

    #[test]
    fn provider_failures_offer_reconsent() {
        let err = FlowError::TokenExchange {
            details: "x".to_string(),
        };
        let page = err.page("/_gateway/login", "/_gateway/login?reconsent=true");
        assert_eq!(page.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let page = FlowError::StateMismatch.page("/_gateway/login", "/r");
        assert_eq!(page.status(), StatusCode::BAD_REQUEST);
    }
}
