//! Router assembly.

use axum::{
    Router,
    extract::{FromRef, State},
    handler::Handler,
    middleware,
    response::Response,
    routing::{any, get},
};
use config::ConfigError;
use portcullis_provider::OAuthProvider;
use portcullis_session::{
    MemorySessionStore, SessionBackend, SessionCodec, SessionSecret, StoredSessions,
};
use std::sync::Arc;
use std::time::Duration;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::auth::{self, AppState, AuthSettings};
use crate::config::{ServerConfig, SessionStoreKind};
use crate::proxy::{self, ReverseProxy};
use crate::routes::{RouteKey, Routes, UrlKind};
use crate::views;

/// Combined state for the gateway router.
#[derive(Clone)]
pub struct GatewayState {
    auth: Arc<AppState>,
    proxy: Arc<ReverseProxy>,
}

impl FromRef<GatewayState> for Arc<AppState> {
    fn from_ref(state: &GatewayState) -> Self {
        state.auth.clone()
    }
}

impl FromRef<GatewayState> for Arc<ReverseProxy> {
    fn from_ref(state: &GatewayState) -> Self {
        state.proxy.clone()
    }
}

/// Builds the gateway router.
///
/// Gateway endpoints under the route prefix are served directly. Everything
/// else goes through the gate and then to the backend.
pub fn router(auth: Arc<AppState>, proxy: Arc<ReverseProxy>) -> Router {
    let routes = auth.routes.clone();
    let prefix = routes.prefix().to_string();
    let gated_proxy = proxy::proxy.layer(middleware::from_fn_with_state(
        auth.clone(),
        auth::require_session,
    ));

    Router::new()
        .route(&routes.uri(RouteKey::Login, UrlKind::Path), get(auth::login))
        .route(
            &routes.uri(RouteKey::Callback, UrlKind::Path),
            get(auth::callback),
        )
        .route(&routes.uri(RouteKey::Logout, UrlKind::Path), get(auth::logout))
        .route(&routes.uri(RouteKey::Health, UrlKind::Path), get(auth::health))
        .route(
            &routes.uri(RouteKey::Stylesheet, UrlKind::Path),
            get(views::stylesheet),
        )
        .route(&prefix, any(not_found))
        .route(&format!("{prefix}/{{*rest}}"), any(not_found))
        .fallback(gated_proxy)
        .layer(TraceLayer::new_for_http())
        .with_state(GatewayState { auth, proxy })
}

async fn not_found(State(state): State<Arc<AppState>>) -> Response {
    state.views.not_found()
}

/// Wires every component from validated configuration.
///
/// # Errors
///
/// Returns `ConfigError::Message` if any component rejects its configuration.
pub fn build(config: &ServerConfig) -> Result<Router, ConfigError> {
    let routes = Routes::new(&config.prefix()?, &config.public_origin()?);
    let callback = routes.uri(RouteKey::Callback, UrlKind::Absolute);

    let provider = OAuthProvider::new(&config.provider, &callback)
        .map_err(|e| ConfigError::Message(e.to_string()))?;

    let secret = SessionSecret::new(&config.session.secret)
        .map_err(|e| ConfigError::Message(e.to_string()))?;
    let sessions: Arc<dyn SessionBackend> = match config.session.store {
        SessionStoreKind::Cookie => Arc::new(SessionCodec::new(&secret)),
        SessionStoreKind::Memory => {
            warn!(
                "using in-memory session store: sessions are lost on restart and not shared between replicas"
            );
            Arc::new(StoredSessions::new(MemorySessionStore::new()))
        }
    };

    let proxy = ReverseProxy::new(
        &config.backend()?,
        Duration::from_secs(config.proxy.dial_timeout_seconds),
    )
    .map_err(|e| ConfigError::Message(e.to_string()))?;

    info!(
        backend = %config.backend_url,
        prefix = %routes.prefix(),
        callback = %callback,
        resource_kind = %config.provider.resource_kind(),
        store = ?config.session.store,
        "gateway configured"
    );

    let auth = AppState::new(
        Arc::new(provider),
        sessions,
        routes,
        AuthSettings {
            session_cookie: config.session.cookie_name.clone(),
            api_path_prefix: config.api_path_prefix.clone(),
            trust_forwarded_proto: config.trust_forwarded_proto,
            resource_label: config.provider.resource_kind().to_string(),
        },
    );

    Ok(router(Arc::new(auth), Arc::new(proxy)))
}
