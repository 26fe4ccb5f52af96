//! The gate in front of the reverse proxy.

use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::CookieJar;
use portcullis_core::Identity;
use portcullis_session::{Session, SessionError};
use std::sync::Arc;
use tracing::{error, warn};

use super::{AppState, cookies};
use crate::http::{is_api_request, json_error};
use crate::routes::{RouteKey, UrlKind};

/// What the gate does with a request.
#[derive(Debug)]
pub enum GateDecision {
    /// Forward the request with this identity attached.
    Allow(Identity),
    /// The cookie was forged, corrupted or sealed with another key.
    Invalid(SessionError),
    /// No live session and the caller is a program.
    Unauthorized,
    /// No live session and the caller is a browser; send it here.
    Login(String),
}

/// Decides the gate outcome for a loaded session.
///
/// `path` is the request path and `target` the path plus query that the
/// browser is sent back to after logging in.
pub fn decide(
    loaded: Result<Option<Session>, SessionError>,
    api: bool,
    path: &str,
    target: &str,
    login_path: &str,
) -> GateDecision {
    match loaded {
        Ok(Some(session)) => GateDecision::Allow(session.identity()),
        Err(e) if e.is_invalid_token() => GateDecision::Invalid(e),
        Ok(None) | Err(_) if api => GateDecision::Unauthorized,
        Ok(None) | Err(_) => {
            if path == "/" {
                GateDecision::Login(login_path.to_string())
            } else {
                GateDecision::Login(format!(
                    "{login_path}?redirect={}",
                    urlencoding::encode(target)
                ))
            }
        }
    }
}

/// Admits requests carrying a live session and attaches its [`Identity`].
pub async fn require_session(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    mut request: Request,
    next: Next,
) -> Response {
    let loaded = match jar.get(&state.settings.session_cookie) {
        Some(cookie) => state.sessions.load(cookie.value()).await,
        None => Ok(None),
    };
    if let Err(e) = &loaded {
        if !e.is_invalid_token() {
            error!(error = %e, "session_load_failed");
        }
    }

    let uri = request.uri();
    let api = is_api_request(uri.path(), request.headers(), &state.settings.api_path_prefix);
    let target = uri.path_and_query().map_or("/", |pq| pq.as_str());
    let login_path = state.routes.uri(RouteKey::Login, UrlKind::Path);

    match decide(loaded, api, uri.path(), target, &login_path) {
        GateDecision::Allow(identity) => {
            request.extensions_mut().insert(identity);
            next.run(request).await
        }
        GateDecision::Invalid(e) => {
            warn!(
                reason = e.reason_code(),
                path = %request.uri().path(),
                "session_invalid"
            );
            let secure = state.secure_cookies(request.headers(), request.uri());
            let jar = jar.add(cookies::removal(&state.settings.session_cookie, secure));
            (
                jar,
                json_error(
                    StatusCode::UNAUTHORIZED,
                    "session_error",
                    "Invalid session. Please log in again.",
                ),
            )
                .into_response()
        }
        GateDecision::Unauthorized => json_error(
            StatusCode::UNAUTHORIZED,
            "unauthorized",
            "Session expired. Please log in again.",
        ),
        GateDecision::Login(location) => Redirect::temporary(&location).into_response(),
    }
}
