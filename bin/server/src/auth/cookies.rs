//! Cookie construction.
//!
//! All gateway cookies are HttpOnly, SameSite=Lax, scoped to `/`, and
//! `Secure` whenever the request arrived over HTTPS.

use axum_extra::extract::cookie::{Cookie, SameSite};
use portcullis_session::SESSION_DURATION_SECONDS;
use time::Duration;

/// Cookie holding the OAuth state token between login and callback.
pub const STATE_COOKIE: &str = "oauth_state";

/// Cookie holding the post-login destination between login and callback.
pub const REDIRECT_COOKIE: &str = "oauth_redirect";

/// Lifetime of the login transaction cookies.
const TRANSACTION_MINUTES: i64 = 10;

fn base(name: String, value: String, secure: bool) -> Cookie<'static> {
    Cookie::build((name, value))
        .path("/")
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::Lax)
        .build()
}

/// Builds a short-lived cookie for one login transaction.
#[must_use]
pub fn transaction(name: &str, value: String, secure: bool) -> Cookie<'static> {
    let mut cookie = base(name.to_string(), value, secure);
    cookie.set_max_age(Duration::minutes(TRANSACTION_MINUTES));
    cookie
}

/// Builds the session cookie. It lives exactly as long as the session.
#[must_use]
pub fn session(name: &str, value: String, secure: bool) -> Cookie<'static> {
    let mut cookie = base(name.to_string(), value, secure);
    cookie.set_max_age(Duration::seconds(SESSION_DURATION_SECONDS));
    cookie
}

/// Builds a cookie that makes the browser drop `name`.
#[must_use]
pub fn removal(name: &str, secure: bool) -> Cookie<'static> {
    let mut cookie = base(name.to_string(), String::new(), secure);
    cookie.set_max_age(Duration::ZERO);
    cookie
}
