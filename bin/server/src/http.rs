//! Small request and response helpers shared by the handlers.

use axum::{
    Json,
    http::{HeaderMap, StatusCode, Uri, header},
    response::{IntoResponse, Response},
};
use serde_json::json;

const X_FORWARDED_PROTO: &str = "x-forwarded-proto";

/// Returns true if the caller reached the gateway over HTTPS.
///
/// The gateway itself only speaks plain HTTP, so this is either an absolute
/// `https` request URI or, when trusted, the fronting proxy's
/// `X-Forwarded-Proto`.
#[must_use]
pub fn is_https(headers: &HeaderMap, uri: &Uri, trust_forwarded_proto: bool) -> bool {
    if uri.scheme_str() == Some("https") {
        return true;
    }
    trust_forwarded_proto
        && headers
            .get(X_FORWARDED_PROTO)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .is_some_and(|proto| proto.trim().eq_ignore_ascii_case("https"))
}

/// Returns true if the request looks like it came from code rather than a
/// browser navigation, so it should get JSON instead of a redirect.
#[must_use]
pub fn is_api_request(path: &str, headers: &HeaderMap, api_path_prefix: &str) -> bool {
    if path.starts_with(api_path_prefix) {
        return true;
    }

    let accept = header_str(headers, header::ACCEPT);
    if accept.contains("application/json") && !accept.contains("text/html") {
        return true;
    }

    header_str(headers, header::CONTENT_TYPE).starts_with("application/json")
}

fn header_str(headers: &HeaderMap, name: header::HeaderName) -> &str {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
}

/// Builds a structured JSON error response.
pub fn json_error(status: StatusCode, code: &str, message: &str) -> Response {
    (status, Json(json!({ "error": code, "message": message }))).into_response()
}
