//! Reverse proxy to the protected backend.
//!
//! Requests reach this module only after the gate admitted them, so an
//! [`Identity`] is normally attached. Responses are streamed back chunk by
//! chunk as the backend produces them; nothing is buffered.

pub mod dial;

use axum::{
    body::Body,
    extract::{ConnectInfo, Request, State},
    http::{
        HeaderMap, HeaderName, HeaderValue, StatusCode, Uri, Version,
        header::{self, HOST},
    },
    response::{IntoResponse, Response},
};
use hyper_util::{client::legacy::Client, rt::TokioExecutor};
use portcullis_core::Identity;
use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, warn};
use url::Url;

pub use dial::{DialError, DualStackConnector, order_and_try, prefer_ipv6};

/// Header carrying the caller's email to the backend.
pub const X_AUTH_EMAIL: &str = "x-auth-email";
/// Header carrying the caller's subject id to the backend.
pub const X_AUTH_USER_ID: &str = "x-auth-user-id";
/// Header carrying the caller's display name to the backend.
pub const X_AUTH_NAME: &str = "x-auth-name";

const X_AUTH_PREFIX: &str = "x-auth-";
const X_FORWARDED_HOST: &str = "x-forwarded-host";
const X_FORWARDED_PROTO: &str = "x-forwarded-proto";
const X_FORWARDED_FOR: &str = "x-forwarded-for";

static HOP_BY_HOP: [HeaderName; 8] = [
    header::CONNECTION,
    HeaderName::from_static("keep-alive"),
    header::PROXY_AUTHENTICATE,
    header::PROXY_AUTHORIZATION,
    header::TE,
    header::TRAILER,
    header::TRANSFER_ENCODING,
    header::UPGRADE,
];

/// Errors from forwarding a request.
#[derive(Debug)]
pub enum ProxyError {
    /// The backend URL cannot be used.
    InvalidBackend {
        /// Error details.
        details: String,
    },
    /// The rewritten request URI is invalid.
    InvalidUri {
        /// Error details.
        details: String,
    },
    /// Connecting to or talking with the backend failed.
    Upstream {
        /// Error details, including the cause chain.
        details: String,
    },
}

impl fmt::Display for ProxyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidBackend { details } => write!(f, "invalid backend: {}", details),
            Self::InvalidUri { details } => write!(f, "invalid upstream URI: {}", details),
            Self::Upstream { details } => write!(f, "upstream request failed: {}", details),
        }
    }
}

impl std::error::Error for ProxyError {}

/// Forwards requests to a single plain-HTTP backend.
#[derive(Clone)]
pub struct ReverseProxy {
    client: Client<DualStackConnector, Body>,
    authority: String,
    host_header: HeaderValue,
    base_path: String,
}

impl ReverseProxy {
    /// Creates a proxy for `backend`, bounding each dial attempt by `dial_timeout`.
    ///
    /// # Errors
    ///
    /// Returns `ProxyError::InvalidBackend` unless `backend` is an `http` URL
    /// with a host.
    pub fn new(backend: &Url, dial_timeout: Duration) -> Result<Self, ProxyError> {
        if backend.scheme() != "http" {
            return Err(ProxyError::InvalidBackend {
                details: format!("unsupported scheme '{}'", backend.scheme()),
            });
        }
        let host = backend.host_str().ok_or_else(|| ProxyError::InvalidBackend {
            details: format!("'{}' has no host", backend),
        })?;
        let port = backend.port_or_known_default().unwrap_or(80);

        let host_header = match backend.port() {
            Some(port) => format!("{host}:{port}"),
            None => host.to_string(),
        };
        let host_header =
            HeaderValue::from_str(&host_header).map_err(|e| ProxyError::InvalidBackend {
                details: e.to_string(),
            })?;

        let client = Client::builder(TokioExecutor::new())
            .build(DualStackConnector::new(dial_timeout));

        Ok(Self {
            client,
            authority: format!("{host}:{port}"),
            host_header,
            base_path: backend.path().trim_end_matches('/').to_string(),
        })
    }

    /// Sends `request` to the backend and returns its streaming response.
    ///
    /// # Errors
    ///
    /// Returns an error if the URI cannot be rewritten or the backend cannot
    /// be reached.
    pub async fn forward(&self, request: Request) -> Result<Response, ProxyError> {
        let (mut parts, body) = request.into_parts();

        let identity = parts.extensions.get::<Identity>().cloned();
        let client_ip = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip());
        let original_host = parts
            .headers
            .get(HOST)
            .cloned()
            .or_else(|| {
                parts
                    .uri
                    .authority()
                    .and_then(|a| HeaderValue::from_str(a.as_str()).ok())
            });

        parts.uri = self.upstream_uri(&parts.uri)?;
        parts.version = Version::HTTP_11;

        let headers = &mut parts.headers;
        strip_hop_by_hop(headers);
        if let Some(original_host) = original_host {
            set_if_absent(headers, X_FORWARDED_HOST, original_host);
        }
        set_if_absent(
            headers,
            X_FORWARDED_PROTO,
            HeaderValue::from_static("https"),
        );
        if let Some(ip) = client_ip {
            append_forwarded_for(headers, &ip.to_string());
        }
        apply_identity(headers, identity.as_ref());
        headers.insert(HOST, self.host_header.clone());

        let response = self
            .client
            .request(Request::from_parts(parts, body))
            .await
            .map_err(|e| ProxyError::Upstream {
                details: error_chain(&e),
            })?;

        let (mut parts, body) = response.into_parts();
        strip_hop_by_hop(&mut parts.headers);
        Ok(Response::from_parts(parts, Body::new(body)))
    }

    fn upstream_uri(&self, original: &Uri) -> Result<Uri, ProxyError> {
        let path_and_query = original.path_and_query().map_or("/", |pq| pq.as_str());
        format!("http://{}{}{}", self.authority, self.base_path, path_and_query)
            .parse()
            .map_err(|e: axum::http::uri::InvalidUri| ProxyError::InvalidUri {
                details: e.to_string(),
            })
    }
}

/// Fallback handler forwarding every gated request.
pub async fn proxy(State(proxy): State<Arc<ReverseProxy>>, request: Request) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();

    match proxy.forward(request).await {
        Ok(response) => response,
        Err(e) => {
            error!(%method, %path, error = %e, "proxy_error");
            (StatusCode::BAD_GATEWAY, "Bad Gateway").into_response()
        }
    }
}

/// Removes hop-by-hop headers, including any named by `Connection`.
pub fn strip_hop_by_hop(headers: &mut HeaderMap) {
    let named: Vec<HeaderName> = headers
        .get_all(header::CONNECTION)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .filter_map(|name| HeaderName::from_bytes(name.trim().as_bytes()).ok())
        .collect();
    for name in named.iter().chain(HOP_BY_HOP.iter()) {
        headers.remove(name);
    }
}

/// Replaces every caller-supplied `X-Auth-*` header with values from `identity`.
pub fn apply_identity(headers: &mut HeaderMap, identity: Option<&Identity>) {
    let spoofed: Vec<HeaderName> = headers
        .keys()
        .filter(|name| name.as_str().starts_with(X_AUTH_PREFIX))
        .cloned()
        .collect();
    for name in spoofed {
        headers.remove(name);
    }

    let Some(identity) = identity else {
        return;
    };
    let values = [
        (X_AUTH_EMAIL, identity.email()),
        (X_AUTH_USER_ID, identity.subject_id()),
        (X_AUTH_NAME, identity.display_name()),
    ];
    for (name, value) in values {
        match HeaderValue::from_bytes(value.as_bytes()) {
            Ok(value) => {
                headers.insert(name, value);
            }
            Err(_) => warn!(header = name, "identity value not representable as a header"),
        }
    }
}

fn set_if_absent(headers: &mut HeaderMap, name: &'static str, value: HeaderValue) {
    if !headers.contains_key(name) {
        headers.insert(name, value);
    }
}

fn append_forwarded_for(headers: &mut HeaderMap, ip: &str) {
    let joined = match headers.get(X_FORWARDED_FOR).and_then(|v| v.to_str().ok()) {
        Some(existing) if !existing.trim().is_empty() => format!("{existing}, {ip}"),
        _ => ip.to_string(),
    };
    if let Ok(value) = HeaderValue::from_str(&joined) {
        headers.insert(X_FORWARDED_FOR, value);
    }
}

fn error_chain(err: &dyn std::error::Error) -> String {
    let mut out = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        out.push_str(": ");
        out.push_str(&cause.to_string());
        source = cause.source();
    }
    out
}
