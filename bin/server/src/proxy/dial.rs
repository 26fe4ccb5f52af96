//! Dual-stack backend dialing.
//!
//! Private networks on some hosting platforms only route IPv6, while local
//! development usually only has IPv4. The connector resolves every address
//! of the backend host and tries them IPv6 first, one at a time.

use axum::http::Uri;
use hyper_util::rt::TokioIo;
use std::fmt;
use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::net::{TcpStream, lookup_host};
use tower::Service;
use tracing::debug;

/// Errors from connecting to the backend.
#[derive(Debug)]
pub enum DialError {
    /// The request URI names no host.
    MissingHost {
        /// The offending URI.
        uri: String,
    },
    /// Name resolution failed.
    Resolve {
        /// Host being resolved.
        host: String,
        /// Resolver error.
        source: io::Error,
    },
    /// Resolution returned no addresses.
    NoAddresses {
        /// Host being resolved.
        host: String,
    },
    /// Every address was tried and none accepted a connection.
    AllFailed {
        /// Host being dialed.
        host: String,
        /// Number of addresses tried.
        tried: usize,
        /// Error from the final attempt.
        last: io::Error,
    },
}

impl fmt::Display for DialError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingHost { uri } => write!(f, "backend URI '{}' has no host", uri),
            Self::Resolve { host, source } => write!(f, "dns lookup {:?}: {}", host, source),
            Self::NoAddresses { host } => write!(f, "dns lookup {:?} returned no addresses", host),
            Self::AllFailed { host, tried, last } => write!(
                f,
                "all addresses failed for {:?} (tried {}): {}",
                host, tried, last
            ),
        }
    }
}

impl std::error::Error for DialError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Resolve { source, .. } => Some(source),
            Self::AllFailed { last, .. } => Some(last),
            Self::MissingHost { .. } | Self::NoAddresses { .. } => None,
        }
    }
}

/// Orders `candidates` IPv6 first, keeping resolver order within each family.
#[must_use]
pub fn prefer_ipv6(candidates: impl IntoIterator<Item = SocketAddr>) -> Vec<SocketAddr> {
    let mut ordered: Vec<SocketAddr> = candidates.into_iter().collect();
    ordered.sort_by_key(|addr| addr.is_ipv4());
    ordered
}

/// Tries `attempt` against each candidate, IPv6 first, until one succeeds.
///
/// Attempts run strictly one after another. The first success wins; if all
/// fail the last error is returned.
pub async fn order_and_try<T, F, Fut>(
    host: &str,
    candidates: impl IntoIterator<Item = SocketAddr>,
    mut attempt: F,
) -> Result<T, DialError>
where
    F: FnMut(SocketAddr) -> Fut,
    Fut: Future<Output = io::Result<T>>,
{
    let ordered = prefer_ipv6(candidates);
    let tried = ordered.len();

    let mut last = None;
    for addr in ordered {
        match attempt(addr).await {
            Ok(conn) => return Ok(conn),
            Err(e) => {
                debug!(%addr, error = %e, "backend dial attempt failed");
                last = Some(e);
            }
        }
    }

    match last {
        Some(last) => Err(DialError::AllFailed {
            host: host.to_string(),
            tried,
            last,
        }),
        None => Err(DialError::NoAddresses {
            host: host.to_string(),
        }),
    }
}

/// Connects one address with a deadline.
async fn connect_with_timeout(addr: SocketAddr, timeout: Duration) -> io::Result<TcpStream> {
    match tokio::time::timeout(timeout, TcpStream::connect(addr)).await {
        Ok(result) => result,
        Err(_) => Err(io::Error::new(
            io::ErrorKind::TimedOut,
            format!("connect to {addr} timed out after {}s", timeout.as_secs()),
        )),
    }
}

/// A `hyper-util` connector that dials the backend with [`order_and_try`].
#[derive(Debug, Clone)]
pub struct DualStackConnector {
    attempt_timeout: Duration,
}

impl DualStackConnector {
    /// Creates a connector bounding each connection attempt by `attempt_timeout`.
    #[must_use]
    pub fn new(attempt_timeout: Duration) -> Self {
        Self { attempt_timeout }
    }
}

impl Service<Uri> for DualStackConnector {
    type Response = TokioIo<TcpStream>;
    type Error = DialError;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, uri: Uri) -> Self::Future {
        let timeout = self.attempt_timeout;
        Box::pin(async move {
            let host = uri
                .host()
                .ok_or_else(|| DialError::MissingHost {
                    uri: uri.to_string(),
                })?
                .trim_start_matches('[')
                .trim_end_matches(']')
                .to_string();
            let port = uri.port_u16().unwrap_or(80);

            let candidates = lookup_host((host.as_str(), port))
                .await
                .map_err(|source| DialError::Resolve {
                    host: host.clone(),
                    source,
                })?;

            let stream = order_and_try(&host, candidates, |addr| {
                connect_with_timeout(addr, timeout)
            })
            .await?;
            if let Err(e) = stream.set_nodelay(true) {
                debug!(host = %host, error = %e, "failed to set TCP_NODELAY on backend connection");
            }

            Ok(TokioIo::new(stream))
        })
    }
}
