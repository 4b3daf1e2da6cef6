//! Probe transport.
//!
//! A probe is a single minimal-cost liveness check against a target. The
//! [`Probe`] trait is the seam the poller drives; [`HttpProbe`] is the
//! production implementation that sends an HTTP `HEAD` over a fresh
//! TCP (or TLS) connection per attempt.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use http::header::{HOST, USER_AGENT};
use http::{Method, Request, StatusCode, Uri};
use http_body_util::Empty;
use hyper_util::rt::TokioIo;
use rustls::pki_types::ServerName;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio::task::JoinHandle;
use tokio_rustls::TlsConnector;
use tracing::debug;

use vigil_core::{HumanDuration, ProbeSettings};

/// Why a single probe failed.
#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("invalid target {target:?}: {reason}")]
    InvalidTarget { target: String, reason: String },

    #[error("unsupported protocol scheme {0:?}")]
    UnsupportedScheme(String),

    #[error("build request: {0}")]
    InvalidRequest(#[source] http::Error),

    #[error("connect to {address}: {source}")]
    Connect {
        address: String,
        #[source]
        source: std::io::Error,
    },

    #[error("tls: {0}")]
    Tls(String),

    #[error("http handshake: {0}")]
    Handshake(#[source] hyper::Error),

    #[error("http request: {0}")]
    Request(#[source] hyper::Error),

    #[error("unexpected status {0}")]
    Status(StatusCode),

    #[error("no response within {0}")]
    TimedOut(HumanDuration),
}

/// A single liveness check against an opaque target.
///
/// Implementations own the interpretation of `target`; the poller passes
/// it through untouched.
pub trait Probe: Send + Sync {
    fn probe(&self, target: &str) -> impl Future<Output = Result<(), ProbeError>> + Send;
}

impl<P: Probe> Probe for Arc<P> {
    fn probe(&self, target: &str) -> impl Future<Output = Result<(), ProbeError>> + Send {
        (**self).probe(target)
    }
}

/// Where an HTTP probe connects and what it asks for.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Endpoint {
    tls: bool,
    /// Host as written in the URL (IPv6 literals keep their brackets).
    raw_host: String,
    /// Host for DNS/TCP and the TLS server name, brackets stripped.
    host: String,
    port: u16,
    /// `Host` header value.
    authority: String,
    /// Origin-form request target.
    path: String,
}

impl Endpoint {
    fn parse(target: &str) -> Result<Self, ProbeError> {
        let invalid = |reason: String| ProbeError::InvalidTarget {
            target: target.to_string(),
            reason,
        };

        let uri: Uri = target
            .parse()
            .map_err(|e: http::uri::InvalidUri| invalid(e.to_string()))?;

        let tls = match uri.scheme_str() {
            Some("http") => false,
            Some("https") => true,
            Some(other) => return Err(ProbeError::UnsupportedScheme(other.to_string())),
            None => return Err(ProbeError::UnsupportedScheme(String::new())),
        };

        let raw_host = uri
            .host()
            .filter(|h| !h.is_empty())
            .ok_or_else(|| invalid("missing host".to_string()))?;
        let host = raw_host.trim_start_matches('[').trim_end_matches(']');
        let port = uri.port_u16().unwrap_or(if tls { 443 } else { 80 });

        let authority = match uri.port_u16() {
            Some(p) => format!("{raw_host}:{p}"),
            None => raw_host.to_string(),
        };
        let path = uri
            .path_and_query()
            .map(|pq| pq.as_str())
            .filter(|pq| !pq.is_empty())
            .unwrap_or("/");

        Ok(Self {
            tls,
            raw_host: raw_host.to_string(),
            host: host.to_string(),
            port,
            authority,
            path: path.to_string(),
        })
    }

    fn address(&self) -> String {
        format!("{}:{}", self.raw_host, self.port)
    }
}

/// Aborts the wrapped task when dropped, so a probe's connection never
/// outlives its attempt (including when the attempt itself is cancelled).
struct AbortOnDrop(JoinHandle<()>);

impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        self.0.abort();
    }
}

/// HTTP `HEAD` probe.
///
/// Every call opens its own connection and tears it down before
/// returning, whatever the outcome.
#[derive(Clone)]
pub struct HttpProbe {
    attempt_timeout: Duration,
    fail_on_error_status: bool,
    user_agent: String,
    tls: TlsConnector,
}

impl std::fmt::Debug for HttpProbe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpProbe")
            .field("attempt_timeout", &self.attempt_timeout)
            .field("fail_on_error_status", &self.fail_on_error_status)
            .field("user_agent", &self.user_agent)
            .finish_non_exhaustive()
    }
}

impl HttpProbe {
    /// Build a probe from resolved settings, trusting the Mozilla root store
    /// for `https` targets.
    pub fn new(settings: &ProbeSettings) -> Result<Self, ProbeError> {
        let mut roots = rustls::RootCertStore::empty();
        roots.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());

        let config = rustls::ClientConfig::builder_with_provider(
            rustls::crypto::ring::default_provider().into(),
        )
        .with_safe_default_protocol_versions()
        .map_err(|e| ProbeError::Tls(format!("protocol versions: {e}")))?
        .with_root_certificates(roots)
        .with_no_client_auth();

        Ok(Self::with_tls_config(settings, Arc::new(config)))
    }

    /// Build a probe with a caller-supplied TLS client configuration.
    pub fn with_tls_config(settings: &ProbeSettings, tls: Arc<rustls::ClientConfig>) -> Self {
        Self {
            attempt_timeout: settings.attempt_timeout,
            fail_on_error_status: settings.fail_on_error_status,
            user_agent: settings.user_agent.clone(),
            tls: TlsConnector::from(tls),
        }
    }

    /// The `HEAD` request sent for `endpoint`.
    fn request(&self, endpoint: &Endpoint) -> Result<Request<Empty<Bytes>>, ProbeError> {
        Request::builder()
            .method(Method::HEAD)
            .uri(endpoint.path.as_str())
            .header(HOST, endpoint.authority.as_str())
            .header(USER_AGENT, self.user_agent.as_str())
            .body(Empty::<Bytes>::new())
            .map_err(ProbeError::InvalidRequest)
    }

    async fn head(&self, endpoint: &Endpoint, req: Request<Empty<Bytes>>) -> Result<(), ProbeError> {
        let address = endpoint.address();
        let stream = TcpStream::connect((endpoint.host.as_str(), endpoint.port))
            .await
            .map_err(|source| ProbeError::Connect {
                address: address.clone(),
                source,
            })?;
        if let Err(e) = stream.set_nodelay(true) {
            debug!(%address, error = %e, "failed to set TCP_NODELAY on probe connection");
        }

        debug!(%address, tls = endpoint.tls, "probe connected");

        if endpoint.tls {
            let server_name = ServerName::try_from(endpoint.host.clone())
                .map_err(|e| ProbeError::Tls(format!("invalid server name {:?}: {e}", endpoint.host)))?;
            let stream = self
                .tls
                .connect(server_name, stream)
                .await
                .map_err(|e| ProbeError::Tls(e.to_string()))?;
            self.exchange(endpoint, req, stream).await
        } else {
            self.exchange(endpoint, req, stream).await
        }
    }

    /// HTTP/1.1 handshake plus one `HEAD` round trip over `stream`.
    async fn exchange<S>(
        &self,
        endpoint: &Endpoint,
        req: Request<Empty<Bytes>>,
        stream: S,
    ) -> Result<(), ProbeError>
    where
        S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        let io = TokioIo::new(stream);
        let (mut sender, conn) = hyper::client::conn::http1::handshake(io)
            .await
            .map_err(ProbeError::Handshake)?;

        // Drive the connection in the background.
        let driver = AbortOnDrop(tokio::spawn(async move {
            if let Err(e) = conn.await {
                debug!(error = %e, "probe connection ended with error");
            }
        }));

        let result = self.send_head(&mut sender, endpoint, req).await;

        drop(sender);
        drop(driver);

        result
    }

    async fn send_head(
        &self,
        sender: &mut hyper::client::conn::http1::SendRequest<Empty<Bytes>>,
        endpoint: &Endpoint,
        req: Request<Empty<Bytes>>,
    ) -> Result<(), ProbeError> {
        let resp = sender.send_request(req).await.map_err(ProbeError::Request)?;
        let status = resp.status();

        if self.fail_on_error_status && (status.is_client_error() || status.is_server_error()) {
            debug!(%status, path = %endpoint.path, "probe got error status");
            return Err(ProbeError::Status(status));
        }

        debug!(%status, path = %endpoint.path, "probe got response");
        Ok(())
    }
}

impl Probe for HttpProbe {
    async fn probe(&self, target: &str) -> Result<(), ProbeError> {
        let endpoint = Endpoint::parse(target)?;
        let req = self.request(&endpoint)?;

        match tokio::time::timeout(self.attempt_timeout, self.head(&endpoint, req)).await {
            Ok(result) => result,
            Err(_) => {
                debug!(%target, "probe timed out");
                Err(ProbeError::TimedOut(HumanDuration(self.attempt_timeout)))
            }
        }
    }
}
