//! API reverse proxy.
//!
//! # Responsibilities
//! - Forward `/api/v1` requests to the single configured upstream
//! - Strip hop-by-hop headers in both directions
//! - Stream request and response bodies without buffering
//! - Translate transport failures into the JSON error envelope
//!
//! # Design Decisions
//! - One attempt per request: no retries, no failover
//! - The upstream receives the query exactly as the client sent it, even
//!   when the pollution guard collapsed it for local handlers
//! - Every API response is labelled `application/json`, whatever the
//!   upstream sent
//! - Connection resets are routine (navigation cancels requests) and are
//!   logged at debug level only

use std::error::Error as StdError;
use std::io;

use axum::{
    body::Body,
    extract::State,
    http::{
        header,
        uri::{Authority, PathAndQuery, Scheme},
        HeaderValue, Request, StatusCode, Uri, Version,
    },
    response::{IntoResponse, Response},
    Json,
};
use futures_util::TryStreamExt;
use serde::Serialize;
use thiserror::Error;

use crate::config::UpstreamConfig;
use crate::http::response::tag;
use crate::http::server::AppState;
use crate::observability::metrics;
use crate::security::headers::strip_hop_by_hop;
use crate::security::PollutedQuery;

/// Stage name reported for proxied responses.
pub const STAGE: &str = "proxy";

static JSON: HeaderValue = HeaderValue::from_static("application/json");

/// Upstream location resolved once at startup.
#[derive(Debug, Clone)]
pub struct ProxyTarget {
    authority: Authority,
    base_path: String,
    mount: String,
}

impl ProxyTarget {
    pub fn from_config(upstream: &UpstreamConfig) -> Result<Self, ProxyError> {
        let authority = Authority::try_from(format!("{}:{}", upstream.host, upstream.port))
            .map_err(|e| ProxyError::InvalidTarget(e.to_string()))?;
        let base_path = upstream.base_path.trim_end_matches('/').to_string();
        Ok(Self {
            authority,
            mount: base_path.clone(),
            base_path,
        })
    }

    pub fn authority(&self) -> &Authority {
        &self.authority
    }

    /// Local path prefix claimed by the proxy.
    pub fn mount(&self) -> &str {
        &self.mount
    }

    /// Upstream URI for an incoming request URI under the mount.
    pub fn upstream_uri(&self, incoming: &Uri) -> Result<Uri, ProxyError> {
        let rest = incoming
            .path()
            .strip_prefix(self.mount.as_str())
            .unwrap_or(incoming.path());
        let mut path = format!("{}{}", self.base_path, rest);
        if path.is_empty() {
            path.push('/');
        }
        if let Some(query) = incoming.query() {
            path.push('?');
            path.push_str(query);
        }

        let path_and_query =
            PathAndQuery::try_from(path).map_err(|e| ProxyError::InvalidTarget(e.to_string()))?;
        Uri::builder()
            .scheme(Scheme::HTTP)
            .authority(self.authority.clone())
            .path_and_query(path_and_query)
            .build()
            .map_err(|e| ProxyError::InvalidTarget(e.to_string()))
    }
}

/// Kind of transport failure, as far as the client should care.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportErrorKind {
    /// The peer reset the connection.
    Reset,
    /// Nothing listens at the upstream address.
    Refused,
    TimedOut,
    Other,
}

impl TransportErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            TransportErrorKind::Reset => "reset",
            TransportErrorKind::Refused => "refused",
            TransportErrorKind::TimedOut => "timed_out",
            TransportErrorKind::Other => "other",
        }
    }

    /// Resets are expected when clients navigate away mid-request.
    pub fn is_expected(self) -> bool {
        matches!(self, TransportErrorKind::Reset)
    }

    fn from_io(kind: io::ErrorKind) -> Self {
        match kind {
            io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::BrokenPipe => TransportErrorKind::Reset,
            io::ErrorKind::ConnectionRefused => TransportErrorKind::Refused,
            io::ErrorKind::TimedOut => TransportErrorKind::TimedOut,
            _ => TransportErrorKind::Other,
        }
    }
}

/// A failed exchange with the upstream.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{message}")]
pub struct TransportError {
    pub kind: TransportErrorKind,
    pub message: String,
}

impl TransportError {
    /// Classify an error by the innermost `io::Error` in its source chain.
    ///
    /// The message is the innermost error's text, which names the actual
    /// socket failure rather than the client wrapper.
    pub fn classify(err: &(dyn StdError + 'static)) -> Self {
        let mut kind = TransportErrorKind::Other;
        let mut innermost: &(dyn StdError + 'static) = err;
        let mut current = Some(err);

        while let Some(e) = current {
            if let Some(io_err) = e.downcast_ref::<io::Error>() {
                kind = TransportErrorKind::from_io(io_err.kind());
            } else if let Some(hyper_err) = e.downcast_ref::<hyper::Error>() {
                if hyper_err.is_timeout() {
                    kind = TransportErrorKind::TimedOut;
                } else if hyper_err.is_incomplete_message() && kind == TransportErrorKind::Other {
                    kind = TransportErrorKind::Reset;
                }
            }
            innermost = e;
            current = e.source();
        }

        Self {
            kind,
            message: innermost.to_string(),
        }
    }

    /// Log at a level matching how alarming the failure is.
    pub fn log(&self, phase: &'static str) {
        if self.kind.is_expected() {
            tracing::debug!(kind = self.kind.as_str(), phase, error = %self.message, "Upstream connection reset");
        } else {
            tracing::error!(kind = self.kind.as_str(), phase, error = %self.message, "Proxy error");
        }
    }
}

/// Proxy failures that end in the JSON error envelope.
#[derive(Debug, Error)]
pub enum ProxyError {
    #[error("invalid upstream target: {0}")]
    InvalidTarget(String),

    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// Body of every proxy failure response.
#[derive(Debug, Serialize)]
pub struct ProxyErrorBody<'a> {
    pub error: &'static str,
    pub reason: &'a str,
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        let reason = match &self {
            ProxyError::InvalidTarget(_) => self.to_string(),
            ProxyError::Transport(e) => e.message.clone(),
        };
        let body = ProxyErrorBody {
            error: "proxy_error",
            reason: &reason,
        };
        tag((StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response(), STAGE)
    }
}

/// Forward one request upstream.
pub async fn forward(state: &AppState, request: Request<Body>) -> Result<Response, ProxyError> {
    let (mut parts, body) = request.into_parts();
    let incoming = PollutedQuery::original_uri(&parts.extensions, &parts.uri);
    parts.uri = state.target.upstream_uri(incoming)?;
    parts.version = Version::HTTP_11;
    strip_hop_by_hop(&mut parts.headers);

    tracing::debug!(method = %parts.method, upstream = %parts.uri, "Proxying request");

    let upstream_request = Request::from_parts(parts, body);
    let response = state.client.request(upstream_request).await.map_err(|e| {
        let err = TransportError::classify(&e);
        err.log("request");
        err
    })?;

    let (mut parts, incoming) = response.into_parts();
    strip_hop_by_hop(&mut parts.headers);
    parts.headers.insert(header::CONTENT_TYPE, JSON.clone());

    let stream = Body::new(incoming).into_data_stream().inspect_err(|e| {
        TransportError::classify(e).log("response_body");
    });
    Ok(tag(Response::from_parts(parts, Body::from_stream(stream)), STAGE))
}

/// Route handler for the API prefix.
pub async fn proxy_handler(State(state): State<AppState>, request: Request<Body>) -> Response {
    match forward(&state, request).await {
        Ok(response) => response,
        Err(err) => {
            let kind = match &err {
                ProxyError::InvalidTarget(_) => "invalid_target",
                ProxyError::Transport(t) => t.kind.as_str(),
            };
            metrics::record_proxy_error(kind);
            err.into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tracing::Level;
    use tracing_subscriber::layer::{Context, Layer, SubscriberExt};

    fn target() -> ProxyTarget {
        ProxyTarget::from_config(&UpstreamConfig {
            host: "localhost".into(),
            port: 2121,
            base_path: "/api/v1".into(),
        })
        .unwrap()
    }

    #[test]
    fn upstream_uri_keeps_path_and_query() {
        let uri = target()
            .upstream_uri(&"/api/v1/posts?limit=5".parse().unwrap())
            .unwrap();
        assert_eq!(uri.to_string(), "http://localhost:2121/api/v1/posts?limit=5");

        let uri = target().upstream_uri(&"/api/v1".parse().unwrap()).unwrap();
        assert_eq!(uri.to_string(), "http://localhost:2121/api/v1");
    }

    #[test]
    fn invalid_host_is_rejected() {
        let result = ProxyTarget::from_config(&UpstreamConfig {
            host: "bad host".into(),
            ..UpstreamConfig::default()
        });
        assert!(matches!(result, Err(ProxyError::InvalidTarget(_))));
    }

    #[derive(Debug, Error)]
    #[error("client error (Connect)")]
    struct Wrapper(#[source] io::Error);

    #[test]
    fn reset_is_expected() {
        let err = Wrapper(io::Error::new(io::ErrorKind::ConnectionReset, "connection reset by peer"));
        let classified = TransportError::classify(&err);
        assert_eq!(classified.kind, TransportErrorKind::Reset);
        assert!(classified.kind.is_expected());
        assert_eq!(classified.message, "connection reset by peer");
    }

    #[test]
    fn refused_is_not_expected() {
        let err = Wrapper(io::Error::new(io::ErrorKind::ConnectionRefused, "Connection refused (os error 111)"));
        let classified = TransportError::classify(&err);
        assert_eq!(classified.kind, TransportErrorKind::Refused);
        assert!(!classified.kind.is_expected());
        assert_eq!(classified.message, "Connection refused (os error 111)");
    }

    #[test]
    fn opaque_errors_are_other() {
        let err = io::Error::other("weird");
        let wrapped: Box<dyn StdError + Send + Sync> = Box::new(err);
        let classified = TransportError::classify(wrapped.as_ref());
        assert_eq!(classified.kind, TransportErrorKind::Other);
    }

    /// Counts events per level.
    #[derive(Clone, Default)]
    struct LevelCounter {
        errors: Arc<AtomicUsize>,
        debugs: Arc<AtomicUsize>,
    }

    impl<S: tracing::Subscriber> Layer<S> for LevelCounter {
        fn on_event(&self, event: &tracing::Event<'_>, _ctx: Context<'_, S>) {
            match *event.metadata().level() {
                Level::ERROR => self.errors.fetch_add(1, Ordering::SeqCst),
                Level::DEBUG => self.debugs.fetch_add(1, Ordering::SeqCst),
                _ => 0,
            };
        }
    }

    fn logged(err: &TransportError) -> (usize, usize) {
        let counter = LevelCounter::default();
        let subscriber = tracing_subscriber::registry().with(counter.clone());
        tracing::subscriber::with_default(subscriber, || err.log("request"));
        (
            counter.errors.load(Ordering::SeqCst),
            counter.debugs.load(Ordering::SeqCst),
        )
    }

    #[test]
    fn reset_never_logs_at_error() {
        let reset = TransportError {
            kind: TransportErrorKind::Reset,
            message: "connection reset by peer".into(),
        };
        assert_eq!(logged(&reset), (0, 1));

        let refused = TransportError {
            kind: TransportErrorKind::Refused,
            message: "Connection refused".into(),
        };
        assert_eq!(logged(&refused), (1, 0));
    }

    #[tokio::test]
    async fn error_envelope_shape() {
        let err = ProxyError::Transport(TransportError {
            kind: TransportErrorKind::Refused,
            message: "Connection refused".into(),
        });
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "application/json");

        let body = axum::body::to_bytes(response.into_body(), 1024).await.unwrap();
        assert_eq!(&body[..], br#"{"error":"proxy_error","reason":"Connection refused"}"#);
    }
}
