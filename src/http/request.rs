//! Per-request context attached by middleware.
//!
//! # Responsibilities
//! - Generate the request nonce (UUID v4) before any routing decision
//! - Parse the `Cookie` header once for downstream renderers
//! - Resolve the peer address used for forwarding headers
//!
//! # Design Decisions
//! - Context lives in request extensions, so it dies with the request
//! - Nonces are never reused or shared between requests

use std::collections::BTreeMap;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use axum::{
    extract::{ConnectInfo, Request},
    http::{header, request::Parts, Extensions},
    middleware::Next,
    response::Response,
};
use cookie::Cookie;
use uuid::Uuid;

/// Per-request random token for inline scripts under a content security policy.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Nonce(Arc<str>);

impl Nonce {
    /// Generate a fresh nonce.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string().into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Nonce {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Extension trait for reading the per-request context.
pub trait RequestContextExt {
    fn context(&self) -> &Extensions;

    fn nonce(&self) -> Option<&Nonce> {
        self.context().get::<Nonce>()
    }

    fn client_ip(&self) -> Option<IpAddr> {
        self.context()
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip())
    }

    fn cookies(&self) -> Option<&RequestCookies> {
        self.context().get::<RequestCookies>()
    }
}

impl<B> RequestContextExt for axum::http::Request<B> {
    fn context(&self) -> &Extensions {
        self.extensions()
    }
}

impl RequestContextExt for Parts {
    fn context(&self) -> &Extensions {
        &self.extensions
    }
}

/// Attach a fresh [`Nonce`] to every request.
pub async fn attach_nonce(mut request: Request, next: Next) -> Response {
    let nonce = Nonce::generate();
    tracing::trace!(nonce = %nonce, "Nonce attached");
    request.extensions_mut().insert(nonce);
    next.run(request).await
}

/// Cookies sent with the request, by name. Later duplicates win.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestCookies(BTreeMap<String, String>);

impl RequestCookies {
    /// Parse every `Cookie` header value. Malformed pairs are skipped.
    pub fn from_headers(headers: &axum::http::HeaderMap) -> Self {
        let mut cookies = BTreeMap::new();
        for value in headers.get_all(header::COOKIE) {
            let Ok(value) = value.to_str() else {
                continue;
            };
            for cookie in Cookie::split_parse_encoded(value).flatten() {
                cookies.insert(cookie.name().to_string(), cookie.value().to_string());
            }
        }
        Self(cookies)
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

/// Parse request cookies into a [`RequestCookies`] extension.
pub async fn parse_cookies(mut request: Request, next: Next) -> Response {
    let cookies = RequestCookies::from_headers(request.headers());
    request.extensions_mut().insert(cookies);
    next.run(request).await
}
