//! Header manipulation and security headers.
//!
//! # Responsibilities
//! - Add hardening headers to every response (frame deny, nosniff,
//!   IE no-open, XSS filter)
//! - Grant service-worker scope at the root path
//! - Echo the peer address in X-Forwarded-For
//! - Remove headers that fingerprint the server implementation
//! - Strip hop-by-hop headers from forwarded messages
//!
//! # Design Decisions
//! - Headers are applied after the inner service returns, so 404, 500 and
//!   proxied responses are covered alike
//! - Values are fixed at compile time

use std::net::IpAddr;

use axum::{
    extract::Request,
    http::{header, HeaderMap, HeaderName, HeaderValue},
    middleware::Next,
    response::Response,
};

use crate::http::request::RequestContextExt;

pub static X_DOWNLOAD_OPTIONS: HeaderName = HeaderName::from_static("x-download-options");
pub static SERVICE_WORKER_ALLOWED: HeaderName = HeaderName::from_static("service-worker-allowed");
pub static X_FORWARDED_FOR: HeaderName = HeaderName::from_static("x-forwarded-for");
pub static X_POWERED_BY: HeaderName = HeaderName::from_static("x-powered-by");

static XFO: HeaderValue = HeaderValue::from_static("DENY");
static XCTO: HeaderValue = HeaderValue::from_static("nosniff");
static XDO: HeaderValue = HeaderValue::from_static("noopen");
static XXP: HeaderValue = HeaderValue::from_static("1; mode=block");
static SW_SCOPE: HeaderValue = HeaderValue::from_static("/");

/// Connection-scoped headers that must not be forwarded.
const HOP_BY_HOP: [HeaderName; 8] = [
    header::CONNECTION,
    HeaderName::from_static("keep-alive"),
    header::PROXY_AUTHENTICATE,
    header::PROXY_AUTHORIZATION,
    header::TE,
    header::TRAILER,
    header::TRANSFER_ENCODING,
    header::UPGRADE,
];

/// Middleware applying [`apply_security_headers`] to every response.
pub async fn harden_response(request: Request, next: Next) -> Response {
    let client_ip = request.client_ip();
    let mut response = next.run(request).await;
    apply_security_headers(response.headers_mut(), client_ip);
    response
}

/// Set the fixed hardening headers and drop fingerprinting headers.
pub fn apply_security_headers(headers: &mut HeaderMap, client_ip: Option<IpAddr>) {
    headers.insert(SERVICE_WORKER_ALLOWED.clone(), SW_SCOPE.clone());
    if let Some(ip) = client_ip {
        if let Ok(value) = HeaderValue::from_str(&ip.to_string()) {
            headers.insert(X_FORWARDED_FOR.clone(), value);
        }
    }

    headers.remove(&X_POWERED_BY);
    headers.remove(header::SERVER);

    headers.insert(header::X_XSS_PROTECTION, XXP.clone());
    headers.insert(header::X_FRAME_OPTIONS, XFO.clone());
    headers.insert(X_DOWNLOAD_OPTIONS.clone(), XDO.clone());
    headers.insert(header::X_CONTENT_TYPE_OPTIONS, XCTO.clone());
}

/// Remove hop-by-hop headers, including any listed in `Connection`.
pub fn strip_hop_by_hop(headers: &mut HeaderMap) {
    let listed: Vec<HeaderName> = headers
        .get_all(header::CONNECTION)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .filter_map(|name| HeaderName::from_bytes(name.trim().as_bytes()).ok())
        .collect();

    for name in listed.iter().chain(HOP_BY_HOP.iter()) {
        headers.remove(name);
    }
}
