//! Metrics collection and exposition.
//!
//! # Responsibilities
//! - Count requests and time them, labelled by the stage that answered
//! - Count proxy failures by transport error kind
//! - Expose a Prometheus-compatible scrape endpoint when configured
//!
//! # Metrics
//! - `ssr_requests_total` (counter): requests by method, status, stage
//! - `ssr_request_duration_seconds` (histogram): latency distribution
//! - `ssr_proxy_errors_total` (counter): proxy failures by kind
//!
//! # Design Decisions
//! - The exporter is optional; recording without one is a no-op
//! - Histogram buckets tuned for typical web latencies

use std::net::SocketAddr;
use std::time::Instant;

use axum::{extract::Request, middleware::Next, response::Response};
use metrics_exporter_prometheus::{BuildError, Matcher, PrometheusBuilder};

use crate::http::response::HandledBy;

pub const REQUESTS_TOTAL: &str = "ssr_requests_total";
pub const REQUEST_DURATION: &str = "ssr_request_duration_seconds";
pub const PROXY_ERRORS_TOTAL: &str = "ssr_proxy_errors_total";

const LATENCY_BUCKETS: &[f64] = &[
    0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
];

/// Install the Prometheus recorder and its HTTP scrape listener.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .set_buckets_for_metric(Matcher::Full(REQUEST_DURATION.to_string()), LATENCY_BUCKETS)?
        .install()?;
    tracing::info!(address = %addr, "Metrics endpoint listening");
    Ok(())
}

/// Record one finished request.
pub fn record_request(method: &str, status: u16, stage: &'static str, start: Instant) {
    let labels = [
        ("method", method.to_string()),
        ("status", status.to_string()),
        ("stage", stage.to_string()),
    ];
    metrics::counter!(REQUESTS_TOTAL, &labels).increment(1);
    metrics::histogram!(REQUEST_DURATION, &labels).record(start.elapsed().as_secs_f64());
}

/// Record a proxy failure of the given kind.
pub fn record_proxy_error(kind: &'static str) {
    metrics::counter!(PROXY_ERRORS_TOTAL, "kind" => kind).increment(1);
}

/// Middleware timing every request.
///
/// Responses without a [`HandledBy`] tag were produced by the framework
/// itself (e.g. a caught panic) and are labelled `other`.
pub async fn track(request: Request, next: Next) -> Response {
    let start = Instant::now();
    let method = request.method().clone();
    let response = next.run(request).await;

    let stage = response
        .extensions()
        .get::<HandledBy>()
        .map(|h| h.0)
        .unwrap_or("other");
    record_request(method.as_str(), response.status().as_u16(), stage, start);
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body::Body, http::StatusCode, middleware, routing::get, Router};
    use tower::ServiceExt;

    #[tokio::test]
    async fn track_passes_response_through() {
        let app = Router::new()
            .route("/", get(|| async { "ok" }))
            .layer(middleware::from_fn(track));

        let request = axum::http::Request::builder().uri("/").body(Body::empty()).unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[test]
    fn recording_without_exporter_is_noop() {
        record_request("GET", 200, "ssr", Instant::now());
        record_proxy_error("refused");
    }
}
