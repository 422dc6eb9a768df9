//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logging.rs (structured log events)
//!     → metrics.rs (request counters, latency histograms, proxy errors)
//!
//! Consumers:
//!     → stdout (JSON in production, human-readable otherwise)
//!     → Metrics endpoint (Prometheus scrape, when configured)
//! ```
//!
//! # Design Decisions
//! - Structured logging (JSON) for machine parsing
//! - Metrics are cheap: without an installed exporter every update is a no-op
//! - The stage that answered a request is a metric label

pub mod logging;
pub mod metrics;

pub use logging::LogFormat;
