//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request:
//!     → headers.rs (remember peer address, harden the eventual response)
//!     → hpp.rs (collapse repeated query parameters)
//!     → Pass to routing
//! ```
//!
//! # Design Decisions
//! - Hardening applies to every response, including errors
//! - No security step can fail a request

pub mod headers;
pub mod hpp;

pub use headers::{apply_security_headers, harden_response, strip_hop_by_hop};
pub use hpp::{guard_parameter_pollution, PollutedQuery};
