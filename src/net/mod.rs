//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! ListenerConfig
//!     → listener.rs (bind, report bound address)
//!     → Hand off to the HTTP layer (axum::serve)
//! ```

pub mod listener;

pub use listener::{bind, ListenerError};
