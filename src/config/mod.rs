//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! optional TOML file (--config / SSR_CONFIG)
//!     → loader.rs (RawSettings, base layer)
//! process environment
//!     → loader.rs (RawSettings, wins over file)
//!     → validation.rs (required keys, parsing, path resolution)
//!     → ServerConfig (validated, immutable)
//!     → shared via Arc to all subsystems
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; changes require a restart
//! - Every missing or malformed key is reported before startup aborts
//! - Settings are named by their environment variable everywhere

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, ConfigError, RawSettings};
pub use schema::{
    BundleConfig, ListenerConfig, Mode, ObservabilityConfig, ServerConfig, UpstreamConfig,
    API_PORT, API_PREFIX,
};
pub use validation::{validate, ValidationError};
