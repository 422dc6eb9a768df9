//! Configuration schema definitions.
//!
//! These are the validated, immutable shapes produced by
//! [`validation::validate`](crate::config::validation::validate). Nothing in
//! here is read from the environment directly.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

/// Port the upstream API process always listens on.
pub const API_PORT: u16 = 2121;

/// Path prefix owned by the upstream API.
pub const API_PREFIX: &str = "/api/v1";

/// Root configuration for the gateway.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Upstream API the `/api/v1` prefix is proxied to.
    pub upstream: UpstreamConfig,

    /// Compiled client bundle mount.
    pub bundle: BundleConfig,

    /// Directory served at the HTTP root.
    pub public_dir: PathBuf,

    /// Runtime mode, gates production-only routes.
    pub mode: Mode,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListenerConfig {
    /// Interface to bind.
    pub host: IpAddr,

    /// Port to bind. Zero asks the OS for an ephemeral port.
    pub port: u16,
}

impl ListenerConfig {
    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            host: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: 0,
        }
    }
}

/// Upstream API location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpstreamConfig {
    /// Upstream host name or address.
    pub host: String,

    /// Upstream port.
    pub port: u16,

    /// Path prefix requests are mounted under, both locally and upstream.
    pub base_path: String,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: API_PORT,
            base_path: API_PREFIX.to_string(),
        }
    }
}

/// Client bundle static root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BundleConfig {
    /// HTTP path the bundle is mounted at (e.g. `/client`).
    pub http_path: String,

    /// Directory holding the compiled client files.
    pub client_dir: PathBuf,

    /// Cache lifetime advertised for bundle files.
    pub cache_max_age: Duration,
}

impl BundleConfig {
    /// Location of the service worker script inside the bundle.
    pub fn service_worker_path(&self) -> PathBuf {
        self.client_dir.join("sw.js")
    }

    /// Location of the webpack asset manifest inside the bundle.
    pub fn manifest_path(&self) -> PathBuf {
        self.client_dir.join("assets.json")
    }
}

/// Runtime mode, the `NODE_ENV` equivalent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    Production,
    #[default]
    Development,
    Test,
}

impl Mode {
    pub fn is_production(self) -> bool {
        matches!(self, Mode::Production)
    }
}

impl std::str::FromStr for Mode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "production" => Ok(Mode::Production),
            "development" => Ok(Mode::Development),
            "test" => Ok(Mode::Test),
            other => Err(format!(
                "expected production, development or test, got {other:?}"
            )),
        }
    }
}

impl std::fmt::Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Mode::Production => "production",
            Mode::Development => "development",
            Mode::Test => "test",
        };
        f.write_str(name)
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ObservabilityConfig {
    /// Prometheus exporter bind address. Disabled when absent.
    pub metrics_address: Option<SocketAddr>,
}
