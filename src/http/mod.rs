//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, middleware stack)
//!     → request.rs (nonce, cookies, peer address)
//!     → proxy.rs (for /api/v1, forwarded upstream)
//!     → pipeline.rs (everything else)
//!         → static_files.rs (bundle, public, service worker)
//!         → ssr.rs (HTML document for GET/HEAD)
//!     → response.rs (404 / 500 terminal responders)
//!     → Send to client
//! ```

pub mod pipeline;
pub mod proxy;
pub mod request;
pub mod response;
pub mod server;
pub mod ssr;
pub mod static_files;

pub use pipeline::{Pipeline, Stage};
pub use proxy::{ProxyError, ProxyTarget, TransportError, TransportErrorKind};
pub use request::{Nonce, RequestContextExt, RequestCookies};
pub use response::{AppError, HandledBy};
pub use server::{AppState, HttpServer};
pub use ssr::{RenderError, RenderRequest, RenderedPage, Renderer, ShellRenderer};
