//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create the Axum Router: API proxy routes plus the pipeline fallback
//! - Wire up middleware in a fixed order
//! - Serve on a bound listener until the shutdown future resolves
//!
//! # Middleware order (outermost first)
//! ```text
//! trace → metrics → compression → nonce → cookies → hardening
//!       → parameter pollution → panic catcher → route
//! ```

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::{body::Body, middleware, routing::any, Router};
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};
use tokio::net::TcpListener;
use tower_http::{catch_panic::CatchPanicLayer, compression::CompressionLayer, trace::TraceLayer};

use crate::config::ServerConfig;
use crate::http::pipeline::{self, Pipeline};
use crate::http::proxy::{self, ProxyError, ProxyTarget};
use crate::http::request::{attach_nonce, parse_cookies};
use crate::http::response::handle_panic;
use crate::http::ssr::Renderer;
use crate::observability::metrics;
use crate::security::{guard_parameter_pollution, harden_response};

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ServerConfig>,
    pub client: Client<HttpConnector, Body>,
    pub pipeline: Arc<Pipeline>,
    pub target: Arc<ProxyTarget>,
}

/// HTTP server for the gateway.
pub struct HttpServer {
    router: Router,
    config: Arc<ServerConfig>,
}

impl HttpServer {
    /// Create a new HTTP server with the given configuration.
    pub fn new(config: ServerConfig, renderer: Arc<dyn Renderer>) -> Result<Self, ProxyError> {
        let config = Arc::new(config);
        let target = Arc::new(ProxyTarget::from_config(&config.upstream)?);
        let pipeline = Arc::new(Pipeline::from_config(&config, renderer));

        let client = Client::builder(TokioExecutor::new()).build(HttpConnector::new());

        tracing::info!(
            upstream = %target.authority(),
            mount = target.mount(),
            mode = %config.mode,
            "HTTP server configured"
        );

        let state = AppState {
            config: config.clone(),
            client,
            pipeline,
            target,
        };

        Ok(Self {
            router: Self::build_router(state),
            config,
        })
    }

    /// Build the Axum router with all middleware layers.
    fn build_router(state: AppState) -> Router {
        let mount = state.target.mount().to_string();

        Router::new()
            .route(&mount, any(proxy::proxy_handler))
            .route(&format!("{mount}/"), any(proxy::proxy_handler))
            .route(&format!("{mount}/{{*rest}}"), any(proxy::proxy_handler))
            .fallback(pipeline::dispatch)
            .with_state(state)
            .layer(CatchPanicLayer::custom(handle_panic))
            .layer(middleware::from_fn(guard_parameter_pollution))
            .layer(middleware::from_fn(harden_response))
            .layer(middleware::from_fn(parse_cookies))
            .layer(middleware::from_fn(attach_nonce))
            .layer(CompressionLayer::new())
            .layer(middleware::from_fn(metrics::track))
            .layer(TraceLayer::new_for_http())
    }

    /// The fully layered router, for driving requests without a socket.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Run the server, accepting connections on the given listener.
    pub async fn run<F>(self, listener: TcpListener, shutdown: F) -> Result<(), std::io::Error>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown)
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }
}
