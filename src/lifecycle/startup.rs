//! Startup orchestration.
//!
//! # Responsibilities
//! - Resolve the proxy target and pipeline from a validated config
//! - Bind the listener and begin accepting traffic
//! - Hand back a [`ServerHandle`] for the caller to stop and join
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal and nothing is left running
//! - The listener binds last, after every fallible step has succeeded

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;

use thiserror::Error;
use tokio::task::{JoinError, JoinHandle};

use crate::config::ServerConfig;
use crate::http::proxy::ProxyError;
use crate::http::ssr::Renderer;
use crate::http::HttpServer;
use crate::lifecycle::Shutdown;
use crate::net::{self, ListenerError};

/// Errors raised while starting or running the server.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error(transparent)]
    Listener(#[from] ListenerError),

    #[error(transparent)]
    Proxy(#[from] ProxyError),

    #[error("server error: {0}")]
    Serve(#[from] io::Error),

    #[error("server task failed: {0}")]
    Join(#[from] JoinError),
}

/// A running server.
///
/// Dropping the handle without calling [`ServerHandle::wait`] also stops the
/// server, since the shutdown coordinator goes with it.
#[derive(Debug)]
pub struct ServerHandle {
    local_addr: SocketAddr,
    shutdown: Shutdown,
    task: JoinHandle<Result<(), io::Error>>,
}

impl ServerHandle {
    /// Address the listener is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Stop accepting connections and let in-flight requests finish.
    pub fn shutdown(&self) {
        tracing::info!(address = %self.local_addr, "Graceful shutdown requested");
        self.shutdown.trigger();
    }

    /// Wait for the server task to finish.
    pub async fn wait(self) -> Result<(), StartupError> {
        let Self { shutdown, task, .. } = self;
        let result = task.await;
        drop(shutdown);
        result??;
        Ok(())
    }

    /// Shut down and wait.
    pub async fn close(self) -> Result<(), StartupError> {
        self.shutdown();
        self.wait().await
    }
}

/// Build the server for `config`, bind, and start serving in the background.
pub async fn launch(
    config: ServerConfig,
    renderer: Arc<dyn Renderer>,
) -> Result<ServerHandle, StartupError> {
    let listener_config = config.listener.clone();
    let server = HttpServer::new(config, renderer)?;

    let listener = net::bind(&listener_config).await?;
    let local_addr = listener.local_addr()?;

    let shutdown = Shutdown::new();
    let task = tokio::spawn(server.run(listener, shutdown.signalled()));

    tracing::info!(address = %local_addr, port = local_addr.port(), "Server listening");
    Ok(ServerHandle {
        local_addr,
        shutdown,
        task,
    })
}
