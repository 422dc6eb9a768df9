//! TCP listener binding.
//!
//! # Responsibilities
//! - Bind to the configured interface and port
//! - Report the bound address, which differs from the configured one when
//!   port 0 asks for an ephemeral port

use std::io;
use std::net::SocketAddr;

use thiserror::Error;
use tokio::net::TcpListener;

use crate::config::ListenerConfig;

/// Error type for listener operations.
#[derive(Debug, Error)]
pub enum ListenerError {
    /// Failed to bind to address.
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },

    /// Bound, but the socket could not report its address.
    #[error("failed to read local address: {0}")]
    LocalAddr(#[source] io::Error),
}

/// Bind a listener for `config`.
pub async fn bind(config: &ListenerConfig) -> Result<TcpListener, ListenerError> {
    let addr = config.socket_addr();
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|source| ListenerError::Bind { addr, source })?;

    let local_addr = listener.local_addr().map_err(ListenerError::LocalAddr)?;
    tracing::info!(
        address = %local_addr,
        port = local_addr.port(),
        "Listener bound"
    );

    Ok(listener)
}
