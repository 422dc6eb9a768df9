//! OS signal handling.
//!
//! # Responsibilities
//! - Wait for SIGINT (Ctrl+C) or, on Unix, SIGTERM
//! - Report which signal arrived
//!
//! # Design Decisions
//! - Uses Tokio's signal handling (async-safe)
//! - The first signal starts a graceful shutdown; nothing reloads

use std::io;

/// Block until a termination signal arrives. Returns the signal name.
pub async fn wait_for_signal() -> io::Result<&'static str> {
    #[cfg(unix)]
    let name = {
        use tokio::signal::unix::{signal, SignalKind};

        let mut terminate = signal(SignalKind::terminate())?;
        tokio::select! {
            result = tokio::signal::ctrl_c() => {
                result?;
                "SIGINT"
            }
            _ = terminate.recv() => "SIGTERM",
        }
    };

    #[cfg(not(unix))]
    let name = {
        tokio::signal::ctrl_c().await?;
        "ctrl-c"
    };

    tracing::info!(signal = name, "Shutdown signal received");
    Ok(name)
}
