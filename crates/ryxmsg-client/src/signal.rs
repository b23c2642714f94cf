//! Process signal handling.
//!
//! Interactive front ends put the terminal in raw mode, so an interrupt or
//! termination must end in an orderly close rather than a dead process.
//! [`watch_signals`] turns the first SIGINT or SIGTERM into a session
//! shutdown.

use std::io;

use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::session::ShutdownHandle;

/// Signal that requested shutdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    /// SIGINT or Ctrl-C.
    Interrupt,
    /// SIGTERM.
    Terminate,
}

/// Failure to install a signal handler.
#[derive(Debug, Error)]
#[error("cannot listen for {signal}: {source}")]
pub struct SignalError {
    signal: &'static str,
    #[source]
    source: io::Error,
}

/// Resolve on the first interrupt or termination signal.
pub async fn shutdown_signal() -> Result<Signal, SignalError> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        let mut terminate = signal(SignalKind::terminate())
            .map_err(|source| SignalError { signal: "SIGTERM", source })?;
        tokio::select! {
            result = tokio::signal::ctrl_c() => {
                result.map_err(|source| SignalError { signal: "SIGINT", source })?;
                Ok(Signal::Interrupt)
            },
            _ = terminate.recv() => Ok(Signal::Terminate),
        }
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await.map_err(|source| SignalError { signal: "Ctrl-C", source })?;
        Ok(Signal::Interrupt)
    }
}

/// Shut the session down on the first signal.
///
/// The returned task ends after the signal or as soon as the session is shut
/// down some other way.
pub fn watch_signals(handle: ShutdownHandle) -> JoinHandle<Option<Signal>> {
    tokio::spawn(async move {
        tokio::select! {
            () = handle.wait() => None,
            received = shutdown_signal() => match received {
                Ok(signal) => {
                    info!(?signal, "signal received, shutting down");
                    handle.shutdown();
                    Some(signal)
                },
                Err(e) => {
                    warn!(error = %e, "signal handling unavailable");
                    None
                },
            },
        }
    })
}
