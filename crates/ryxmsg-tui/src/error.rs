//! Shell errors.

use std::{io, path::PathBuf};

use ryxmsg_core::SessionError;
use thiserror::Error;

use crate::terminal::TerminalError;

/// Errors that end the shell.
#[derive(Debug, Error)]
pub enum TuiError {
    /// The terminal failed.
    #[error(transparent)]
    Terminal(#[from] TerminalError),

    /// A session could not be opened or closed.
    #[error(transparent)]
    Session(#[from] SessionError),

    /// The log file could not be created.
    #[error("cannot create log file {}: {source}", path.display())]
    LogFile {
        /// Requested path.
        path: PathBuf,
        /// Underlying failure.
        #[source]
        source: io::Error,
    },

    /// A global tracing subscriber was already installed.
    #[error("cannot install logger: {0}")]
    Logging(String),

    /// The session worker is gone.
    #[error("session worker stopped")]
    WorkerStopped,

    /// A background task panicked.
    #[error("background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}
