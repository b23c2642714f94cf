//! Session configuration.

use std::{fmt, path::PathBuf, time::Duration};

/// Opaque location of the protocol service's persisted state.
///
/// Never interpreted by the orchestrator: it is handed to
/// [`crate::Connector::open`] as-is.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StorageLocation(PathBuf);

impl StorageLocation {
    /// Wrap a path.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self(path.into())
    }

    /// Underlying path.
    pub fn as_path(&self) -> &std::path::Path {
        &self.0
    }
}

impl fmt::Display for StorageLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.display())
    }
}

impl From<PathBuf> for StorageLocation {
    fn from(path: PathBuf) -> Self {
        Self(path)
    }
}

impl From<&str> for StorageLocation {
    fn from(path: &str) -> Self {
        Self::new(path)
    }
}

/// Session configuration.
///
/// Both limits default to `None`: waits block until the awaited event, an
/// error, or cancellation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionConfig {
    /// Upper bound on the wait for a group to become ready.
    pub readiness_timeout: Option<Duration>,
    /// Upper bound on the wait for an incoming contact request or message.
    pub receive_timeout: Option<Duration>,
}

impl SessionConfig {
    /// Set the readiness limit.
    #[must_use]
    pub fn with_readiness_timeout(mut self, limit: Duration) -> Self {
        self.readiness_timeout = Some(limit);
        self
    }

    /// Set the receive limit.
    #[must_use]
    pub fn with_receive_timeout(mut self, limit: Duration) -> Self {
        self.receive_timeout = Some(limit);
        self
    }
}
