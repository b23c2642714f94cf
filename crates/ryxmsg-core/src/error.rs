//! Error types for the messaging orchestrator.
//!
//! [`ServiceError`] is what a [`crate::ProtocolService`] implementation
//! reports. [`SessionError`] is what callers of the orchestrator see: every
//! service failure is wrapped into [`SessionError::Protocol`] together with
//! the step that failed, and surfaced immediately.
//!
//! "Nothing happened" outcomes (no pending contact request, message stream
//! ended) are not errors. They are variants of the result types returned by
//! the operations themselves.

use std::time::Duration;

use ryxmsg_proto::ProtoError;
use thiserror::Error;

use crate::handshake::HandshakeState;

/// Failure reported by the protocol service.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ServiceError {
    /// The service could not be reached or started.
    #[error("service unavailable: {0}")]
    Unavailable(String),

    /// A referenced contact, group or account does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// A call argument was rejected.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The service has been closed.
    #[error("service closed")]
    Closed,

    /// An event stream failed mid-flight.
    #[error("stream failed: {0}")]
    Stream(String),
}

/// Underlying cause of a [`SessionError::Protocol`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolFault {
    /// A service call or stream failed.
    #[error(transparent)]
    Service(#[from] ServiceError),

    /// An event payload could not be decoded.
    #[error(transparent)]
    Payload(#[from] ProtoError),

    /// A stream ended before the awaited event showed up.
    #[error("stream ended before {expected}")]
    EndedEarly {
        /// What the consumer was waiting for.
        expected: &'static str,
    },
}

/// Errors returned by session operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    /// The connection to the protocol service could not be established.
    #[error("failed to open session: {0}")]
    OpenFailed(#[source] ServiceError),

    /// A peer identity string is not a valid encoding.
    #[error("invalid identity: {reason}")]
    InvalidIdentity {
        /// Why the identity was rejected.
        reason: String,
    },

    /// A protocol service call or stream failed.
    #[error("protocol error during {operation}: {source}")]
    Protocol {
        /// Step that failed.
        operation: &'static str,
        /// Underlying failure.
        #[source]
        source: ProtocolFault,
    },

    /// The caller abandoned the wait.
    #[error("operation cancelled")]
    Cancelled,

    /// A caller-supplied deadline expired.
    #[error("{operation} timed out after {after:?}")]
    TimedOut {
        /// Step that timed out.
        operation: &'static str,
        /// Configured limit.
        after: Duration,
    },

    /// The session was closed.
    #[error("session closed")]
    Closed,

    /// A handshake step was attempted out of order.
    #[error("cannot {operation} in handshake state {state:?}")]
    InvalidState {
        /// State the coordinator was in.
        state: HandshakeState,
        /// Attempted step.
        operation: &'static str,
    },
}

impl SessionError {
    /// Wrap a failure of `operation`.
    pub fn protocol(operation: &'static str, source: impl Into<ProtocolFault>) -> Self {
        Self::Protocol { operation, source: source.into() }
    }

    /// Build an [`SessionError::InvalidIdentity`].
    pub fn invalid_identity(reason: impl Into<String>) -> Self {
        Self::InvalidIdentity { reason: reason.into() }
    }
}

/// Attach the failing step to service and payload errors.
pub trait ResultExt<T> {
    /// Convert the error into [`SessionError::Protocol`] for `operation`.
    fn during(self, operation: &'static str) -> Result<T, SessionError>;
}

impl<T, E: Into<ProtocolFault>> ResultExt<T> for Result<T, E> {
    fn during(self, operation: &'static str) -> Result<T, SessionError> {
        self.map_err(|e| SessionError::protocol(operation, e))
    }
}
