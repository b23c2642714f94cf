//! Session-level messaging API for ryxmsg.
//!
//! Wraps the handshake and exchange components of `ryxmsg-core` into a
//! [`ClientSession`] with two operations:
//!
//! - [`ClientSession::send`]: deliver one message to a peer identity
//! - [`ClientSession::receive`]: take one message from the first peer that
//!   contacts us
//!
//! Sessions are opened through a [`ryxmsg_core::Connector`] and must be
//! closed with [`ClientSession::close`]. [`watch_signals`] wires SIGINT and
//! SIGTERM to a session's [`ShutdownHandle`].

pub mod session;
pub mod signal;

pub use session::{ClientSession, Received, ShutdownHandle};
pub use signal::{Signal, SignalError, shutdown_signal, watch_signals};
