//! Handshake and message-exchange orchestration for ryxmsg.
//!
//! Turns the event-stream primitives of the protocol service into one-shot
//! operations: send a single message to a peer, or receive a single message
//! from whoever contacts us first.
//!
//! # Architecture
//!
//! The protocol service is consumed through the [`ProtocolService`] trait.
//! Everything it streams (contact requests, membership changes, messages) is
//! read through scoped [`Subscription`]s that are released on every exit
//! path, and every stream consumer is an instance of the [`scan()`] loop.
//!
//! ```text
//! send:    identity::decode ─> initiate_contact ─> wait_until_ready ─> send_once
//! receive: accept_incoming ─────────────────────> wait_until_ready ─> receive_once
//! ```
//!
//! # Components
//!
//! - [`identity`]: base58 codec and [`PeerIdentity`]
//! - [`HandshakeCoordinator`]: contact request send/accept and group activation
//! - [`ReadinessWaiter`]: waits for a member-added event on a group
//! - [`MessageExchanger`]: single send / single receive on a ready group
//! - [`mod@scan`]: the consume-until-match combinator
//! - [`error`]: [`ServiceError`] and [`SessionError`]

pub mod config;
pub mod error;
pub mod exchange;
pub mod group;
pub mod handshake;
pub mod identity;
pub mod readiness;
pub mod scan;
pub mod service;
pub mod subscription;

pub use config::{SessionConfig, StorageLocation};
pub use error::{ProtocolFault, ResultExt, ServiceError, SessionError};
pub use exchange::{MessageEvent, MessageExchanger, ReceiveOutcome};
pub use group::{ActivatedGroup, ReadyGroup};
pub use handshake::{HandshakeCoordinator, HandshakeState, Incoming};
pub use identity::PeerIdentity;
pub use readiness::ReadinessWaiter;
pub use scan::{Scan, scan, settle};
pub use service::{Connector, ProtocolService};
pub use subscription::{EventStream, Subscription};
pub use tokio_util::sync::CancellationToken;
