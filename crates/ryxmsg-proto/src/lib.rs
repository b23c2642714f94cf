//! Data model for the ryxmsg protocol service.
//!
//! Everything the messaging orchestrator exchanges with the underlying
//! protocol service lives here: contacts, group descriptors, the service
//! configuration, and the two kinds of stream envelopes (group metadata and
//! group messages).
//!
//! Metadata envelopes carry a numeric event tag plus a CBOR payload. The tag
//! is kept raw on the envelope so that a consumer can skip events it does not
//! care about without paying for payload decoding. [`GroupEvent::decode`]
//! turns an envelope into a closed, exhaustively matchable variant type, with
//! an explicit [`GroupEvent::Unrecognized`] case for tags this crate does not
//! know about.
#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod contact;
pub mod errors;
pub mod event;
pub mod message;

pub use contact::{Contact, GroupDescriptor, GroupType, ServiceConfiguration, short_key};
pub use errors::{ProtoError, Result};
pub use event::{
    ContactRequestAccepted, ContactRequestIncoming, ContactRequestOutgoing, EventType, GroupEvent,
    MemberDeviceAdded, MetadataEnvelope,
};
pub use message::MessageEnvelope;
