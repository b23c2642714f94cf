//! Group metadata events.
//!
//! Metadata streams interleave many event kinds. Only two are acted upon by
//! the messaging orchestrator: [`EventType::GroupMemberDeviceAdded`] (a group
//! became usable) and [`EventType::AccountContactRequestIncomingReceived`]
//! (someone wants to talk to us). Every other kind must be skippable without
//! decoding its payload.

use serde::{Deserialize, Serialize};

use crate::errors::{Result, from_cbor, to_cbor};

/// Numeric tag of a metadata event.
///
/// Envelopes carry the raw `u16` so that unknown tags survive decoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum EventType {
    /// Missing or zero tag.
    Undefined = 0,
    /// A device of a member joined the group.
    GroupMemberDeviceAdded = 1,
    /// A device published its chain key to the group.
    GroupDeviceChainKeyAdded = 2,
    /// The account joined a group.
    AccountGroupJoined = 101,
    /// Incoming contact requests were disabled.
    AccountContactRequestDisabled = 201,
    /// Incoming contact requests were enabled.
    AccountContactRequestEnabled = 202,
    /// An outgoing contact request was queued.
    AccountContactRequestOutgoingEnqueued = 204,
    /// An outgoing contact request reached the peer.
    AccountContactRequestOutgoingSent = 205,
    /// A contact request from a peer arrived.
    AccountContactRequestIncomingReceived = 206,
    /// An incoming contact request was accepted.
    AccountContactRequestIncomingAccepted = 208,
    /// An application-level metadata payload was published.
    GroupMetadataPayloadSent = 1001,
}

impl EventType {
    /// Map a raw tag to a known event type.
    pub fn from_u16(tag: u16) -> Option<Self> {
        match tag {
            0 => Some(Self::Undefined),
            1 => Some(Self::GroupMemberDeviceAdded),
            2 => Some(Self::GroupDeviceChainKeyAdded),
            101 => Some(Self::AccountGroupJoined),
            201 => Some(Self::AccountContactRequestDisabled),
            202 => Some(Self::AccountContactRequestEnabled),
            204 => Some(Self::AccountContactRequestOutgoingEnqueued),
            205 => Some(Self::AccountContactRequestOutgoingSent),
            206 => Some(Self::AccountContactRequestIncomingReceived),
            208 => Some(Self::AccountContactRequestIncomingAccepted),
            1001 => Some(Self::GroupMetadataPayloadSent),
            _ => None,
        }
    }

    /// Raw tag value.
    pub fn to_u16(self) -> u16 {
        self as u16
    }
}

/// Payload of [`EventType::GroupMemberDeviceAdded`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberDeviceAdded {
    /// Member (account) public key.
    pub member_pk: Vec<u8>,
    /// Device public key.
    pub device_pk: Vec<u8>,
}

/// Payload of [`EventType::AccountContactRequestIncomingReceived`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactRequestIncoming {
    /// Public key of the requesting account.
    pub contact_pk: Vec<u8>,
    /// Rendezvous seed of the requesting account.
    pub contact_rendezvous_seed: Vec<u8>,
    /// Metadata the requester attached to its contact card.
    pub contact_metadata: Vec<u8>,
}

/// Payload of the outgoing contact request events.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactRequestOutgoing {
    /// Public key of the requested account.
    pub contact_pk: Vec<u8>,
}

/// Payload of [`EventType::AccountContactRequestIncomingAccepted`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactRequestAccepted {
    /// Public key of the accepted account.
    pub contact_pk: Vec<u8>,
}

/// Decoded metadata event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GroupEvent {
    /// A member device was added to the group.
    MemberDeviceAdded(MemberDeviceAdded),
    /// A contact request arrived.
    ContactRequestIncomingReceived(ContactRequestIncoming),
    /// A contact request was accepted locally.
    ContactRequestIncomingAccepted(ContactRequestAccepted),
    /// An outgoing contact request was queued.
    ContactRequestOutgoingEnqueued(ContactRequestOutgoing),
    /// An outgoing contact request reached the peer.
    ContactRequestOutgoingSent(ContactRequestOutgoing),
    /// A known event kind whose payload is not interpreted here.
    Other(EventType),
    /// A tag this crate does not know.
    Unrecognized {
        /// Raw tag value.
        event_type: u16,
    },
}

impl GroupEvent {
    /// Tag written on the envelope for this event.
    pub fn event_type(&self) -> u16 {
        match self {
            Self::MemberDeviceAdded(_) => EventType::GroupMemberDeviceAdded.to_u16(),
            Self::ContactRequestIncomingReceived(_) => {
                EventType::AccountContactRequestIncomingReceived.to_u16()
            },
            Self::ContactRequestIncomingAccepted(_) => {
                EventType::AccountContactRequestIncomingAccepted.to_u16()
            },
            Self::ContactRequestOutgoingEnqueued(_) => {
                EventType::AccountContactRequestOutgoingEnqueued.to_u16()
            },
            Self::ContactRequestOutgoingSent(_) => {
                EventType::AccountContactRequestOutgoingSent.to_u16()
            },
            Self::Other(kind) => kind.to_u16(),
            Self::Unrecognized { event_type } => *event_type,
        }
    }

    /// Encode the payload carried on the envelope.
    ///
    /// Events without a typed payload encode to an empty byte string.
    pub fn encode_payload(&self) -> Result<Vec<u8>> {
        match self {
            Self::MemberDeviceAdded(p) => to_cbor("member device added", p),
            Self::ContactRequestIncomingReceived(p) => to_cbor("incoming contact request", p),
            Self::ContactRequestIncomingAccepted(p) => to_cbor("accepted contact request", p),
            Self::ContactRequestOutgoingEnqueued(p) | Self::ContactRequestOutgoingSent(p) => {
                to_cbor("outgoing contact request", p)
            },
            Self::Other(_) | Self::Unrecognized { .. } => Ok(Vec::new()),
        }
    }

    /// Decode an envelope into a typed event.
    ///
    /// Unknown tags never fail: they become [`GroupEvent::Unrecognized`]. A
    /// known tag with a malformed payload is an error.
    pub fn decode(envelope: &MetadataEnvelope) -> Result<Self> {
        let Some(kind) = envelope.kind() else {
            return Ok(Self::Unrecognized { event_type: envelope.event_type });
        };

        let bytes = envelope.event.as_slice();
        let event = match kind {
            EventType::GroupMemberDeviceAdded => {
                Self::MemberDeviceAdded(from_cbor("member device added", bytes)?)
            },
            EventType::AccountContactRequestIncomingReceived => {
                Self::ContactRequestIncomingReceived(from_cbor("incoming contact request", bytes)?)
            },
            EventType::AccountContactRequestIncomingAccepted => {
                Self::ContactRequestIncomingAccepted(from_cbor("accepted contact request", bytes)?)
            },
            EventType::AccountContactRequestOutgoingEnqueued => {
                Self::ContactRequestOutgoingEnqueued(from_cbor("outgoing contact request", bytes)?)
            },
            EventType::AccountContactRequestOutgoingSent => {
                Self::ContactRequestOutgoingSent(from_cbor("outgoing contact request", bytes)?)
            },
            other => Self::Other(other),
        };
        Ok(event)
    }
}

/// One element of a group metadata stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataEnvelope {
    /// Group the event belongs to.
    pub group_pk: Vec<u8>,
    /// Position of the event in the group's metadata log.
    pub cursor: u64,
    /// Raw event tag.
    pub event_type: u16,
    /// CBOR payload for the tag.
    pub event: Vec<u8>,
}

impl MetadataEnvelope {
    /// Wrap an event for the given group and position.
    pub fn new(group_pk: Vec<u8>, cursor: u64, event: &GroupEvent) -> Result<Self> {
        Ok(Self {
            group_pk,
            cursor,
            event_type: event.event_type(),
            event: event.encode_payload()?,
        })
    }

    /// Known event type of this envelope, if any.
    pub fn kind(&self) -> Option<EventType> {
        EventType::from_u16(self.event_type)
    }

    /// Whether the envelope carries the given event type.
    ///
    /// Cheap check that does not touch the payload.
    pub fn is(&self, kind: EventType) -> bool {
        self.event_type == kind.to_u16()
    }
}
