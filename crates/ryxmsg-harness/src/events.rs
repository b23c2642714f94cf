//! Event builders for scripting metadata streams.

use ryxmsg_core::ServiceError;
use ryxmsg_proto::{
    ContactRequestAccepted, ContactRequestIncoming, ContactRequestOutgoing, EventType, GroupEvent,
    MemberDeviceAdded, MetadataEnvelope,
};

/// A device of `member_pk` joined.
pub fn member_added(member_pk: &[u8]) -> GroupEvent {
    let mut device_pk = member_pk.to_vec();
    device_pk.reverse();
    GroupEvent::MemberDeviceAdded(MemberDeviceAdded { member_pk: member_pk.to_vec(), device_pk })
}

/// A contact request from `contact_pk` arrived.
pub fn incoming_request(contact_pk: &[u8]) -> GroupEvent {
    GroupEvent::ContactRequestIncomingReceived(ContactRequestIncoming {
        contact_pk: contact_pk.to_vec(),
        contact_rendezvous_seed: vec![0x5e; 32],
        contact_metadata: Vec::new(),
    })
}

/// An outgoing contact request to `contact_pk` was queued.
pub fn outgoing_enqueued(contact_pk: &[u8]) -> GroupEvent {
    GroupEvent::ContactRequestOutgoingEnqueued(ContactRequestOutgoing {
        contact_pk: contact_pk.to_vec(),
    })
}

/// An outgoing contact request to `contact_pk` was delivered.
pub fn outgoing_sent(contact_pk: &[u8]) -> GroupEvent {
    GroupEvent::ContactRequestOutgoingSent(ContactRequestOutgoing {
        contact_pk: contact_pk.to_vec(),
    })
}

/// A contact request from `contact_pk` was accepted.
pub fn request_accepted(contact_pk: &[u8]) -> GroupEvent {
    GroupEvent::ContactRequestIncomingAccepted(ContactRequestAccepted {
        contact_pk: contact_pk.to_vec(),
    })
}

/// Events that neither confirm readiness nor carry a contact request.
pub fn noise() -> Vec<GroupEvent> {
    vec![
        GroupEvent::Other(EventType::AccountGroupJoined),
        GroupEvent::Other(EventType::GroupDeviceChainKeyAdded),
        GroupEvent::Other(EventType::AccountContactRequestEnabled),
        GroupEvent::Unrecognized { event_type: 7777 },
        GroupEvent::Other(EventType::GroupMetadataPayloadSent),
    ]
}

/// Wrap `event` for `group_pk` at `cursor`.
///
/// # Errors
///
/// Returns [`ServiceError::InvalidArgument`] if the payload cannot be
/// encoded.
pub fn envelope(
    group_pk: &[u8],
    cursor: u64,
    event: &GroupEvent,
) -> Result<MetadataEnvelope, ServiceError> {
    MetadataEnvelope::new(group_pk.to_vec(), cursor, event)
        .map_err(|e| ServiceError::InvalidArgument(e.to_string()))
}
