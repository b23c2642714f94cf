//! Group handles.
//!
//! A group moves through two handle types. The handshake produces an
//! [`ActivatedGroup`]: resolved and activated, but not yet known to be
//! usable. Only [`crate::ReadinessWaiter`] can turn it into a [`ReadyGroup`],
//! and only a [`ReadyGroup`] is accepted by [`crate::MessageExchanger`]. A
//! group that was never confirmed ready cannot be used to exchange messages.

use ryxmsg_proto::{GroupDescriptor, short_key};

/// A resolved and activated group, not yet confirmed ready.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActivatedGroup {
    descriptor: GroupDescriptor,
    contact_pk: Vec<u8>,
}

impl ActivatedGroup {
    pub(crate) fn new(descriptor: GroupDescriptor, contact_pk: Vec<u8>) -> Self {
        Self { descriptor, contact_pk }
    }

    /// Group public key.
    pub fn public_key(&self) -> &[u8] {
        &self.descriptor.public_key
    }

    /// Public key of the contact the group is shared with.
    pub fn contact_pk(&self) -> &[u8] {
        &self.contact_pk
    }

    pub(crate) fn into_ready(self, ready_at: u64) -> ReadyGroup {
        ReadyGroup { descriptor: self.descriptor, contact_pk: self.contact_pk, ready_at }
    }
}

/// A group confirmed ready for message exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadyGroup {
    descriptor: GroupDescriptor,
    contact_pk: Vec<u8>,
    ready_at: u64,
}

impl ReadyGroup {
    /// Group public key.
    pub fn public_key(&self) -> &[u8] {
        &self.descriptor.public_key
    }

    /// Public key of the contact the group is shared with.
    pub fn contact_pk(&self) -> &[u8] {
        &self.contact_pk
    }

    /// Metadata cursor of the member-added event that confirmed readiness.
    pub fn ready_at(&self) -> u64 {
        self.ready_at
    }

    /// Short key for log lines.
    pub(crate) fn log_key(&self) -> String {
        short_key(self.public_key())
    }
}
