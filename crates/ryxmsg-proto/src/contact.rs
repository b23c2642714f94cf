//! Contacts, groups and account configuration.
//!
//! # Protocol Flow
//!
//! A peer shares its [`Contact`] as an opaque byte string (the service
//! encodes it). Whoever receives those bytes hands them back to their own
//! service to decode, sends a contact request to the decoded contact, and
//! resolves the [`GroupDescriptor`] bound to that contact's public key. The
//! contact group is the only channel the two peers share.

use serde::{Deserialize, Serialize};

use crate::errors::{ProtoError, Result, from_cbor, to_cbor};

/// Shareable contact card for an account.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Contact {
    /// Account public key.
    pub pk: Vec<u8>,

    /// Seed used by the service to derive rendezvous points.
    pub public_rendezvous_seed: Vec<u8>,

    /// Free-form metadata attached by the owner.
    pub metadata: Vec<u8>,
}

impl Contact {
    /// Encode the contact into its shareable binary form.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        if self.pk.is_empty() {
            return Err(ProtoError::EmptyKey { field: "contact.pk" });
        }
        to_cbor("contact", self)
    }

    /// Decode a contact from its shareable binary form.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let contact: Self = from_cbor("contact", bytes)?;
        if contact.pk.is_empty() {
            return Err(ProtoError::EmptyKey { field: "contact.pk" });
        }
        Ok(contact)
    }
}

/// Kind of group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GroupType {
    /// Per-account group carrying account-level events (contact requests).
    Account,
    /// Group shared by exactly one pair of contacts.
    Contact,
    /// Group with an arbitrary number of members.
    MultiMember,
}

/// Group resolved for a contact.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GroupDescriptor {
    /// Group public key. Identifies the group in every group-scoped call.
    pub public_key: Vec<u8>,

    /// Kind of group.
    pub group_type: GroupType,
}

/// Configuration of the running service instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceConfiguration {
    /// Account public key.
    pub account_pk: Vec<u8>,

    /// Public key of this device.
    pub device_pk: Vec<u8>,

    /// Public key of the account group, where contact requests show up.
    pub account_group_pk: Vec<u8>,
}

/// Short hex rendering of a key for log lines.
pub fn short_key(key: &[u8]) -> String {
    let end = key.len().min(6);
    hex::encode(&key[..end])
}
