//! Protocol service abstraction.
//!
//! The orchestrator never talks to a concrete engine. It consumes the
//! capabilities below, which production wires to the real protocol service
//! and tests wire to the in-memory harness.

use async_trait::async_trait;
use ryxmsg_proto::{
    Contact, GroupDescriptor, MessageEnvelope, MetadataEnvelope, ServiceConfiguration,
};

use crate::{config::StorageLocation, error::ServiceError, subscription::Subscription};

/// Capabilities of the underlying protocol service.
///
/// Both list calls return a stream that first replays the group's existing
/// log and then follows new events. A stream ends when the service closes or
/// when the subscription is cancelled.
#[async_trait]
pub trait ProtocolService: Send + Sync + 'static {
    /// Configuration of this service instance (account and account group).
    async fn service_get_configuration(&self) -> Result<ServiceConfiguration, ServiceError>;

    /// Shareable, encoded contact card of this account.
    async fn share_contact(&self) -> Result<Vec<u8>, ServiceError>;

    /// Decode a contact card produced by [`ProtocolService::share_contact`].
    async fn decode_contact(&self, encoded: &[u8]) -> Result<Contact, ServiceError>;

    /// Send a contact request to `contact`.
    async fn contact_request_send(&self, contact: &Contact) -> Result<(), ServiceError>;

    /// Accept a pending contact request from `contact_pk`.
    async fn contact_request_accept(&self, contact_pk: &[u8]) -> Result<(), ServiceError>;

    /// Resolve the group shared with `contact_pk`.
    async fn group_info(&self, contact_pk: &[u8]) -> Result<GroupDescriptor, ServiceError>;

    /// Make a group locally usable.
    async fn activate_group(&self, group_pk: &[u8]) -> Result<(), ServiceError>;

    /// Subscribe to a group's metadata events.
    async fn group_metadata_list(
        &self,
        group_pk: &[u8],
    ) -> Result<Subscription<MetadataEnvelope>, ServiceError>;

    /// Subscribe to a group's messages.
    async fn group_message_list(
        &self,
        group_pk: &[u8],
    ) -> Result<Subscription<MessageEnvelope>, ServiceError>;

    /// Publish an application payload to a group.
    async fn app_message_send(&self, group_pk: &[u8], payload: &[u8]) -> Result<(), ServiceError>;

    /// Shut the service down, ending every open stream.
    async fn close(&self) -> Result<(), ServiceError>;
}

/// Opens a protocol service backed by a storage location.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Service type produced by this connector.
    type Service: ProtocolService;

    /// Establish the connection.
    ///
    /// # Errors
    ///
    /// Returns an error if the service cannot be started on `storage`.
    async fn open(&self, storage: &StorageLocation) -> Result<Self::Service, ServiceError>;
}
