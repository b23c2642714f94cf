//! Protocol service with canned streams.
//!
//! [`ScriptedService`] answers every call from a script fixed up front: the
//! metadata and message streams of each group, the group bound to each
//! contact, and the calls that should fail. It records every call it
//! receives, so tests can assert on ordering and on what was *not* called.
//!
//! Streams can be scripted to end after their items (`StreamEnd::End`) or to
//! stay open forever (`StreamEnd::Pending`), the latter for exercising
//! cancellation and deadlines.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use async_trait::async_trait;
use futures::{StreamExt, stream};
use ryxmsg_core::{
    Connector, EventStream, ProtocolService, ServiceError, StorageLocation, Subscription,
};
use ryxmsg_proto::{
    Contact, GroupDescriptor, GroupEvent, GroupType, MessageEnvelope, MetadataEnvelope,
    ServiceConfiguration,
};
use tokio_util::sync::CancellationToken;

use crate::{
    events::envelope,
    tracker::{SubscriptionTracker, tracked},
};

/// Service calls, as recorded by [`ScriptedService::calls`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Call {
    /// `Connector::open`
    Open,
    /// `service_get_configuration`
    GetConfiguration,
    /// `share_contact`
    ShareContact,
    /// `decode_contact`
    DecodeContact,
    /// `contact_request_send`
    ContactRequestSend,
    /// `contact_request_accept`
    ContactRequestAccept,
    /// `group_info`
    GroupInfo,
    /// `activate_group`
    ActivateGroup,
    /// `group_metadata_list`
    GroupMetadataList,
    /// `group_message_list`
    GroupMessageList,
    /// `app_message_send`
    AppMessageSend,
    /// `close`
    Close,
}

/// What a scripted stream does after its last item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamEnd {
    /// End the stream.
    End,
    /// Keep the stream open without yielding anything.
    Pending,
}

/// One scripted stream element.
#[derive(Debug, Clone)]
pub enum Item<T> {
    /// Deliver this value.
    Event(T),
    /// Fail the stream with this error.
    Fail(ServiceError),
}

#[derive(Debug, Clone)]
struct StreamScript<T> {
    items: Vec<Item<T>>,
    end: StreamEnd,
}

impl<T> Default for StreamScript<T> {
    fn default() -> Self {
        Self { items: Vec::new(), end: StreamEnd::End }
    }
}

#[derive(Debug, Default)]
struct Script {
    metadata: HashMap<Vec<u8>, StreamScript<GroupEvent>>,
    messages: HashMap<Vec<u8>, StreamScript<Vec<u8>>>,
    groups: HashMap<Vec<u8>, Vec<u8>>,
    failures: HashMap<Call, ServiceError>,
    calls: Vec<Call>,
    accepted: Vec<Vec<u8>>,
    requested: Vec<Contact>,
    activated: Vec<Vec<u8>>,
    sent: Vec<(Vec<u8>, Vec<u8>)>,
}

/// Protocol service answering from a fixed script.
#[derive(Clone)]
pub struct ScriptedService {
    configuration: ServiceConfiguration,
    contact: Contact,
    script: Arc<Mutex<Script>>,
    tracker: Arc<SubscriptionTracker>,
    token: CancellationToken,
}

impl ScriptedService {
    /// Service for an account with fixed keys and an empty script.
    ///
    /// Unscripted streams end immediately; unscripted contacts have no group.
    pub fn new() -> Self {
        let configuration = ServiceConfiguration {
            account_pk: vec![0xa1; 32],
            device_pk: vec![0xd1; 32],
            account_group_pk: vec![0xa9; 32],
        };
        let contact = Contact {
            pk: configuration.account_pk.clone(),
            public_rendezvous_seed: vec![0x5e; 32],
            metadata: Vec::new(),
        };
        Self {
            configuration,
            contact,
            script: Arc::default(),
            tracker: Arc::default(),
            token: CancellationToken::new(),
        }
    }

    fn script(&self) -> MutexGuard<'_, Script> {
        self.script.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Account group public key, where contact requests are scripted.
    pub fn account_group_pk(&self) -> &[u8] {
        &self.configuration.account_group_pk
    }

    /// Own account public key.
    pub fn account_pk(&self) -> &[u8] {
        &self.configuration.account_pk
    }

    /// Bind the contact `contact_pk` to the contact group `group_pk`.
    #[must_use]
    pub fn with_group(self, contact_pk: &[u8], group_pk: &[u8]) -> Self {
        self.script().groups.insert(contact_pk.to_vec(), group_pk.to_vec());
        self
    }

    /// Script the metadata stream of `group_pk`.
    #[must_use]
    pub fn with_metadata(self, group_pk: &[u8], events: Vec<GroupEvent>, end: StreamEnd) -> Self {
        let items = events.into_iter().map(Item::Event).collect();
        self.with_metadata_items(group_pk, items, end)
    }

    /// Script the metadata stream of `group_pk`, failures included.
    #[must_use]
    pub fn with_metadata_items(
        self,
        group_pk: &[u8],
        items: Vec<Item<GroupEvent>>,
        end: StreamEnd,
    ) -> Self {
        self.script().metadata.insert(group_pk.to_vec(), StreamScript { items, end });
        self
    }

    /// Script the message stream of `group_pk`.
    #[must_use]
    pub fn with_messages(self, group_pk: &[u8], payloads: Vec<Vec<u8>>, end: StreamEnd) -> Self {
        let items = payloads.into_iter().map(Item::Event).collect();
        self.with_message_items(group_pk, items, end)
    }

    /// Script the message stream of `group_pk`, failures included.
    #[must_use]
    pub fn with_message_items(
        self,
        group_pk: &[u8],
        items: Vec<Item<Vec<u8>>>,
        end: StreamEnd,
    ) -> Self {
        self.script().messages.insert(group_pk.to_vec(), StreamScript { items, end });
        self
    }

    /// Make every `call` fail with `error`.
    #[must_use]
    pub fn failing(self, call: Call, error: ServiceError) -> Self {
        self.script().failures.insert(call, error);
        self
    }

    /// Calls received so far, in order.
    pub fn calls(&self) -> Vec<Call> {
        self.script().calls.clone()
    }

    /// Number of times `call` was received.
    pub fn count(&self, call: Call) -> usize {
        self.script().calls.iter().filter(|c| **c == call).count()
    }

    /// Contacts a request was sent to.
    pub fn requested(&self) -> Vec<Contact> {
        self.script().requested.clone()
    }

    /// Contact keys whose request was accepted.
    pub fn accepted(&self) -> Vec<Vec<u8>> {
        self.script().accepted.clone()
    }

    /// Groups activated, in order.
    pub fn activated(&self) -> Vec<Vec<u8>> {
        self.script().activated.clone()
    }

    /// `(group_pk, payload)` pairs published.
    pub fn sent(&self) -> Vec<(Vec<u8>, Vec<u8>)> {
        self.script().sent.clone()
    }

    /// Subscriptions currently alive.
    pub fn open_subscriptions(&self) -> usize {
        self.tracker.open()
    }

    /// Subscriptions handed out so far.
    pub fn subscriptions_opened(&self) -> usize {
        self.tracker.opened()
    }

    fn record(&self, call: Call) -> Result<(), ServiceError> {
        let mut script = self.script();
        script.calls.push(call);
        match script.failures.get(&call) {
            Some(error) => Err(error.clone()),
            None => Ok(()),
        }
    }

    fn subscribe<T, U>(
        &self,
        script: Option<StreamScript<T>>,
        mut wrap: impl FnMut(u64, T) -> Result<U, ServiceError>,
    ) -> Subscription<U>
    where
        U: Send + 'static,
    {
        let script = script.unwrap_or_default();
        let mut items = Vec::with_capacity(script.items.len());
        for (cursor, item) in (0u64..).zip(script.items) {
            items.push(match item {
                Item::Event(value) => wrap(cursor, value),
                Item::Fail(error) => Err(error),
            });
        }

        let events: EventStream<U> = match script.end {
            StreamEnd::End => stream::iter(items).boxed(),
            StreamEnd::Pending => stream::iter(items).chain(stream::pending()).boxed(),
        };
        tracked(&self.tracker, events, self.token.child_token())
    }
}

impl Default for ScriptedService {
    fn default() -> Self {
        Self::new()
    }
}

/// Opening a scripted service hands out a handle sharing its script.
#[async_trait]
impl Connector for ScriptedService {
    type Service = Self;

    async fn open(&self, _storage: &StorageLocation) -> Result<Self, ServiceError> {
        self.record(Call::Open)?;
        Ok(self.clone())
    }
}

#[async_trait]
impl ProtocolService for ScriptedService {
    async fn service_get_configuration(&self) -> Result<ServiceConfiguration, ServiceError> {
        self.record(Call::GetConfiguration)?;
        Ok(self.configuration.clone())
    }

    async fn share_contact(&self) -> Result<Vec<u8>, ServiceError> {
        self.record(Call::ShareContact)?;
        self.contact.to_bytes().map_err(|e| ServiceError::InvalidArgument(e.to_string()))
    }

    async fn decode_contact(&self, encoded: &[u8]) -> Result<Contact, ServiceError> {
        self.record(Call::DecodeContact)?;
        Contact::from_bytes(encoded).map_err(|e| ServiceError::InvalidArgument(e.to_string()))
    }

    async fn contact_request_send(&self, contact: &Contact) -> Result<(), ServiceError> {
        self.record(Call::ContactRequestSend)?;
        self.script().requested.push(contact.clone());
        Ok(())
    }

    async fn contact_request_accept(&self, contact_pk: &[u8]) -> Result<(), ServiceError> {
        self.record(Call::ContactRequestAccept)?;
        self.script().accepted.push(contact_pk.to_vec());
        Ok(())
    }

    async fn group_info(&self, contact_pk: &[u8]) -> Result<GroupDescriptor, ServiceError> {
        self.record(Call::GroupInfo)?;
        let script = self.script();
        let public_key = script
            .groups
            .get(contact_pk)
            .cloned()
            .ok_or_else(|| ServiceError::NotFound("no group for contact".into()))?;
        Ok(GroupDescriptor { public_key, group_type: GroupType::Contact })
    }

    async fn activate_group(&self, group_pk: &[u8]) -> Result<(), ServiceError> {
        self.record(Call::ActivateGroup)?;
        self.script().activated.push(group_pk.to_vec());
        Ok(())
    }

    async fn group_metadata_list(
        &self,
        group_pk: &[u8],
    ) -> Result<Subscription<MetadataEnvelope>, ServiceError> {
        self.record(Call::GroupMetadataList)?;
        let script = self.script().metadata.get(group_pk).cloned();
        Ok(self.subscribe(script, |cursor, event| envelope(group_pk, cursor, &event)))
    }

    async fn group_message_list(
        &self,
        group_pk: &[u8],
    ) -> Result<Subscription<MessageEnvelope>, ServiceError> {
        self.record(Call::GroupMessageList)?;
        let script = self.script().messages.get(group_pk).cloned();
        Ok(self.subscribe(script, |cursor, message| {
            Ok(MessageEnvelope { group_pk: group_pk.to_vec(), cursor, message })
        }))
    }

    async fn app_message_send(&self, group_pk: &[u8], payload: &[u8]) -> Result<(), ServiceError> {
        self.record(Call::AppMessageSend)?;
        self.script().sent.push((group_pk.to_vec(), payload.to_vec()));
        Ok(())
    }

    async fn close(&self) -> Result<(), ServiceError> {
        self.record(Call::Close)?;
        self.token.cancel();
        Ok(())
    }
}
