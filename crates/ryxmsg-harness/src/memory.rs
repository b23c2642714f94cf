//! Live in-memory protocol network.
//!
//! A [`MemoryNetwork`] hosts any number of accounts. Each account is created
//! the first time its storage location is opened and comes back with the same
//! keys when the location is opened again. Opening a location yields a
//! [`MemoryNode`], the [`ProtocolService`] for that account.
//!
//! Groups keep an append-only metadata log and message log. A subscription
//! replays the log and then follows new entries until the subscription is
//! cancelled or the node is closed, which is how the real service behaves
//! for a subscription that starts at the beginning of the log.
//!
//! Contact requests follow the real flow: the sender's account group records
//! the outgoing request, the recipient's account group records the incoming
//! one, and both parties resolve the same contact group, which becomes ready
//! for each of them once they activate it.

use std::{
    collections::{HashMap, HashSet},
    sync::{
        Arc, Mutex, MutexGuard, PoisonError,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
};

use async_trait::async_trait;
use futures::{StreamExt, stream};
use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;
use ryxmsg_core::{
    Connector, EventStream, ProtocolService, ServiceError, StorageLocation, Subscription,
};
use ryxmsg_proto::{
    Contact, ContactRequestIncoming, EventType, GroupDescriptor, GroupEvent, GroupType,
    MemberDeviceAdded, MessageEnvelope, MetadataEnvelope, ServiceConfiguration, short_key,
};
use tokio::sync::broadcast::{self, error::RecvError};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::{
    events::{envelope, outgoing_enqueued, outgoing_sent, request_accepted},
    tracker::{SubscriptionTracker, tracked},
};

const KEY_LEN: usize = 32;
const STREAM_CAPACITY: usize = 1024;

struct GroupLog {
    group_type: GroupType,
    members: HashSet<Vec<u8>>,
    activated: HashSet<Vec<u8>>,
    metadata: Vec<MetadataEnvelope>,
    messages: Vec<MessageEnvelope>,
    metadata_tx: broadcast::Sender<MetadataEnvelope>,
    message_tx: broadcast::Sender<MessageEnvelope>,
}

impl GroupLog {
    fn new(group_type: GroupType, members: HashSet<Vec<u8>>) -> Self {
        Self {
            group_type,
            members,
            activated: HashSet::new(),
            metadata: Vec::new(),
            messages: Vec::new(),
            metadata_tx: broadcast::channel(STREAM_CAPACITY).0,
            message_tx: broadcast::channel(STREAM_CAPACITY).0,
        }
    }
}

struct Account {
    config: ServiceConfiguration,
    contact: Contact,
    incoming: HashSet<Vec<u8>>,
}

struct NetworkState {
    rng: ChaCha8Rng,
    storage: HashMap<StorageLocation, Vec<u8>>,
    locked: HashSet<StorageLocation>,
    accounts: HashMap<Vec<u8>, Account>,
    groups: HashMap<Vec<u8>, GroupLog>,
    pairs: HashMap<(Vec<u8>, Vec<u8>), Vec<u8>>,
    unavailable: bool,
}

impl NetworkState {
    fn key(&mut self) -> Vec<u8> {
        let mut key = vec![0u8; KEY_LEN];
        self.rng.fill_bytes(&mut key);
        key
    }

    fn create_account(&mut self, storage: &StorageLocation) -> Result<Vec<u8>, ServiceError> {
        let account_pk = self.key();
        let config = ServiceConfiguration {
            account_pk: account_pk.clone(),
            device_pk: self.key(),
            account_group_pk: self.key(),
        };
        let contact = Contact {
            pk: account_pk.clone(),
            public_rendezvous_seed: self.key(),
            metadata: storage.to_string().into_bytes(),
        };

        let group_pk = config.account_group_pk.clone();
        let device = MemberDeviceAdded {
            member_pk: account_pk.clone(),
            device_pk: config.device_pk.clone(),
        };
        self.groups.insert(
            group_pk.clone(),
            GroupLog::new(GroupType::Account, HashSet::from([account_pk.clone()])),
        );
        self.push_event(&group_pk, &GroupEvent::Other(EventType::AccountGroupJoined))?;
        self.push_event(&group_pk, &GroupEvent::MemberDeviceAdded(device))?;
        self.push_event(&group_pk, &GroupEvent::Other(EventType::AccountContactRequestEnabled))?;

        self.accounts
            .insert(account_pk.clone(), Account { config, contact, incoming: HashSet::new() });
        self.storage.insert(storage.clone(), account_pk.clone());
        debug!(account = %short_key(&account_pk), %storage, "account created");
        Ok(account_pk)
    }

    fn account(&self, pk: &[u8]) -> Result<&Account, ServiceError> {
        self.accounts
            .get(pk)
            .ok_or_else(|| ServiceError::NotFound(format!("account {}", short_key(pk))))
    }

    fn group(&self, group_pk: &[u8]) -> Result<&GroupLog, ServiceError> {
        self.groups
            .get(group_pk)
            .ok_or_else(|| ServiceError::NotFound(format!("group {}", short_key(group_pk))))
    }

    fn group_mut(&mut self, group_pk: &[u8]) -> Result<&mut GroupLog, ServiceError> {
        self.groups
            .get_mut(group_pk)
            .ok_or_else(|| ServiceError::NotFound(format!("group {}", short_key(group_pk))))
    }

    fn push_event(&mut self, group_pk: &[u8], event: &GroupEvent) -> Result<(), ServiceError> {
        let group = self.group_mut(group_pk)?;
        let env = envelope(group_pk, group.metadata.len() as u64, event)?;
        group.metadata.push(env.clone());
        // No live subscriber is fine: the entry stays in the log.
        let _ = group.metadata_tx.send(env);
        Ok(())
    }

    fn push_message(&mut self, group_pk: &[u8], payload: &[u8]) -> Result<u64, ServiceError> {
        let group = self.group_mut(group_pk)?;
        let cursor = group.messages.len() as u64;
        let env = MessageEnvelope { group_pk: group_pk.to_vec(), cursor, message: payload.to_vec() };
        group.messages.push(env.clone());
        let _ = group.message_tx.send(env);
        Ok(cursor)
    }

    fn contact_group(&mut self, a: &[u8], b: &[u8]) -> Vec<u8> {
        let pair = if a <= b { (a.to_vec(), b.to_vec()) } else { (b.to_vec(), a.to_vec()) };
        if let Some(group_pk) = self.pairs.get(&pair) {
            return group_pk.clone();
        }

        let group_pk = self.key();
        let members = HashSet::from([pair.0.clone(), pair.1.clone()]);
        self.groups.insert(group_pk.clone(), GroupLog::new(GroupType::Contact, members));
        self.pairs.insert(pair, group_pk.clone());
        group_pk
    }

    fn existing_contact_group(&self, a: &[u8], b: &[u8]) -> Option<&Vec<u8>> {
        let pair = if a <= b { (a.to_vec(), b.to_vec()) } else { (b.to_vec(), a.to_vec()) };
        self.pairs.get(&pair)
    }
}

/// Replay `history`, then follow `live`.
fn replay_then_follow<T: Clone + Send + 'static>(
    history: Vec<T>,
    live: broadcast::Receiver<T>,
) -> EventStream<T> {
    let follow = stream::unfold(live, |mut rx| async move {
        match rx.recv().await {
            Ok(item) => Some((Ok(item), rx)),
            Err(RecvError::Closed) => None,
            Err(RecvError::Lagged(n)) => {
                Some((Err(ServiceError::Stream(format!("subscriber lagged by {n} events"))), rx))
            },
        }
    });
    stream::iter(history.into_iter().map(Ok)).chain(follow).boxed()
}

/// In-memory network shared by any number of [`MemoryNode`]s.
#[derive(Clone)]
pub struct MemoryNetwork {
    state: Arc<Mutex<NetworkState>>,
    tracker: Arc<SubscriptionTracker>,
}

impl MemoryNetwork {
    /// Network with seed 0.
    pub fn new() -> Self {
        Self::with_seed(0)
    }

    /// Network whose keys are derived from `seed`.
    pub fn with_seed(seed: u64) -> Self {
        let state = NetworkState {
            rng: ChaCha8Rng::seed_from_u64(seed),
            storage: HashMap::new(),
            locked: HashSet::new(),
            accounts: HashMap::new(),
            groups: HashMap::new(),
            pairs: HashMap::new(),
            unavailable: false,
        };
        Self { state: Arc::new(Mutex::new(state)), tracker: Arc::default() }
    }

    fn state(&self) -> MutexGuard<'_, NetworkState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Make subsequent [`Connector::open`] calls fail.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.state().unavailable = unavailable;
    }

    /// Subscriptions currently alive across all nodes.
    pub fn open_subscriptions(&self) -> usize {
        self.tracker.open()
    }

    /// Subscriptions handed out so far across all nodes.
    pub fn subscriptions_opened(&self) -> usize {
        self.tracker.opened()
    }

    /// Payloads published to the group shared by two accounts, in order.
    pub fn conversation(&self, a: &[u8], b: &[u8]) -> Vec<Vec<u8>> {
        let state = self.state();
        state
            .existing_contact_group(a, b)
            .and_then(|group_pk| state.groups.get(group_pk))
            .map(|group| group.messages.iter().map(|m| m.message.clone()).collect())
            .unwrap_or_default()
    }
}

impl Default for MemoryNetwork {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Connector for MemoryNetwork {
    type Service = MemoryNode;

    async fn open(&self, storage: &StorageLocation) -> Result<MemoryNode, ServiceError> {
        let mut state = self.state();
        if state.unavailable {
            return Err(ServiceError::Unavailable("network is down".into()));
        }
        if state.locked.contains(storage) {
            return Err(ServiceError::Unavailable(format!("storage {storage} is already open")));
        }

        let account_pk = match state.storage.get(storage) {
            Some(pk) => pk.clone(),
            None => state.create_account(storage)?,
        };
        state.locked.insert(storage.clone());
        debug!(account = %short_key(&account_pk), %storage, "node opened");

        Ok(MemoryNode {
            network: self.clone(),
            account_pk,
            storage: storage.clone(),
            token: CancellationToken::new(),
            closed: Arc::new(AtomicBool::new(false)),
            close_calls: Arc::new(AtomicUsize::new(0)),
        })
    }
}

/// One account's view of a [`MemoryNetwork`].
#[derive(Clone)]
pub struct MemoryNode {
    network: MemoryNetwork,
    account_pk: Vec<u8>,
    storage: StorageLocation,
    token: CancellationToken,
    closed: Arc<AtomicBool>,
    close_calls: Arc<AtomicUsize>,
}

impl MemoryNode {
    /// Account public key of this node.
    pub fn account_pk(&self) -> &[u8] {
        &self.account_pk
    }

    /// Number of times [`ProtocolService::close`] was called.
    pub fn close_calls(&self) -> usize {
        self.close_calls.load(Ordering::SeqCst)
    }

    /// Whether the node has been closed.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn ensure_open(&self) -> Result<(), ServiceError> {
        if self.is_closed() { Err(ServiceError::Closed) } else { Ok(()) }
    }

    fn subscribe<T: Clone + Send + 'static>(
        &self,
        history: Vec<T>,
        live: broadcast::Receiver<T>,
    ) -> Subscription<T> {
        tracked(&self.network.tracker, replay_then_follow(history, live), self.token.child_token())
    }
}

#[async_trait]
impl ProtocolService for MemoryNode {
    async fn service_get_configuration(&self) -> Result<ServiceConfiguration, ServiceError> {
        self.ensure_open()?;
        let state = self.network.state();
        Ok(state.account(&self.account_pk)?.config.clone())
    }

    async fn share_contact(&self) -> Result<Vec<u8>, ServiceError> {
        self.ensure_open()?;
        let state = self.network.state();
        state
            .account(&self.account_pk)?
            .contact
            .to_bytes()
            .map_err(|e| ServiceError::InvalidArgument(e.to_string()))
    }

    async fn decode_contact(&self, encoded: &[u8]) -> Result<Contact, ServiceError> {
        self.ensure_open()?;
        Contact::from_bytes(encoded).map_err(|e| ServiceError::InvalidArgument(e.to_string()))
    }

    async fn contact_request_send(&self, contact: &Contact) -> Result<(), ServiceError> {
        self.ensure_open()?;
        if contact.pk == self.account_pk {
            return Err(ServiceError::InvalidArgument("cannot request contact with self".into()));
        }

        let mut state = self.network.state();
        let own = state.account(&self.account_pk)?;
        let own_group = own.config.account_group_pk.clone();
        let request = GroupEvent::ContactRequestIncomingReceived(ContactRequestIncoming {
            contact_pk: self.account_pk.clone(),
            contact_rendezvous_seed: own.contact.public_rendezvous_seed.clone(),
            contact_metadata: own.contact.metadata.clone(),
        });
        let peer_group = state.account(&contact.pk)?.config.account_group_pk.clone();

        state.contact_group(&self.account_pk, &contact.pk);
        state.push_event(&own_group, &outgoing_enqueued(&contact.pk))?;
        state.push_event(&peer_group, &request)?;
        if let Some(peer) = state.accounts.get_mut(&contact.pk) {
            peer.incoming.insert(self.account_pk.clone());
        }
        state.push_event(&own_group, &outgoing_sent(&contact.pk))?;

        debug!(
            from = %short_key(&self.account_pk),
            to = %short_key(&contact.pk),
            "contact request delivered"
        );
        Ok(())
    }

    async fn contact_request_accept(&self, contact_pk: &[u8]) -> Result<(), ServiceError> {
        self.ensure_open()?;
        let mut state = self.network.state();
        let own_group = state.account(&self.account_pk)?.config.account_group_pk.clone();

        let pending = state
            .accounts
            .get_mut(&self.account_pk)
            .is_some_and(|account| account.incoming.remove(contact_pk));
        if !pending {
            return Err(ServiceError::NotFound(format!(
                "no pending contact request from {}",
                short_key(contact_pk)
            )));
        }

        state.push_event(&own_group, &request_accepted(contact_pk))
    }

    async fn group_info(&self, contact_pk: &[u8]) -> Result<GroupDescriptor, ServiceError> {
        self.ensure_open()?;
        let state = self.network.state();
        let group_pk = state.existing_contact_group(&self.account_pk, contact_pk).ok_or_else(|| {
            ServiceError::NotFound(format!("no group with contact {}", short_key(contact_pk)))
        })?;
        let group = state.group(group_pk)?;
        Ok(GroupDescriptor { public_key: group_pk.clone(), group_type: group.group_type })
    }

    async fn activate_group(&self, group_pk: &[u8]) -> Result<(), ServiceError> {
        self.ensure_open()?;
        let mut state = self.network.state();
        let device_pk = state.account(&self.account_pk)?.config.device_pk.clone();

        let group = state.group_mut(group_pk)?;
        if !group.members.contains(&self.account_pk) {
            return Err(ServiceError::InvalidArgument(format!(
                "not a member of group {}",
                short_key(group_pk)
            )));
        }
        if !group.activated.insert(self.account_pk.clone()) {
            return Ok(());
        }

        let added = MemberDeviceAdded { member_pk: self.account_pk.clone(), device_pk };
        state.push_event(group_pk, &GroupEvent::MemberDeviceAdded(added))?;
        state.push_event(group_pk, &GroupEvent::Other(EventType::GroupDeviceChainKeyAdded))?;
        debug!(account = %short_key(&self.account_pk), group = %short_key(group_pk), "group activated");
        Ok(())
    }

    async fn group_metadata_list(
        &self,
        group_pk: &[u8],
    ) -> Result<Subscription<MetadataEnvelope>, ServiceError> {
        self.ensure_open()?;
        let state = self.network.state();
        let group = state.group(group_pk)?;
        let (history, live) = (group.metadata.clone(), group.metadata_tx.subscribe());
        drop(state);
        Ok(self.subscribe(history, live))
    }

    async fn group_message_list(
        &self,
        group_pk: &[u8],
    ) -> Result<Subscription<MessageEnvelope>, ServiceError> {
        self.ensure_open()?;
        let state = self.network.state();
        let group = state.group(group_pk)?;
        let (history, live) = (group.messages.clone(), group.message_tx.subscribe());
        drop(state);
        Ok(self.subscribe(history, live))
    }

    async fn app_message_send(&self, group_pk: &[u8], payload: &[u8]) -> Result<(), ServiceError> {
        self.ensure_open()?;
        let mut state = self.network.state();
        if !state.group(group_pk)?.activated.contains(&self.account_pk) {
            return Err(ServiceError::InvalidArgument(format!(
                "group {} is not activated",
                short_key(group_pk)
            )));
        }
        let cursor = state.push_message(group_pk, payload)?;
        debug!(group = %short_key(group_pk), cursor, "message published");
        Ok(())
    }

    async fn close(&self) -> Result<(), ServiceError> {
        self.close_calls.fetch_add(1, Ordering::SeqCst);
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        self.token.cancel();
        self.network.state().locked.remove(&self.storage);
        debug!(account = %short_key(&self.account_pk), "node closed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn open(network: &MemoryNetwork, name: &str) -> MemoryNode {
        network.open(&StorageLocation::from(name)).await.unwrap()
    }

    #[tokio::test]
    async fn reopening_storage_keeps_identity() {
        let network = MemoryNetwork::new();
        let node = open(&network, "alice").await;
        let first = node.share_contact().await.unwrap();
        node.close().await.unwrap();

        let node = open(&network, "alice").await;
        assert_eq!(node.share_contact().await.unwrap(), first);
    }

    #[tokio::test]
    async fn storage_is_locked_while_open() {
        let network = MemoryNetwork::new();
        let _node = open(&network, "alice").await;
        let second = network.open(&StorageLocation::from("alice")).await;
        assert!(matches!(second, Err(ServiceError::Unavailable(_))));
    }

    #[tokio::test]
    async fn closed_node_rejects_calls() {
        let network = MemoryNetwork::new();
        let node = open(&network, "alice").await;
        node.close().await.unwrap();
        node.close().await.unwrap();

        assert_eq!(node.close_calls(), 2);
        assert_eq!(node.share_contact().await, Err(ServiceError::Closed));
    }

    #[tokio::test]
    async fn messages_need_activation() {
        let network = MemoryNetwork::new();
        let alice = open(&network, "alice").await;
        let bob = open(&network, "bob").await;

        let bob_contact = alice.decode_contact(&bob.share_contact().await.unwrap()).await.unwrap();
        alice.contact_request_send(&bob_contact).await.unwrap();
        let group = alice.group_info(bob.account_pk()).await.unwrap();
        assert_eq!(group.group_type, GroupType::Contact);

        let early = alice.app_message_send(&group.public_key, b"too soon").await;
        assert!(matches!(early, Err(ServiceError::InvalidArgument(_))));

        alice.activate_group(&group.public_key).await.unwrap();
        alice.app_message_send(&group.public_key, b"hi").await.unwrap();
        assert_eq!(network.conversation(alice.account_pk(), bob.account_pk()), vec![b"hi".to_vec()]);
    }

    #[tokio::test]
    async fn close_ends_live_subscriptions() {
        let network = MemoryNetwork::new();
        let node = open(&network, "alice").await;
        let config = node.service_get_configuration().await.unwrap();

        let mut sub = node.group_metadata_list(&config.account_group_pk).await.unwrap();
        for _ in 0..3 {
            assert!(matches!(sub.next().await, Some(Ok(_))));
        }
        node.close().await.unwrap();
        assert_eq!(sub.next().await, None);
        drop(sub);
        assert_eq!(network.open_subscriptions(), 0);
    }
}
