//! Contact handshake state machine.
//!
//! Drives the two ways a pair of peers ends up sharing a usable group.
//!
//! # State Machine
//!
//! ```text
//! sender:    Idle ─request─> RequestSent ─info─> GroupResolved ─activate─> GroupActivated ─ready─> Ready
//!
//! receiver:  Idle ─observe─> RequestReceived ─accept─> Accepted ─info─> GroupResolved
//!                                                        ─activate─> GroupActivated ─ready─> Ready
//! ```
//!
//! Every step is a single protocol service call. Failures are returned as-is
//! and leave the coordinator in the last state it reached; nothing is retried.
//! [`HandshakeCoordinator::reset`] returns it to `Idle`.

use std::time::Duration;

use ryxmsg_proto::{
    ContactRequestIncoming, EventType, GroupDescriptor, GroupEvent, MetadataEnvelope, short_key,
};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::{
    config::SessionConfig,
    error::{ResultExt, SessionError},
    group::{ActivatedGroup, ReadyGroup},
    identity::PeerIdentity,
    readiness::ReadinessWaiter,
    scan::{Scan, settle},
    service::ProtocolService,
};

/// Handshake progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakeState {
    /// Nothing started.
    Idle,
    /// Contact request sent to the peer.
    RequestSent,
    /// Incoming contact request observed.
    RequestReceived,
    /// Incoming contact request accepted.
    Accepted,
    /// Group bound to the contact resolved.
    GroupResolved,
    /// Group activated, readiness not yet confirmed.
    GroupActivated,
    /// Group confirmed ready for message exchange.
    Ready,
}

/// Result of [`HandshakeCoordinator::accept_incoming`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Incoming {
    /// A request was accepted and its group activated.
    Accepted(ActivatedGroup),
    /// The account stream ended without a pending request.
    NoIncomingRequest,
}

/// Drives contact-request exchange and group activation.
#[derive(Debug)]
pub struct HandshakeCoordinator<'a, S> {
    service: &'a S,
    state: HandshakeState,
    readiness_timeout: Option<Duration>,
    receive_timeout: Option<Duration>,
}

impl<'a, S: ProtocolService> HandshakeCoordinator<'a, S> {
    /// Coordinator in `Idle` state.
    pub fn new(service: &'a S, config: &SessionConfig) -> Self {
        Self {
            service,
            state: HandshakeState::Idle,
            readiness_timeout: config.readiness_timeout,
            receive_timeout: config.receive_timeout,
        }
    }

    /// Current state.
    pub fn state(&self) -> HandshakeState {
        self.state
    }

    /// Return to `Idle`.
    pub fn reset(&mut self) {
        self.advance(HandshakeState::Idle);
    }

    /// Sender path: request contact with `peer` and activate the shared group.
    ///
    /// Returns the group in `GroupActivated`; readiness is confirmed
    /// separately by [`HandshakeCoordinator::confirm_ready`].
    ///
    /// # Errors
    ///
    /// - [`SessionError::InvalidState`] unless `Idle`
    /// - [`SessionError::Protocol`] if any service call fails
    pub async fn initiate_contact(
        &mut self,
        peer: &PeerIdentity,
    ) -> Result<ActivatedGroup, SessionError> {
        self.require(HandshakeState::Idle, "initiate_contact")?;

        let contact = self.service.decode_contact(peer.as_bytes()).await.during("decode_contact")?;
        self.service.contact_request_send(&contact).await.during("contact_request_send")?;
        self.advance(HandshakeState::RequestSent);

        self.activate(contact.pk).await
    }

    /// Receiver path: wait for an incoming contact request, accept it and
    /// activate the shared group.
    ///
    /// Reads the account metadata stream, skipping every other event kind,
    /// until a request that has not been accepted yet shows up or the stream
    /// ends. A request counts as accepted once the log holds an acceptance
    /// for the same contact after it. The subscription is released on every
    /// path.
    ///
    /// # Errors
    ///
    /// - [`SessionError::InvalidState`] unless `Idle`
    /// - [`SessionError::Protocol`] if a service call or the stream fails, or
    ///   the request payload cannot be decoded
    /// - [`SessionError::Cancelled`] if `cancel` fires while waiting
    /// - [`SessionError::TimedOut`] if the receive limit expires while waiting
    pub async fn accept_incoming(
        &mut self,
        cancel: &CancellationToken,
    ) -> Result<Incoming, SessionError> {
        const OPERATION: &str = "accept_incoming";
        self.require(HandshakeState::Idle, OPERATION)?;

        let config =
            self.service.service_get_configuration().await.during("service_get_configuration")?;
        let subscription =
            self.service.group_metadata_list(&config.account_group_pk).await.during(OPERATION)?;
        debug!(account_group = %short_key(&config.account_group_pk), "waiting for a contact request");

        let wait = settle(
            subscription,
            cancel,
            OPERATION,
            PendingRequests::default(),
            |pending, envelope: MetadataEnvelope| pending.observe(&envelope),
            PendingRequests::oldest,
        );

        let outcome = match self.receive_timeout {
            Some(after) => tokio::time::timeout(after, wait)
                .await
                .map_err(|_| SessionError::TimedOut { operation: OPERATION, after })??,
            None => wait.await?,
        };

        let request: ContactRequestIncoming = match outcome {
            Scan::Matched(request) => request,
            Scan::Ended => {
                debug!("account stream ended without a contact request");
                return Ok(Incoming::NoIncomingRequest);
            },
        };
        self.advance(HandshakeState::RequestReceived);

        self.service
            .contact_request_accept(&request.contact_pk)
            .await
            .during("contact_request_accept")?;
        self.advance(HandshakeState::Accepted);

        self.activate(request.contact_pk).await.map(Incoming::Accepted)
    }

    /// Confirm that an activated group is ready.
    ///
    /// # Errors
    ///
    /// - [`SessionError::InvalidState`] unless `GroupActivated`
    /// - any error of [`ReadinessWaiter::wait_until_ready`]
    pub async fn confirm_ready(
        &mut self,
        group: ActivatedGroup,
        cancel: &CancellationToken,
    ) -> Result<ReadyGroup, SessionError> {
        self.require(HandshakeState::GroupActivated, "confirm_ready")?;

        let ready = ReadinessWaiter::new(self.service)
            .with_timeout(self.readiness_timeout)
            .wait_until_ready(group, cancel)
            .await?;
        self.advance(HandshakeState::Ready);
        Ok(ready)
    }

    async fn activate(&mut self, contact_pk: Vec<u8>) -> Result<ActivatedGroup, SessionError> {
        let descriptor: GroupDescriptor =
            self.service.group_info(&contact_pk).await.during("group_info")?;
        self.advance(HandshakeState::GroupResolved);

        self.service.activate_group(&descriptor.public_key).await.during("activate_group")?;
        self.advance(HandshakeState::GroupActivated);

        Ok(ActivatedGroup::new(descriptor, contact_pk))
    }

    fn require(&self, expected: HandshakeState, operation: &'static str) -> Result<(), SessionError> {
        if self.state == expected {
            Ok(())
        } else {
            Err(SessionError::InvalidState { state: self.state, operation })
        }
    }

    fn advance(&mut self, next: HandshakeState) {
        debug!(from = ?self.state, to = ?next, "handshake transition");
        self.state = next;
    }
}

/// Incoming requests seen on the account log and not yet accepted, oldest
/// first.
#[derive(Debug, Default)]
struct PendingRequests {
    requests: Vec<ContactRequestIncoming>,
}

impl PendingRequests {
    fn observe(&mut self, envelope: &MetadataEnvelope) -> Result<(), SessionError> {
        if !envelope.is(EventType::AccountContactRequestIncomingReceived)
            && !envelope.is(EventType::AccountContactRequestIncomingAccepted)
        {
            return Ok(());
        }

        match GroupEvent::decode(envelope).during("accept_incoming")? {
            GroupEvent::ContactRequestIncomingReceived(request) => {
                if !self.requests.iter().any(|r| r.contact_pk == request.contact_pk) {
                    self.requests.push(request);
                }
            },
            GroupEvent::ContactRequestIncomingAccepted(accepted) => {
                self.requests.retain(|r| r.contact_pk != accepted.contact_pk);
            },
            _ => {},
        }
        Ok(())
    }

    fn oldest(&mut self) -> Option<ContactRequestIncoming> {
        (!self.requests.is_empty()).then(|| self.requests.remove(0))
    }
}
