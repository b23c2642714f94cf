//! Client session.
//!
//! A [`ClientSession`] owns one connection to the protocol service and
//! exposes the two things an application does with it: send one message to a
//! peer, or receive one message from whoever contacts us first.
//!
//! Each call runs a fresh handshake. Nothing is cached between calls, so a
//! second `send` to the same peer goes through contact request and activation
//! again; the service treats both as idempotent.
//!
//! # Lifecycle
//!
//! ```text
//! open ──> [send | receive | own_identity]* ──> close
//! ```
//!
//! After [`ClientSession::close`] every operation returns
//! [`SessionError::Closed`]. A [`ShutdownHandle`] cancels whatever operation
//! is in flight and every operation started afterwards.

use ryxmsg_core::{
    CancellationToken, Connector, HandshakeCoordinator, Incoming, MessageExchanger, PeerIdentity,
    ProtocolService, ReceiveOutcome, ResultExt, SessionConfig, SessionError, StorageLocation,
};
use ryxmsg_proto::short_key;
use tracing::{debug, info, warn};

/// Outcome of [`ClientSession::receive`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Received {
    /// First message published by the peer.
    Message(Vec<u8>),
    /// The account stream ended without any contact request.
    NoIncomingRequest,
    /// A peer was accepted but its message stream ended empty.
    StreamEnded,
}

/// Cancels a session's operations from another task.
#[derive(Debug, Clone)]
pub struct ShutdownHandle {
    token: CancellationToken,
}

impl ShutdownHandle {
    /// Cancel the in-flight operation and every later one.
    pub fn shutdown(&self) {
        self.token.cancel();
    }

    /// Whether [`ShutdownHandle::shutdown`] has been called.
    pub fn is_shutdown(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Resolve once shutdown is requested.
    pub async fn wait(&self) {
        self.token.cancelled().await;
    }
}

/// Messaging session over a protocol service.
pub struct ClientSession<S: ProtocolService> {
    service: Option<S>,
    storage: StorageLocation,
    config: SessionConfig,
    shutdown: CancellationToken,
}

impl<S: ProtocolService> ClientSession<S> {
    /// Open the protocol service at `storage`.
    ///
    /// # Errors
    ///
    /// [`SessionError::OpenFailed`] if the connector cannot start the service.
    pub async fn open<C>(
        connector: &C,
        storage: StorageLocation,
        config: SessionConfig,
    ) -> Result<Self, SessionError>
    where
        C: Connector<Service = S>,
    {
        let service = connector.open(&storage).await.map_err(|e| {
            warn!(%storage, error = %e, "failed to open protocol service");
            SessionError::OpenFailed(e)
        })?;
        info!(%storage, "session opened");

        Ok(Self { service: Some(service), storage, config, shutdown: CancellationToken::new() })
    }

    /// Storage location the session was opened on.
    pub fn storage(&self) -> &StorageLocation {
        &self.storage
    }

    /// Whether [`ClientSession::close`] has run.
    pub fn is_closed(&self) -> bool {
        self.service.is_none()
    }

    /// Handle that cancels this session's operations.
    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle { token: self.shutdown.clone() }
    }

    /// The underlying service, for inspection.
    pub fn service(&self) -> Option<&S> {
        self.service.as_ref()
    }

    fn live(&self) -> Result<&S, SessionError> {
        self.service.as_ref().ok_or(SessionError::Closed)
    }

    /// Our own identity, as peers pass it to [`ClientSession::send`].
    ///
    /// # Errors
    ///
    /// - [`SessionError::Closed`] after close
    /// - [`SessionError::Protocol`] if the service cannot share its contact
    /// - [`SessionError::InvalidIdentity`] if the shared contact is too large
    pub async fn own_identity(&self) -> Result<PeerIdentity, SessionError> {
        let contact = self.live()?.share_contact().await.during("share_contact")?;
        PeerIdentity::from_bytes(contact)
    }

    /// Send `payload` to the peer identified by `peer`.
    ///
    /// Parses the identity, requests contact, activates the shared group,
    /// waits for it to be ready and publishes the payload once.
    ///
    /// # Errors
    ///
    /// - [`SessionError::InvalidIdentity`] before any service call if `peer`
    ///   is malformed
    /// - any error of [`ClientSession::send_to`]
    pub async fn send(&mut self, peer: &str, payload: &[u8]) -> Result<(), SessionError> {
        let peer = PeerIdentity::parse(peer)?;
        self.send_to(&peer, payload).await
    }

    /// Send `payload` to an already parsed identity.
    ///
    /// # Errors
    ///
    /// - [`SessionError::Closed`] after close
    /// - [`SessionError::Protocol`] if any step fails
    /// - [`SessionError::Cancelled`] on shutdown
    /// - [`SessionError::TimedOut`] if the readiness limit expires
    pub async fn send_to(&mut self, peer: &PeerIdentity, payload: &[u8]) -> Result<(), SessionError> {
        let service = self.live()?;
        let cancel = self.shutdown.child_token();
        debug!(peer = %short_key(peer.as_bytes()), len = payload.len(), "sending");

        let mut handshake = HandshakeCoordinator::new(service, &self.config);
        let group = handshake.initiate_contact(peer).await?;
        let group = handshake.confirm_ready(group, &cancel).await?;
        MessageExchanger::new(service).send_once(&group, payload).await?;

        info!(group = %short_key(group.public_key()), len = payload.len(), "message sent");
        Ok(())
    }

    /// Receive one message from the first peer that contacts us.
    ///
    /// Waits for a contact request on the account group, accepts it,
    /// activates the shared group, waits for it to be ready and returns the
    /// first message on it.
    ///
    /// # Errors
    ///
    /// - [`SessionError::Closed`] after close
    /// - [`SessionError::Protocol`] if any step or stream fails
    /// - [`SessionError::Cancelled`] on shutdown
    /// - [`SessionError::TimedOut`] if a configured limit expires
    pub async fn receive(&mut self) -> Result<Received, SessionError> {
        let service = self.live()?;
        let cancel = self.shutdown.child_token();

        let mut handshake = HandshakeCoordinator::new(service, &self.config);
        let group = match handshake.accept_incoming(&cancel).await? {
            Incoming::Accepted(group) => group,
            Incoming::NoIncomingRequest => {
                info!("no incoming contact request");
                return Ok(Received::NoIncomingRequest);
            },
        };
        let group = handshake.confirm_ready(group, &cancel).await?;

        let outcome = MessageExchanger::new(service)
            .with_receive_timeout(self.config.receive_timeout)
            .receive_once(&group, &cancel)
            .await?;

        Ok(match outcome {
            ReceiveOutcome::Message(message) => {
                info!(
                    peer = %short_key(group.contact_pk()),
                    len = message.payload.len(),
                    "message received"
                );
                Received::Message(message.payload)
            },
            ReceiveOutcome::StreamEnded => {
                info!(peer = %short_key(group.contact_pk()), "peer sent nothing");
                Received::StreamEnded
            },
        })
    }

    /// Release the protocol service.
    ///
    /// Cancels any outstanding wait and closes the service exactly once.
    /// Calling it again is a no-op.
    ///
    /// # Errors
    ///
    /// [`SessionError::Protocol`] if the service reports a failure while
    /// closing. The session counts as closed either way.
    pub async fn close(&mut self) -> Result<(), SessionError> {
        let Some(service) = self.service.take() else {
            return Ok(());
        };
        self.shutdown.cancel();
        service.close().await.during("close")?;
        info!(storage = %self.storage, "session closed");
        Ok(())
    }

    /// Close the session if `result` failed, then hand `result` back.
    ///
    /// For setup steps after [`ClientSession::open`] whose failure means the
    /// session will not be used. A failing close is logged; the original
    /// error wins.
    ///
    /// # Errors
    ///
    /// The error carried by `result`.
    pub async fn close_on_error<T>(
        &mut self,
        result: Result<T, SessionError>,
    ) -> Result<T, SessionError> {
        if let Err(e) = &result {
            debug!(storage = %self.storage, error = %e, "closing session after failed setup");
            if let Err(close) = self.close().await {
                warn!(storage = %self.storage, error = %close, "close after failed setup failed");
            }
        }
        result
    }
}

impl<S: ProtocolService> Drop for ClientSession<S> {
    fn drop(&mut self) {
        if self.service.is_some() {
            debug!(storage = %self.storage, "session dropped without close");
        }
        self.shutdown.cancel();
    }
}

impl<S: ProtocolService> std::fmt::Debug for ClientSession<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientSession")
            .field("storage", &self.storage)
            .field("config", &self.config)
            .field("closed", &self.is_closed())
            .finish_non_exhaustive()
    }
}
