//! One-shot message exchange over a ready group.

use std::time::Duration;

use ryxmsg_proto::MessageEnvelope;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::{
    error::{ResultExt, SessionError},
    group::ReadyGroup,
    scan::{Scan, scan},
    service::ProtocolService,
};

/// A message taken from a group's message stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageEvent {
    /// Application payload.
    pub payload: Vec<u8>,
    /// Position of the message in the group's message log.
    pub cursor: u64,
}

impl From<MessageEnvelope> for MessageEvent {
    fn from(envelope: MessageEnvelope) -> Self {
        Self { payload: envelope.message, cursor: envelope.cursor }
    }
}

/// Result of [`MessageExchanger::receive_once`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReceiveOutcome {
    /// The first message on the stream.
    Message(MessageEvent),
    /// The stream ended before any message arrived.
    StreamEnded,
}

/// Sends and receives single messages on a ready group.
#[derive(Debug)]
pub struct MessageExchanger<'a, S> {
    service: &'a S,
    receive_timeout: Option<Duration>,
}

impl<'a, S: ProtocolService> MessageExchanger<'a, S> {
    /// Exchanger without a receive deadline.
    pub fn new(service: &'a S) -> Self {
        Self { service, receive_timeout: None }
    }

    /// Bound [`MessageExchanger::receive_once`]. `None` waits indefinitely.
    #[must_use]
    pub fn with_receive_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.receive_timeout = timeout;
        self
    }

    /// Publish `payload` to the group once.
    ///
    /// No retry and no acknowledgment beyond the service call succeeding.
    pub async fn send_once(&self, group: &ReadyGroup, payload: &[u8]) -> Result<(), SessionError> {
        self.service.app_message_send(group.public_key(), payload).await.during("send_once")?;
        debug!(group = %group.log_key(), len = payload.len(), "message sent");
        Ok(())
    }

    /// Take the first message delivered on the group's message stream.
    ///
    /// The subscription is released before returning, whatever the outcome.
    pub async fn receive_once(
        &self,
        group: &ReadyGroup,
        cancel: &CancellationToken,
    ) -> Result<ReceiveOutcome, SessionError> {
        const OPERATION: &str = "receive_once";

        let subscription =
            self.service.group_message_list(group.public_key()).await.during(OPERATION)?;
        let first = scan(subscription, cancel, OPERATION, |envelope| {
            Ok(Some(MessageEvent::from(envelope)))
        });

        let outcome = match self.receive_timeout {
            Some(after) => tokio::time::timeout(after, first)
                .await
                .map_err(|_| SessionError::TimedOut { operation: OPERATION, after })??,
            None => first.await?,
        };

        Ok(match outcome {
            Scan::Matched(message) => {
                debug!(group = %group.log_key(), cursor = message.cursor, "message received");
                ReceiveOutcome::Message(message)
            },
            Scan::Ended => {
                debug!(group = %group.log_key(), "message stream ended");
                ReceiveOutcome::StreamEnded
            },
        })
    }
}
