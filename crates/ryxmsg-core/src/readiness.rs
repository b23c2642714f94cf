//! Group readiness.
//!
//! Activating a group returns before the group is usable. The group is ready
//! once its metadata log shows a member device being added. The waiter
//! subscribes to that log and resolves on the first such event.

use std::time::Duration;

use ryxmsg_proto::{EventType, MetadataEnvelope, short_key};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::{
    error::{ProtocolFault, ResultExt, SessionError},
    group::{ActivatedGroup, ReadyGroup},
    scan::{Scan, scan},
    service::ProtocolService,
};

const OPERATION: &str = "wait_until_ready";

/// Waits for an activated group to become ready.
#[derive(Debug)]
pub struct ReadinessWaiter<'a, S> {
    service: &'a S,
    timeout: Option<Duration>,
}

impl<'a, S: ProtocolService> ReadinessWaiter<'a, S> {
    /// Waiter without a deadline.
    pub fn new(service: &'a S) -> Self {
        Self { service, timeout: None }
    }

    /// Bound the wait. `None` waits indefinitely.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Block until a member-added event is observed on the group.
    ///
    /// Other event kinds are skipped. Readiness is decided by the event tag
    /// alone; the payload is not interpreted.
    ///
    /// # Errors
    ///
    /// - [`SessionError::Protocol`] if the subscription cannot be opened,
    ///   fails, or ends before any member is added
    /// - [`SessionError::Cancelled`] if `cancel` fires
    /// - [`SessionError::TimedOut`] if the configured limit expires
    ///
    /// The subscription is released on every path.
    pub async fn wait_until_ready(
        &self,
        group: ActivatedGroup,
        cancel: &CancellationToken,
    ) -> Result<ReadyGroup, SessionError> {
        let subscription = self.service.group_metadata_list(group.public_key()).await.during(OPERATION)?;
        debug!(group = %short_key(group.public_key()), "waiting for a member to join");

        let wait = scan(subscription, cancel, OPERATION, |envelope: MetadataEnvelope| {
            Ok(envelope.is(EventType::GroupMemberDeviceAdded).then_some(envelope.cursor))
        });

        let outcome = match self.timeout {
            Some(after) => tokio::time::timeout(after, wait)
                .await
                .map_err(|_| SessionError::TimedOut { operation: OPERATION, after })??,
            None => wait.await?,
        };

        match outcome {
            Scan::Matched(cursor) => {
                debug!(group = %short_key(group.public_key()), cursor, "group ready");
                Ok(group.into_ready(cursor))
            },
            Scan::Ended => Err(SessionError::protocol(
                OPERATION,
                ProtocolFault::EndedEarly { expected: "a member joined" },
            )),
        }
    }
}
