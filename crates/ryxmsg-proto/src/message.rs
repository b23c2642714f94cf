//! Group message events.

use serde::{Deserialize, Serialize};

/// One element of a group message stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageEnvelope {
    /// Group the message was published to.
    pub group_pk: Vec<u8>,
    /// Position of the message in the group's message log.
    pub cursor: u64,
    /// Application payload, opaque to the service.
    pub message: Vec<u8>,
}
