//! Deterministic protocol services for ryxmsg testing.
//!
//! Two in-memory implementations of [`ryxmsg_core::ProtocolService`]:
//!
//! - [`MemoryNetwork`] / [`MemoryNode`]: a live network where any number of
//!   accounts exchange contact requests and messages, with streams that
//!   replay and then follow group logs. Used for end-to-end flows.
//! - [`ScriptedService`]: canned streams, call recording and fault injection
//!   for exercising one orchestrator step at a time.
//!
//! Both track every subscription they hand out, so tests can assert that
//! nothing is left open after an operation returns.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod events;
pub mod memory;
pub mod scripted;
pub mod tracker;

pub use memory::{MemoryNetwork, MemoryNode};
pub use scripted::{Call, Item, ScriptedService, StreamEnd};
pub use tracker::{SubscriptionGuard, SubscriptionTracker};
