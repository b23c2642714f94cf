//! Session worker.
//!
//! Owns the [`ClientSession`] on its own task so the render loop never waits
//! on the protocol. Requests are served one at a time; each produces exactly
//! one [`AppEvent`]. When the request channel closes the worker closes the
//! session and returns.

use ryxmsg_client::ClientSession;
use ryxmsg_core::{PeerIdentity, ProtocolService, SessionError};
use tokio::{
    sync::mpsc::{UnboundedReceiver, UnboundedSender},
    task::JoinHandle,
};
use tracing::debug;

use crate::app::{AppEvent, Operation};

/// Work for the session worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    /// Send `payload` to `peer`.
    Send {
        /// Recipient.
        peer: PeerIdentity,
        /// Message payload.
        payload: Vec<u8>,
    },
    /// Receive one message.
    Receive,
}

/// Run `session` on a new task.
pub fn spawn<S: ProtocolService>(
    session: ClientSession<S>,
    requests: UnboundedReceiver<Request>,
    events: UnboundedSender<AppEvent>,
) -> JoinHandle<Result<(), SessionError>> {
    tokio::spawn(run(session, requests, events))
}

async fn run<S: ProtocolService>(
    mut session: ClientSession<S>,
    mut requests: UnboundedReceiver<Request>,
    events: UnboundedSender<AppEvent>,
) -> Result<(), SessionError> {
    while let Some(request) = requests.recv().await {
        let event = match request {
            Request::Send { peer, payload } => match session.send_to(&peer, &payload).await {
                Ok(()) => AppEvent::Sent,
                Err(e) => failed(Operation::Send, &e),
            },
            Request::Receive => match session.receive().await {
                Ok(received) => AppEvent::Received(received),
                Err(e) => failed(Operation::Receive, &e),
            },
        };
        if events.send(event).is_err() {
            debug!("shell gone, dropping result");
        }
    }
    session.close().await
}

fn failed(operation: Operation, error: &SessionError) -> AppEvent {
    debug!(?operation, %error, "operation failed");
    AppEvent::Failed { operation, error: error.to_string() }
}
