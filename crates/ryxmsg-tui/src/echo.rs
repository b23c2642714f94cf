//! In-process echo peer.
//!
//! Lives on the same [`MemoryNetwork`] as the shell. It waits for one
//! message, then sends it back to the shell from a second account. Replying
//! from the receiving account would land in the group the shell already
//! wrote to, where the first message is the shell's own.

use ryxmsg_client::{ClientSession, Received, ShutdownHandle};
use ryxmsg_core::{PeerIdentity, SessionConfig, SessionError, StorageLocation};
use ryxmsg_harness::{MemoryNetwork, MemoryNode};
use tokio::{sync::mpsc::UnboundedSender, task::JoinHandle};
use tracing::{info, warn};

use crate::app::AppEvent;

/// Display name of the echo peer.
pub const ECHO_NAME: &str = "echo";

/// Storage location of the account the echo peer receives on.
pub const ECHO_STORAGE: &str = "echo";
const REPLY_STORAGE: &str = "echo-reply";

/// Start the echo peer.
///
/// Returns the identity to send to and the task serving it. The task ends
/// after one exchange or when `quit` fires.
pub async fn spawn(
    network: &MemoryNetwork,
    reply_to: PeerIdentity,
    events: UnboundedSender<AppEvent>,
    quit: ShutdownHandle,
    config: SessionConfig,
) -> Result<(PeerIdentity, JoinHandle<()>), SessionError> {
    let mut echo =
        ClientSession::open(network, StorageLocation::from(ECHO_STORAGE), config.clone()).await?;
    let identity = echo.own_identity().await;
    let identity = echo.close_on_error(identity).await?;
    let network = network.clone();

    let task = tokio::spawn(async move {
        let report = |text: String| {
            let _ = events.send(AppEvent::Peer { name: ECHO_NAME.into(), text });
        };

        let received = tokio::select! {
            () = quit.wait() => None,
            received = echo.receive() => Some(received),
        };
        if let Err(e) = echo.close().await {
            warn!(error = %e, "echo close failed");
        }

        let payload = match received {
            None => return,
            Some(Ok(Received::Message(payload))) => payload,
            Some(Ok(other)) => return report(format!("nothing to echo ({other:?})")),
            Some(Err(e)) => return report(format!("receive failed: {e}")),
        };
        report(format!("got {} bytes, replying from {REPLY_STORAGE}", payload.len()));

        let replied = tokio::select! {
            () = quit.wait() => return,
            replied = reply(&network, &reply_to, &payload, config) => replied,
        };
        match replied {
            Ok(()) => {
                info!("echo reply sent");
                report("reply sent, use /recv".into());
            },
            Err(e) => report(format!("reply failed: {e}")),
        }
    });

    Ok((identity, task))
}

async fn reply(
    network: &MemoryNetwork,
    to: &PeerIdentity,
    payload: &[u8],
    config: SessionConfig,
) -> Result<(), SessionError> {
    let mut session: ClientSession<MemoryNode> =
        ClientSession::open(network, StorageLocation::from(REPLY_STORAGE), config).await?;
    let sent = session.send_to(to, payload).await;
    session.close().await?;
    sent
}
