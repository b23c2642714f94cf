//! End-to-end test for one-shot messaging.
//!
//! Two sessions on a shared in-memory network: one sends a single message to
//! the other's identity while the other waits to receive it. Covers the full
//! flow of contact request, acceptance, group activation, readiness and
//! delivery, plus session lifecycle around it.

use std::time::Duration;

use ryxmsg_client::{ClientSession, Received};
use ryxmsg_core::{SessionConfig, SessionError};
use ryxmsg_harness::{MemoryNetwork, MemoryNode};

async fn open(network: &MemoryNetwork, name: &str) -> ClientSession<MemoryNode> {
    ClientSession::open(network, name.into(), SessionConfig::default()).await.unwrap()
}

fn account_pk(session: &ClientSession<MemoryNode>) -> Vec<u8> {
    session.service().unwrap().account_pk().to_vec()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn hello_is_delivered_exactly_once() {
    let network = MemoryNetwork::new();
    let mut alice = open(&network, "alice").await;
    let mut bob = open(&network, "bob").await;
    let (alice_pk, bob_pk) = (account_pk(&alice), account_pk(&bob));
    let bob_id = bob.own_identity().await.unwrap();

    let receiver = tokio::spawn(async move {
        let received = bob.receive().await;
        (bob, received)
    });
    alice.send(bob_id.as_str(), b"hello").await.unwrap();

    let (mut bob, received) = receiver.await.unwrap();
    assert_eq!(received.unwrap(), Received::Message(b"hello".to_vec()));
    assert_eq!(network.conversation(&alice_pk, &bob_pk), vec![b"hello".to_vec()]);

    alice.close().await.unwrap();
    bob.close().await.unwrap();
    assert_eq!(network.open_subscriptions(), 0);
}

#[tokio::test]
async fn receiver_started_after_sender_still_gets_message() {
    let network = MemoryNetwork::new();
    let mut alice = open(&network, "alice").await;
    let mut bob = open(&network, "bob").await;
    let bob_id = bob.own_identity().await.unwrap();

    alice.send(bob_id.as_str(), b"sent before anyone listened").await.unwrap();
    let received = bob.receive().await.unwrap();

    assert_eq!(received, Received::Message(b"sent before anyone listened".to_vec()));
    assert_eq!(network.open_subscriptions(), 0);
}

#[tokio::test]
async fn second_receive_takes_the_next_sender() {
    let network = MemoryNetwork::new();
    let mut alice = open(&network, "alice").await;
    let mut carol = open(&network, "carol").await;
    let mut bob = open(&network, "bob").await;
    let bob_id = bob.own_identity().await.unwrap();

    alice.send(bob_id.as_str(), b"from alice").await.unwrap();
    assert_eq!(bob.receive().await.unwrap(), Received::Message(b"from alice".to_vec()));

    carol.send(bob_id.as_str(), b"from carol").await.unwrap();
    assert_eq!(bob.receive().await.unwrap(), Received::Message(b"from carol".to_vec()));

    for session in [&mut alice, &mut carol, &mut bob] {
        session.close().await.unwrap();
    }
    assert_eq!(network.open_subscriptions(), 0);
}

#[tokio::test]
async fn identity_is_stable_across_reopen() {
    let network = MemoryNetwork::new();
    let mut alice = open(&network, "alice").await;
    let first = alice.own_identity().await.unwrap();
    alice.close().await.unwrap();

    let alice = open(&network, "alice").await;
    assert_eq!(alice.own_identity().await.unwrap(), first);
}

#[tokio::test]
async fn close_is_idempotent() {
    let network = MemoryNetwork::new();
    let mut alice = open(&network, "alice").await;
    let node = alice.service().unwrap().clone();

    alice.close().await.unwrap();
    alice.close().await.unwrap();

    assert_eq!(node.close_calls(), 1);
    assert!(node.is_closed());
    assert_eq!(alice.send("StV1DL6CwTryKyV", b"late").await, Err(SessionError::Closed));
}

#[tokio::test]
async fn unavailable_service_fails_open() {
    let network = MemoryNetwork::new();
    network.set_unavailable(true);

    let result = ClientSession::open(&network, "alice".into(), SessionConfig::default()).await;
    assert!(matches!(result, Err(SessionError::OpenFailed(_))));
}

#[tokio::test]
async fn storage_cannot_be_opened_twice() {
    let network = MemoryNetwork::new();
    let _alice = open(&network, "alice").await;

    let second = ClientSession::open(&network, "alice".into(), SessionConfig::default()).await;
    assert!(matches!(second, Err(SessionError::OpenFailed(_))));
}

#[tokio::test]
async fn malformed_identity_is_rejected() {
    let network = MemoryNetwork::new();
    let mut alice = open(&network, "alice").await;

    for bad in ["", "0OIl", "not base58!"] {
        let result = alice.send(bad, b"hello").await;
        assert!(matches!(result, Err(SessionError::InvalidIdentity { .. })), "{bad:?}");
    }
    assert_eq!(network.subscriptions_opened(), 0);
}

#[tokio::test]
async fn sending_to_self_is_a_protocol_error() {
    let network = MemoryNetwork::new();
    let mut alice = open(&network, "alice").await;
    let own = alice.own_identity().await.unwrap();

    let result = alice.send(own.as_str(), b"hello").await;
    assert!(matches!(result, Err(SessionError::Protocol { operation: "contact_request_send", .. })));
}

#[tokio::test(start_paused = true)]
async fn receive_times_out_without_contact() {
    let network = MemoryNetwork::new();
    let config = SessionConfig::default().with_receive_timeout(Duration::from_secs(5));
    let mut bob = ClientSession::open(&network, "bob".into(), config).await.unwrap();

    let result = bob.receive().await;
    assert_eq!(
        result,
        Err(SessionError::TimedOut { operation: "accept_incoming", after: Duration::from_secs(5) })
    );
    assert_eq!(network.open_subscriptions(), 0);
}

#[tokio::test]
async fn shutdown_cancels_pending_receive() {
    let network = MemoryNetwork::new();
    let mut bob = open(&network, "bob").await;
    let handle = bob.shutdown_handle();

    let receiver = tokio::spawn(async move { bob.receive().await });
    tokio::task::yield_now().await;
    handle.shutdown();

    assert_eq!(receiver.await.unwrap(), Err(SessionError::Cancelled));
    assert_eq!(network.open_subscriptions(), 0);
}
