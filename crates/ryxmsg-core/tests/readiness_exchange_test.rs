//! Readiness waiting and one-shot exchange against a scripted service.
//!
//! A group must only be reported ready once a member-added event is seen,
//! whatever precedes it on the metadata stream. Exchange tests cover the
//! first-message rule and the empty-stream outcome. Every test checks that
//! no subscription outlives the operation.

use std::time::Duration;

use proptest::prelude::*;
use ryxmsg_core::{
    ActivatedGroup, CancellationToken, HandshakeCoordinator, MessageEvent, MessageExchanger,
    PeerIdentity, ProtocolFault, ReadinessWaiter, ReceiveOutcome, ServiceError, SessionConfig,
    SessionError,
};
use ryxmsg_harness::{
    Item, ScriptedService, StreamEnd,
    events::{incoming_request, member_added, noise},
};
use ryxmsg_proto::{EventType, GroupEvent};

const PEER_PK: [u8; 32] = [0xb0; 32];
const GROUP_PK: [u8; 32] = [0xc7; 32];

async fn activated(service: &ScriptedService) -> ActivatedGroup {
    let contact = ryxmsg_proto::Contact {
        pk: PEER_PK.to_vec(),
        public_rendezvous_seed: vec![0x11; 32],
        metadata: vec![],
    };
    let peer = PeerIdentity::from_bytes(contact.to_bytes().unwrap()).unwrap();
    HandshakeCoordinator::new(service, &SessionConfig::default())
        .initiate_contact(&peer)
        .await
        .unwrap()
}

fn group_service(events: Vec<GroupEvent>, end: StreamEnd) -> ScriptedService {
    ScriptedService::new().with_group(&PEER_PK, &GROUP_PK).with_metadata(&GROUP_PK, events, end)
}

#[tokio::test]
async fn ready_on_first_member_added() {
    let mut events = noise();
    events.push(member_added(&PEER_PK));
    events.push(member_added(&[0x44; 32]));
    let service = group_service(events, StreamEnd::Pending);
    let group = activated(&service).await;

    let ready =
        ReadinessWaiter::new(&service).wait_until_ready(group, &CancellationToken::new()).await.unwrap();

    assert_eq!(ready.ready_at(), noise().len() as u64);
    assert_eq!(ready.contact_pk(), PEER_PK);
    assert_eq!(service.open_subscriptions(), 0);
}

#[tokio::test]
async fn ended_stream_without_member_is_an_error() {
    let service = group_service(vec![incoming_request(&PEER_PK)], StreamEnd::End);
    let group = activated(&service).await;

    let result = ReadinessWaiter::new(&service).wait_until_ready(group, &CancellationToken::new()).await;

    assert_eq!(
        result,
        Err(SessionError::Protocol {
            operation: "wait_until_ready",
            source: ProtocolFault::EndedEarly { expected: "a member joined" },
        })
    );
    assert_eq!(service.open_subscriptions(), 0);
}

#[tokio::test]
async fn stream_failure_is_returned() {
    let service = ScriptedService::new().with_group(&PEER_PK, &GROUP_PK).with_metadata_items(
        &GROUP_PK,
        vec![
            Item::Event(GroupEvent::Other(EventType::GroupDeviceChainKeyAdded)),
            Item::Fail(ServiceError::Stream("reset".into())),
            Item::Event(member_added(&PEER_PK)),
        ],
        StreamEnd::End,
    );
    let group = activated(&service).await;

    let result = ReadinessWaiter::new(&service).wait_until_ready(group, &CancellationToken::new()).await;

    assert!(matches!(
        result,
        Err(SessionError::Protocol { operation: "wait_until_ready", source: ProtocolFault::Service(_) })
    ));
    assert_eq!(service.open_subscriptions(), 0);
}

#[tokio::test]
async fn cancel_releases_pending_wait() {
    let service = group_service(noise(), StreamEnd::Pending);
    let group = activated(&service).await;
    let cancel = CancellationToken::new();

    let waiter = ReadinessWaiter::new(&service);
    let trigger = cancel.clone();
    let (result, ()) = tokio::join!(waiter.wait_until_ready(group, &cancel), async move {
        tokio::task::yield_now().await;
        trigger.cancel();
    });

    assert_eq!(result, Err(SessionError::Cancelled));
    assert_eq!(service.subscriptions_opened(), 1);
    assert_eq!(service.open_subscriptions(), 0);
}

#[tokio::test(start_paused = true)]
async fn deadline_bounds_the_wait() {
    let service = group_service(noise(), StreamEnd::Pending);
    let group = activated(&service).await;

    let result = ReadinessWaiter::new(&service)
        .with_timeout(Some(Duration::from_secs(30)))
        .wait_until_ready(group, &CancellationToken::new())
        .await;

    assert_eq!(
        result,
        Err(SessionError::TimedOut { operation: "wait_until_ready", after: Duration::from_secs(30) })
    );
    assert_eq!(service.open_subscriptions(), 0);
}

#[tokio::test]
async fn receive_takes_only_the_first_message() {
    let service = group_service(vec![member_added(&PEER_PK)], StreamEnd::End).with_messages(
        &GROUP_PK,
        vec![b"one".to_vec(), b"two".to_vec()],
        StreamEnd::Pending,
    );
    let group = activated(&service).await;
    let cancel = CancellationToken::new();
    let ready = ReadinessWaiter::new(&service).wait_until_ready(group, &cancel).await.unwrap();

    let outcome = MessageExchanger::new(&service).receive_once(&ready, &cancel).await.unwrap();

    assert_eq!(outcome, ReceiveOutcome::Message(MessageEvent { payload: b"one".to_vec(), cursor: 0 }));
    assert_eq!(service.open_subscriptions(), 0);
}

#[tokio::test]
async fn receive_on_ended_stream_reports_end() {
    let service = group_service(vec![member_added(&PEER_PK)], StreamEnd::End);
    let group = activated(&service).await;
    let cancel = CancellationToken::new();
    let ready = ReadinessWaiter::new(&service).wait_until_ready(group, &cancel).await.unwrap();

    let outcome = MessageExchanger::new(&service).receive_once(&ready, &cancel).await.unwrap();

    assert_eq!(outcome, ReceiveOutcome::StreamEnded);
    assert_eq!(service.open_subscriptions(), 0);
}

#[tokio::test]
async fn send_publishes_once_to_the_group() {
    let service = group_service(vec![member_added(&PEER_PK)], StreamEnd::End);
    let group = activated(&service).await;
    let ready =
        ReadinessWaiter::new(&service).wait_until_ready(group, &CancellationToken::new()).await.unwrap();

    MessageExchanger::new(&service).send_once(&ready, b"payload").await.unwrap();

    assert_eq!(service.sent(), vec![(GROUP_PK.to_vec(), b"payload".to_vec())]);
}

fn noise_event() -> impl Strategy<Value = GroupEvent> {
    prop_oneof![
        Just(GroupEvent::Other(EventType::AccountGroupJoined)),
        Just(GroupEvent::Other(EventType::GroupDeviceChainKeyAdded)),
        Just(GroupEvent::Other(EventType::GroupMetadataPayloadSent)),
        any::<[u8; 4]>().prop_map(|pk| incoming_request(&pk)),
        (3000u16..4000).prop_map(|event_type| GroupEvent::Unrecognized { event_type }),
    ]
}

proptest! {
    #[test]
    fn readiness_waits_for_member_added(prefix in prop::collection::vec(noise_event(), 0..32)) {
        let runtime = tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap();
        runtime.block_on(async {
            let mut events = prefix.clone();
            events.push(member_added(&PEER_PK));
            let service = group_service(events, StreamEnd::Pending);
            let group = activated(&service).await;

            let ready = ReadinessWaiter::new(&service)
                .wait_until_ready(group, &CancellationToken::new())
                .await
                .unwrap();

            assert_eq!(ready.ready_at(), prefix.len() as u64);
            assert_eq!(service.open_subscriptions(), 0);
        });
    }

    #[test]
    fn readiness_never_confirmed_by_noise_alone(prefix in prop::collection::vec(noise_event(), 0..32)) {
        let runtime = tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap();
        let result = runtime.block_on(async {
            let service = group_service(prefix, StreamEnd::End);
            let group = activated(&service).await;
            ReadinessWaiter::new(&service).wait_until_ready(group, &CancellationToken::new()).await
        });

        prop_assert!(matches!(
            result,
            Err(SessionError::Protocol { source: ProtocolFault::EndedEarly { .. }, .. })
        ), "{result:?}");
    }
}
