//! Handshake coordinator against a scripted protocol service.
//!
//! Covers both handshake paths step by step: call ordering, state
//! transitions, what is skipped on the account stream, and how failures at
//! each step abort the rest of the handshake.

use ryxmsg_core::{
    CancellationToken, HandshakeCoordinator, HandshakeState, Incoming, PeerIdentity,
    ProtocolFault, ServiceError, SessionConfig, SessionError,
};
use ryxmsg_harness::{
    Call, Item, ScriptedService, StreamEnd,
    events::{incoming_request, member_added, noise, outgoing_sent, request_accepted},
};
use ryxmsg_proto::{Contact, EventType, GroupEvent};

const PEER_PK: [u8; 32] = [0xb0; 32];
const GROUP_PK: [u8; 32] = [0xc7; 32];

fn peer() -> PeerIdentity {
    let contact =
        Contact { pk: PEER_PK.to_vec(), public_rendezvous_seed: vec![0x11; 32], metadata: vec![] };
    PeerIdentity::from_bytes(contact.to_bytes().unwrap()).unwrap()
}

fn with_account_stream(events: Vec<GroupEvent>, end: StreamEnd) -> ScriptedService {
    let service = ScriptedService::new();
    let account_group = service.account_group_pk().to_vec();
    service.with_metadata(&account_group, events, end).with_group(&PEER_PK, &GROUP_PK)
}

#[tokio::test]
async fn initiate_reaches_group_activated() {
    let service = ScriptedService::new().with_group(&PEER_PK, &GROUP_PK);
    let mut handshake = HandshakeCoordinator::new(&service, &SessionConfig::default());

    let group = handshake.initiate_contact(&peer()).await.unwrap();

    assert_eq!(handshake.state(), HandshakeState::GroupActivated);
    assert_eq!(group.public_key(), GROUP_PK);
    assert_eq!(group.contact_pk(), PEER_PK);
    assert_eq!(
        service.calls(),
        vec![Call::DecodeContact, Call::ContactRequestSend, Call::GroupInfo, Call::ActivateGroup]
    );
}

#[tokio::test]
async fn initiate_twice_is_rejected() {
    let service = ScriptedService::new().with_group(&PEER_PK, &GROUP_PK);
    let mut handshake = HandshakeCoordinator::new(&service, &SessionConfig::default());
    handshake.initiate_contact(&peer()).await.unwrap();

    let second = handshake.initiate_contact(&peer()).await;

    assert_eq!(
        second,
        Err(SessionError::InvalidState {
            state: HandshakeState::GroupActivated,
            operation: "initiate_contact",
        })
    );
    assert_eq!(service.count(Call::ContactRequestSend), 1);

    handshake.reset();
    assert_eq!(handshake.state(), HandshakeState::Idle);
}

#[tokio::test]
async fn unknown_group_stops_before_activation() {
    let service = ScriptedService::new();
    let mut handshake = HandshakeCoordinator::new(&service, &SessionConfig::default());

    let result = handshake.initiate_contact(&peer()).await;

    assert!(matches!(
        result,
        Err(SessionError::Protocol {
            operation: "group_info",
            source: ProtocolFault::Service(ServiceError::NotFound(_)),
        })
    ));
    assert_eq!(handshake.state(), HandshakeState::RequestSent);
    assert_eq!(service.count(Call::ActivateGroup), 0);
}

#[tokio::test]
async fn request_send_failure_stops_the_handshake() {
    let service = ScriptedService::new()
        .with_group(&PEER_PK, &GROUP_PK)
        .failing(Call::ContactRequestSend, ServiceError::Unavailable("offline".into()));
    let mut handshake = HandshakeCoordinator::new(&service, &SessionConfig::default());

    let result = handshake.initiate_contact(&peer()).await;

    assert!(matches!(result, Err(SessionError::Protocol { operation: "contact_request_send", .. })));
    assert_eq!(handshake.state(), HandshakeState::Idle);
    assert_eq!(service.calls(), vec![Call::DecodeContact, Call::ContactRequestSend]);
}

#[tokio::test]
async fn accept_skips_unrelated_events() {
    let mut events = noise();
    events.extend([outgoing_sent(&[0x01; 32]), request_accepted(&[0x02; 32]), member_added(&[0x03; 32])]);
    events.push(incoming_request(&PEER_PK));
    events.push(incoming_request(&[0x09; 32]));
    let service = with_account_stream(events, StreamEnd::Pending);
    let mut handshake = HandshakeCoordinator::new(&service, &SessionConfig::default());

    let incoming = handshake.accept_incoming(&CancellationToken::new()).await.unwrap();

    let Incoming::Accepted(group) = incoming else { panic!("expected an accepted request") };
    assert_eq!(group.contact_pk(), PEER_PK);
    assert_eq!(service.accepted(), vec![PEER_PK.to_vec()]);
    assert_eq!(handshake.state(), HandshakeState::GroupActivated);
    assert_eq!(service.open_subscriptions(), 0);
}

#[tokio::test]
async fn accept_skips_requests_already_accepted() {
    const OTHER_PK: [u8; 32] = [0xd4; 32];
    let events = vec![
        incoming_request(&PEER_PK),
        incoming_request(&OTHER_PK),
        request_accepted(&PEER_PK),
    ];
    let service = with_account_stream(events, StreamEnd::Pending).with_group(&OTHER_PK, &GROUP_PK);
    let mut handshake = HandshakeCoordinator::new(&service, &SessionConfig::default());

    let incoming = handshake.accept_incoming(&CancellationToken::new()).await.unwrap();

    let Incoming::Accepted(group) = incoming else { panic!("expected an accepted request") };
    assert_eq!(group.contact_pk(), OTHER_PK);
    assert_eq!(service.accepted(), vec![OTHER_PK.to_vec()]);
    assert_eq!(service.open_subscriptions(), 0);
}

#[tokio::test]
async fn accepted_backlog_only_reports_no_request() {
    let events = vec![incoming_request(&PEER_PK), request_accepted(&PEER_PK)];
    let service = with_account_stream(events, StreamEnd::End);
    let mut handshake = HandshakeCoordinator::new(&service, &SessionConfig::default());

    let incoming = handshake.accept_incoming(&CancellationToken::new()).await.unwrap();

    assert_eq!(incoming, Incoming::NoIncomingRequest);
    assert_eq!(service.count(Call::ContactRequestAccept), 0);
}

#[tokio::test]
async fn accept_on_ended_stream_reports_no_request() {
    let service = with_account_stream(noise(), StreamEnd::End);
    let mut handshake = HandshakeCoordinator::new(&service, &SessionConfig::default());

    let incoming = handshake.accept_incoming(&CancellationToken::new()).await.unwrap();

    assert_eq!(incoming, Incoming::NoIncomingRequest);
    assert_eq!(handshake.state(), HandshakeState::Idle);
    assert_eq!(service.count(Call::ContactRequestAccept), 0);
    assert_eq!(service.open_subscriptions(), 0);
}

#[tokio::test]
async fn accept_surfaces_stream_failure() {
    let service = ScriptedService::new();
    let account_group = service.account_group_pk().to_vec();
    let service = service.with_metadata_items(
        &account_group,
        vec![
            Item::Event(GroupEvent::Other(EventType::AccountGroupJoined)),
            Item::Fail(ServiceError::Stream("connection reset".into())),
            Item::Event(incoming_request(&PEER_PK)),
        ],
        StreamEnd::End,
    );
    let mut handshake = HandshakeCoordinator::new(&service, &SessionConfig::default());

    let result = handshake.accept_incoming(&CancellationToken::new()).await;

    assert_eq!(
        result,
        Err(SessionError::Protocol {
            operation: "accept_incoming",
            source: ProtocolFault::Service(ServiceError::Stream("connection reset".into())),
        })
    );
    assert_eq!(service.count(Call::ContactRequestAccept), 0);
    assert_eq!(service.open_subscriptions(), 0);
}

#[tokio::test]
async fn accept_failure_stops_before_group_lookup() {
    let service = with_account_stream(vec![incoming_request(&PEER_PK)], StreamEnd::Pending)
        .failing(Call::ContactRequestAccept, ServiceError::NotFound("request".into()));
    let mut handshake = HandshakeCoordinator::new(&service, &SessionConfig::default());

    let result = handshake.accept_incoming(&CancellationToken::new()).await;

    assert!(matches!(result, Err(SessionError::Protocol { operation: "contact_request_accept", .. })));
    assert_eq!(handshake.state(), HandshakeState::RequestReceived);
    assert_eq!(service.count(Call::GroupInfo), 0);
}

#[tokio::test]
async fn accept_is_cancellable() {
    let service = with_account_stream(noise(), StreamEnd::Pending);
    let mut handshake = HandshakeCoordinator::new(&service, &SessionConfig::default());
    let cancel = CancellationToken::new();
    cancel.cancel();

    let result = handshake.accept_incoming(&cancel).await;

    assert_eq!(result, Err(SessionError::Cancelled));
    assert_eq!(service.open_subscriptions(), 0);
}

#[tokio::test]
async fn confirm_ready_requires_activation_first() {
    let service = ScriptedService::new()
        .with_group(&PEER_PK, &GROUP_PK)
        .with_metadata(&GROUP_PK, vec![member_added(&PEER_PK)], StreamEnd::End);
    let mut handshake = HandshakeCoordinator::new(&service, &SessionConfig::default());
    let group = handshake.initiate_contact(&peer()).await.unwrap();

    let ready = handshake.confirm_ready(group.clone(), &CancellationToken::new()).await.unwrap();
    assert_eq!(handshake.state(), HandshakeState::Ready);
    assert_eq!(ready.public_key(), GROUP_PK);

    let again = handshake.confirm_ready(group, &CancellationToken::new()).await;
    assert_eq!(
        again,
        Err(SessionError::InvalidState { state: HandshakeState::Ready, operation: "confirm_ready" })
    );
}
