mod utils;

use chorus_core::{Action, Envelope, PeerId};
use utils::{TestClient, init_tracing, spawn_relay};

const OFFER_SDP: &str = "v=0\r\nm=audio 9 UDP/TLS/RTP/SAVPF 111\r\na=rtpmap:111 opus/48000/2\r\n";

async fn paired_clients(addr: std::net::SocketAddr) -> (TestClient, TestClient) {
    let mut alice = TestClient::connect(addr).await.unwrap();
    let mut bob = TestClient::connect(addr).await.unwrap();
    alice.join("studio").await.unwrap();
    bob.join("studio").await.unwrap();
    alice.recv_action(Action::Join).await.unwrap();
    (alice, bob)
}

#[tokio::test]
async fn offers_reach_their_recipient_verbatim() {
    init_tracing();
    let addr = spawn_relay(10).await;
    let (mut alice, mut bob) = paired_clients(addr).await;

    let mut offer = Envelope::offer(OFFER_SDP, bob.peer_id.clone());
    offer.channel = Some("studio".into());
    alice.send(&offer).await.unwrap();

    let received = bob.recv_action(Action::Offer).await.unwrap();
    assert_eq!(received.sdp.as_deref(), Some(OFFER_SDP));
    assert_eq!(received.channel.as_deref(), Some("studio"));
    assert_eq!(received.sender, Some(alice.peer_id.clone()));
    assert!(alice.silent().await);
}

#[tokio::test]
async fn sender_identity_comes_from_the_connection() {
    init_tracing();
    let addr = spawn_relay(10).await;
    let (mut alice, mut bob) = paired_clients(addr).await;

    // A spoofed sender field is overwritten before forwarding.
    let mut candidate = Envelope::candidate("candidate:1 1 udp 1 1.2.3.4 40000 typ host", bob.peer_id.clone());
    candidate.sender = Some(PeerId::new());
    alice.send(&candidate).await.unwrap();

    let received = bob.recv_action(Action::Candidate).await.unwrap();
    assert_eq!(received.sender, Some(alice.peer_id.clone()));
}

#[tokio::test]
async fn answers_flow_back_to_the_offerer() {
    init_tracing();
    let addr = spawn_relay(10).await;
    let (mut alice, mut bob) = paired_clients(addr).await;

    alice
        .send(&Envelope::offer(OFFER_SDP, bob.peer_id.clone()))
        .await
        .unwrap();
    bob.recv_action(Action::Offer).await.unwrap();

    bob.send(&Envelope::answer(OFFER_SDP, alice.peer_id.clone()))
        .await
        .unwrap();
    let answer = alice.recv_action(Action::Answer).await.unwrap();
    assert_eq!(answer.sender, Some(bob.peer_id.clone()));
    assert_eq!(answer.sdp.as_deref(), Some(OFFER_SDP));
}

#[tokio::test]
async fn unknown_recipient_is_a_logged_no_op() {
    init_tracing();
    let addr = spawn_relay(10).await;
    let (mut alice, mut bob) = paired_clients(addr).await;

    alice
        .send(&Envelope::offer(OFFER_SDP, PeerId::new()))
        .await
        .unwrap();
    assert!(bob.silent().await);

    // The connection survives and keeps relaying.
    alice
        .send(&Envelope::offer(OFFER_SDP, bob.peer_id.clone()))
        .await
        .unwrap();
    let received = bob.recv_action(Action::Offer).await.unwrap();
    assert_eq!(received.sender, Some(alice.peer_id.clone()));
}

#[tokio::test]
async fn malformed_frames_do_not_kill_the_connection() {
    init_tracing();
    let addr = spawn_relay(10).await;
    let (mut alice, mut bob) = paired_clients(addr).await;

    alice.send_raw("this is not json").await.unwrap();
    alice.send_raw(r#"{"action":"shout"}"#).await.unwrap();
    // Parseable but invalid: an offer without a recipient.
    alice.send_raw(r#"{"action":"offer","sdp":"v=0"}"#).await.unwrap();

    alice
        .send(&Envelope::offer(OFFER_SDP, bob.peer_id.clone()))
        .await
        .unwrap();
    let received = bob.recv_action(Action::Offer).await.unwrap();
    assert_eq!(received.sender, Some(alice.peer_id.clone()));
}

#[tokio::test]
async fn ipaddr_replies_carry_addresses() {
    init_tracing();
    let addr = spawn_relay(10).await;

    let mut alice = TestClient::connect(addr).await.unwrap();
    alice.send(&Envelope::ipaddr_request()).await.unwrap();

    // The host may expose any number of interfaces; whatever comes back
    // before the next direct reply must be a well-formed address report.
    alice.send(&Envelope::join("studio")).await.unwrap();
    loop {
        let envelope = alice.recv().await.unwrap();
        match envelope.action {
            Action::Ipaddr => {
                assert!(envelope.address.is_some());
            }
            Action::Created => break,
            other => panic!("Unexpected {other:?} envelope"),
        }
    }
}
