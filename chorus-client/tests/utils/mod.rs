#![allow(dead_code)]

use async_trait::async_trait;
use chorus_client::{
    ClientConfig, ClientEvent, ClientHandle, NegotiationError, SdpKind, SessionEvent,
    SessionFactory, SignalTransport, SignalingClient, SignalingError, TransportSession,
};
use chorus_core::{Action, Envelope, PeerId};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;

/// A local description as a browser would hand it out: opus without the
/// stereo suffix, a video codec to strip, an oversized bitrate line.
pub const RAW_OFFER: &str = "v=0\r\n\
    o=- 1 1 IN IP4 127.0.0.1\r\n\
    b=AS:300\r\n\
    m=audio 9 UDP/TLS/RTP/SAVPF 111 100\r\n\
    a=rtpmap:111 opus/48000\r\n\
    a=rtpmap:100 VP8/90000";

pub const RAW_ANSWER: &str = "v=0\r\n\
    o=- 2 2 IN IP4 127.0.0.1\r\n\
    b=AS:300\r\n\
    m=audio 9 UDP/TLS/RTP/SAVPF 111\r\n\
    a=rtpmap:111 opus/48000";

/// Everything a transport session was asked to do, for assertions.
#[derive(Default)]
pub struct SessionLog {
    pub local_descriptions: Vec<(SdpKind, String)>,
    pub remote_descriptions: Vec<(SdpKind, String)>,
    pub applied_candidates: Vec<String>,
    pub closed: usize,
}

/// Transport session that records every call instead of negotiating.
pub struct MockSession {
    log: Arc<Mutex<SessionLog>>,
}

impl MockSession {
    pub fn new() -> (Self, Arc<Mutex<SessionLog>>) {
        let log = Arc::new(Mutex::new(SessionLog::default()));
        (Self { log: log.clone() }, log)
    }
}

#[async_trait]
impl TransportSession for MockSession {
    async fn create_offer(&self) -> anyhow::Result<String> {
        Ok(RAW_OFFER.to_owned())
    }

    async fn create_answer(&self) -> anyhow::Result<String> {
        Ok(RAW_ANSWER.to_owned())
    }

    async fn set_local_description(&self, kind: SdpKind, sdp: String) -> anyhow::Result<()> {
        self.log.lock().unwrap().local_descriptions.push((kind, sdp));
        Ok(())
    }

    async fn set_remote_description(&self, kind: SdpKind, sdp: String) -> anyhow::Result<()> {
        self.log.lock().unwrap().remote_descriptions.push((kind, sdp));
        Ok(())
    }

    async fn add_remote_candidate(&self, candidate: String) -> anyhow::Result<()> {
        self.log.lock().unwrap().applied_candidates.push(candidate);
        Ok(())
    }

    async fn close(&self) -> anyhow::Result<()> {
        self.log.lock().unwrap().closed += 1;
        Ok(())
    }
}

/// Relay transport that records emissions and subscriptions in memory.
#[derive(Default)]
pub struct MockTransport {
    emitted: Mutex<Vec<Envelope>>,
    subscribed: Mutex<HashSet<String>>,
}

impl MockTransport {
    pub fn emitted(&self) -> Vec<Envelope> {
        self.emitted.lock().unwrap().clone()
    }

    pub fn emitted_with(&self, action: Action) -> Vec<Envelope> {
        self.emitted()
            .into_iter()
            .filter(|e| e.action == action)
            .collect()
    }

    pub fn is_subscribed(&self, channel: &str) -> bool {
        self.subscribed.lock().unwrap().contains(channel)
    }
}

#[async_trait]
impl SignalTransport for MockTransport {
    async fn emit(&self, envelope: Envelope) -> Result<(), SignalingError> {
        self.emitted.lock().unwrap().push(envelope);
        Ok(())
    }

    fn subscribe(&self, channel: &str) {
        self.subscribed.lock().unwrap().insert(channel.to_owned());
    }

    fn unsubscribe(&self, channel: &str) {
        self.subscribed.lock().unwrap().remove(channel);
    }
}

/// Session factory handing out [`MockSession`]s, with optional capture
/// failure on the first non-receiver attempt.
pub struct MockFactory {
    media_available: bool,
    logs: Mutex<HashMap<PeerId, Arc<Mutex<SessionLog>>>>,
    requests: Mutex<Vec<(PeerId, bool)>>,
    event_taps: Mutex<HashMap<PeerId, mpsc::Sender<SessionEvent>>>,
}

impl MockFactory {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            media_available: true,
            logs: Mutex::default(),
            requests: Mutex::default(),
            event_taps: Mutex::default(),
        })
    }

    pub fn without_capture() -> Arc<Self> {
        Arc::new(Self {
            media_available: false,
            logs: Mutex::default(),
            requests: Mutex::default(),
            event_taps: Mutex::default(),
        })
    }

    /// Call log for the most recent session built for `remote_id`.
    pub fn log_for(&self, remote_id: &PeerId) -> Option<Arc<Mutex<SessionLog>>> {
        self.logs.lock().unwrap().get(remote_id).cloned()
    }

    /// Every `(remote_id, receiver_only)` pair `create` was called with.
    pub fn requests(&self) -> Vec<(PeerId, bool)> {
        self.requests.lock().unwrap().clone()
    }

    /// Sender feeding the client loop with this session's events, for
    /// simulating candidates and connectivity changes.
    pub fn events_for(&self, remote_id: &PeerId) -> mpsc::Sender<SessionEvent> {
        self.event_taps
            .lock()
            .unwrap()
            .get(remote_id)
            .cloned()
            .expect("no session was built for this peer")
    }
}

#[async_trait]
impl SessionFactory for MockFactory {
    async fn create(
        &self,
        remote_id: PeerId,
        receiver_only: bool,
        events: mpsc::Sender<SessionEvent>,
    ) -> Result<Box<dyn TransportSession>, NegotiationError> {
        self.requests
            .lock()
            .unwrap()
            .push((remote_id.clone(), receiver_only));

        if !self.media_available && !receiver_only {
            return Err(NegotiationError::MediaAcquisition(
                "no capture device".to_owned(),
            ));
        }

        let (session, log) = MockSession::new();
        self.logs.lock().unwrap().insert(remote_id.clone(), log);
        self.event_taps.lock().unwrap().insert(remote_id, events);
        Ok(Box::new(session))
    }
}

/// A [`SignalingClient`] running on its own task, plus the handles the
/// tests poke it through.
pub struct TestClient {
    pub local_id: PeerId,
    pub handle: ClientHandle,
    pub events: mpsc::UnboundedReceiver<ClientEvent>,
    pub inbox: mpsc::UnboundedSender<Envelope>,
    pub transport: Arc<MockTransport>,
    pub factory: Arc<MockFactory>,
}

impl TestClient {
    pub fn spawn(factory: Arc<MockFactory>) -> Self {
        let local_id = PeerId::new();
        let transport = Arc::new(MockTransport::default());
        let (inbox_tx, inbox_rx) = mpsc::unbounded_channel();

        let (client, handle, events) = SignalingClient::new(
            local_id.clone(),
            ClientConfig::default(),
            transport.clone(),
            factory.clone(),
            inbox_rx,
        );
        tokio::spawn(client.run());

        Self {
            local_id,
            handle,
            events,
            inbox: inbox_tx,
            transport,
            factory,
        }
    }

    /// Deliver an envelope as if the relay had pushed it.
    pub fn push(&self, envelope: Envelope) {
        self.inbox.send(envelope).expect("client loop is gone");
    }

    pub async fn next_event(&mut self) -> ClientEvent {
        tokio::time::timeout(Duration::from_secs(2), self.events.recv())
            .await
            .expect("timed out waiting for a client event")
            .expect("event channel closed")
    }

    /// Enter a room and wait for the relay round trip to finish.
    pub async fn enter_room(&mut self, room: &str) {
        self.handle.join_room(room).await;
        wait_until(|| !self.transport.emitted_with(Action::Join).is_empty()).await;
        self.push(Envelope::created(room, self.local_id.clone()));
        assert_eq!(
            self.next_event().await,
            ClientEvent::RoomCreated {
                channel: room.to_owned()
            }
        );
    }
}

/// Poll until `condition` holds, panicking after about a second.
pub async fn wait_until(mut condition: impl FnMut() -> bool) {
    for _ in 0..200 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("condition was not reached in time");
}

/// Stamp a relayed envelope with its originating peer.
pub fn from_peer(mut envelope: Envelope, sender: &PeerId) -> Envelope {
    envelope.sender = Some(sender.clone());
    envelope
}
