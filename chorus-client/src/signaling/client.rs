use crate::config::ClientConfig;
use crate::error::NegotiationError;
use crate::session::{ConnectionRegistry, NegotiationState, SessionNegotiator};
use crate::signaling::SignalTransport;
use crate::transport::{ConnectivityState, SessionEvent, SessionFactory};
use chorus_core::{Action, Envelope, PeerId};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

/// Commands from the embedding application.
#[derive(Debug)]
pub enum ClientCommand {
    JoinRoom(String),
    LeaveRoom(String),
    LeaveAllRooms,
    Shutdown,
}

/// User-visible happenings, consumed by the UI layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientEvent {
    RoomCreated { channel: String },
    RoomJoined { channel: String },
    RoomFull { channel: String },
    PeerConnected { remote_id: PeerId },
    PeerDisconnected { remote_id: PeerId },
    MediaUnavailable { reason: String },
    ServerAddress { address: String },
}

/// Cloneable handle for steering a running [`SignalingClient`].
#[derive(Clone)]
pub struct ClientHandle {
    tx: mpsc::Sender<ClientCommand>,
}

impl ClientHandle {
    pub async fn join_room(&self, room: impl Into<String>) {
        let _ = self.tx.send(ClientCommand::JoinRoom(room.into())).await;
    }

    pub async fn leave_room(&self, room: impl Into<String>) {
        let _ = self.tx.send(ClientCommand::LeaveRoom(room.into())).await;
    }

    pub async fn leave_all_rooms(&self) {
        let _ = self.tx.send(ClientCommand::LeaveAllRooms).await;
    }

    pub async fn shutdown(&self) {
        let _ = self.tx.send(ClientCommand::Shutdown).await;
    }
}

/// Client-side counterpart of the rendezvous relay.
///
/// A single event loop serializes user commands, inbound envelopes and
/// transport session events, and drives one [`SessionNegotiator`] per
/// remote peer. Negotiations with different peers interleave freely at
/// the await points; steps for one peer always run in program order.
pub struct SignalingClient {
    local_id: PeerId,
    config: ClientConfig,
    transport: Arc<dyn SignalTransport>,
    factory: Arc<dyn SessionFactory>,
    registry: ConnectionRegistry,
    rooms: Vec<String>,
    command_rx: mpsc::Receiver<ClientCommand>,
    inbox: mpsc::UnboundedReceiver<Envelope>,
    session_tx: mpsc::Sender<SessionEvent>,
    session_rx: mpsc::Receiver<SessionEvent>,
    events: mpsc::UnboundedSender<ClientEvent>,
}

impl SignalingClient {
    pub fn new(
        local_id: PeerId,
        config: ClientConfig,
        transport: Arc<dyn SignalTransport>,
        factory: Arc<dyn SessionFactory>,
        inbox: mpsc::UnboundedReceiver<Envelope>,
    ) -> (Self, ClientHandle, mpsc::UnboundedReceiver<ClientEvent>) {
        let (command_tx, command_rx) = mpsc::channel(64);
        let (session_tx, session_rx) = mpsc::channel(256);
        let (events, events_rx) = mpsc::unbounded_channel();

        let client = Self {
            local_id,
            config,
            transport,
            factory,
            registry: ConnectionRegistry::new(),
            rooms: Vec::new(),
            command_rx,
            inbox,
            session_tx,
            session_rx,
            events,
        };
        (client, ClientHandle { tx: command_tx }, events_rx)
    }

    pub fn local_id(&self) -> &PeerId {
        &self.local_id
    }

    pub async fn run(mut self) {
        info!("Signaling client {} started", self.local_id);

        loop {
            tokio::select! {
                cmd = self.command_rx.recv() => {
                    match cmd {
                        Some(ClientCommand::Shutdown) | None => {
                            self.shutdown().await;
                            break;
                        }
                        Some(cmd) => self.handle_command(cmd).await,
                    }
                }

                envelope = self.inbox.recv() => {
                    match envelope {
                        Some(envelope) => self.handle_envelope(envelope).await,
                        None => {
                            warn!("Relay inbox closed. Shutting down client.");
                            self.shutdown().await;
                            break;
                        }
                    }
                }

                event = self.session_rx.recv() => {
                    if let Some(event) = event {
                        self.handle_session_event(event).await;
                    }
                }
            }
        }

        info!("Signaling client {} finished", self.local_id);
    }

    async fn handle_command(&mut self, cmd: ClientCommand) {
        match cmd {
            ClientCommand::JoinRoom(room) => {
                info!("Entering room '{room}'");
                self.transport.subscribe(&room);
                self.emit(Envelope::join(room)).await;
            }
            ClientCommand::LeaveRoom(room) => self.leave_room(room).await,
            ClientCommand::LeaveAllRooms => {
                for room in std::mem::take(&mut self.rooms) {
                    self.leave_room(room).await;
                }
            }
            ClientCommand::Shutdown => unreachable!("handled by the loop"),
        }
    }

    async fn leave_room(&mut self, room: String) {
        info!("Leaving room '{room}'");
        self.emit(Envelope::leave(room.clone(), self.local_id.clone()))
            .await;
        self.transport.unsubscribe(&room);
        self.rooms.retain(|r| r != &room);

        // The room is gone from our point of view; its negotiators go too.
        for mut negotiator in self.registry.remove_channel(&room) {
            let remote_id = negotiator.remote_id().clone();
            if negotiator.disconnect().await {
                self.notify(ClientEvent::PeerDisconnected { remote_id });
            }
        }
    }

    async fn shutdown(&mut self) {
        for room in std::mem::take(&mut self.rooms) {
            self.emit(Envelope::leave(room.clone(), self.local_id.clone()))
                .await;
            self.transport.unsubscribe(&room);
        }
        for mut negotiator in self.registry.drain() {
            negotiator.disconnect().await;
        }
    }

    async fn handle_envelope(&mut self, envelope: Envelope) {
        if let Err(e) = envelope.validate() {
            warn!("Dropping malformed envelope: {e}");
            return;
        }

        match envelope.action {
            Action::Created => {
                if let Some(channel) = envelope.channel {
                    info!("Created room '{channel}'");
                    self.rooms.push(channel.clone());
                    self.notify(ClientEvent::RoomCreated { channel });
                }
            }

            Action::Joined => {
                if let Some(channel) = envelope.channel {
                    info!("Joined room '{channel}'");
                    self.rooms.push(channel.clone());
                    self.notify(ClientEvent::RoomJoined { channel });
                }
            }

            Action::Full => {
                if let Some(channel) = envelope.channel {
                    warn!("Room '{channel}' is full");
                    self.transport.unsubscribe(&channel);
                    self.notify(ClientEvent::RoomFull { channel });
                }
            }

            Action::Join => self.handle_peer_joined(envelope).await,
            Action::Offer => self.handle_offer(envelope).await,
            Action::Answer => self.handle_answer(envelope).await,
            Action::Candidate => self.handle_candidate(envelope).await,
            Action::Leave => self.handle_peer_left(envelope).await,

            Action::Ipaddr => {
                if let Some(address) = envelope.address {
                    info!("Relay reachable at {address}");
                    self.notify(ClientEvent::ServerAddress { address });
                }
            }
        }
    }

    /// Someone else entered a room we are in: we are the offering side.
    async fn handle_peer_joined(&mut self, envelope: Envelope) {
        let Some(remote_id) = envelope.id else {
            warn!("join broadcast without peer id");
            return;
        };
        if remote_id == self.local_id {
            return;
        }
        let Some(channel) = self.resolve_channel(envelope.channel, &remote_id) else {
            warn!("Cannot place joining peer {remote_id} in a room");
            return;
        };

        info!("'{remote_id}' joined '{channel}'");

        // A negotiator already existed: tear the stale one down before
        // the replacement takes its slot.
        if let Some(mut stale) = self.registry.remove(&channel, &remote_id) {
            warn!("Replacing stale negotiator for {remote_id}");
            if stale.disconnect().await {
                self.notify(ClientEvent::PeerDisconnected {
                    remote_id: remote_id.clone(),
                });
            }
        }

        let Some(mut negotiator) = self.create_negotiator(&channel, remote_id.clone()).await
        else {
            return;
        };
        if let Err(e) = negotiator.initiate().await {
            error!("Negotiation with {remote_id} failed: {e}");
            negotiator.disconnect().await;
            return;
        }
        self.registry.insert(channel, remote_id, negotiator);
    }

    async fn handle_offer(&mut self, envelope: Envelope) {
        let (Some(remote_id), Some(sdp)) = (envelope.sender.clone(), envelope.sdp.clone()) else {
            warn!("offer without sender");
            return;
        };
        let Some(channel) = self.resolve_channel(envelope.channel, &remote_id) else {
            warn!("Cannot place offer from {remote_id} in a room");
            return;
        };

        debug!("Offer received from {remote_id}");

        // The slot may be occupied because candidates or an earlier offer
        // got here first; release the stale negotiator without a second
        // relay teardown and let a fresh one take over.
        if let Some(mut stale) = self.registry.remove(&channel, &remote_id) {
            warn!("Negotiator for {remote_id} already existed at offer");
            stale.reconnect();
        }

        let Some(mut negotiator) = self.create_negotiator(&channel, remote_id.clone()).await
        else {
            return;
        };
        if let Err(e) = negotiator.handle_offer(&sdp).await {
            error!("Failed to answer {remote_id}: {e}");
            negotiator.disconnect().await;
            return;
        }
        self.registry.insert(channel, remote_id, negotiator);
    }

    async fn handle_answer(&mut self, envelope: Envelope) {
        let (Some(remote_id), Some(sdp)) = (envelope.sender, envelope.sdp) else {
            warn!("answer without sender");
            return;
        };

        // Only meaningful when we offered; anything else is noise.
        let negotiator = match self.find_negotiator(envelope.channel.as_deref(), &remote_id) {
            Some(negotiator) if negotiator.offered() => negotiator,
            _ => {
                warn!("Unexpected answer from {remote_id} to {}", self.local_id);
                return;
            }
        };

        debug!("Answer received from {remote_id}");
        if let Err(e) = negotiator.handle_answer(&sdp).await {
            error!("Failed to apply answer from {remote_id}: {e}");
        }
    }

    async fn handle_candidate(&mut self, envelope: Envelope) {
        let (Some(remote_id), Some(candidate)) = (envelope.sender, envelope.candidate) else {
            warn!("candidate without sender");
            return;
        };

        let negotiator = match self.find_negotiator(envelope.channel.as_deref(), &remote_id) {
            Some(negotiator) if negotiator.offered() || negotiator.answered() => negotiator,
            _ => {
                warn!("Unexpected candidate from {remote_id} to {}", self.local_id);
                return;
            }
        };

        negotiator.add_remote_candidate(candidate).await;
    }

    async fn handle_peer_left(&mut self, envelope: Envelope) {
        let Some(remote_id) = envelope.id.or(envelope.sender) else {
            warn!("leave without peer id");
            return;
        };

        let removed: Vec<SessionNegotiator> = match &envelope.channel {
            Some(channel) => self.registry.remove(channel, &remote_id).into_iter().collect(),
            None => self.registry.remove_all(&remote_id),
        };

        for mut negotiator in removed {
            info!("{remote_id} left");
            if negotiator.disconnect().await {
                self.notify(ClientEvent::PeerDisconnected {
                    remote_id: remote_id.clone(),
                });
            }
        }
    }

    async fn handle_session_event(&mut self, event: SessionEvent) {
        match event {
            SessionEvent::CandidateGenerated {
                remote_id,
                candidate,
            } => {
                let Some(channel) = self.registry.channel_of(&remote_id).map(str::to_owned)
                else {
                    debug!("Dropping local candidate for departed peer {remote_id}");
                    return;
                };
                let mut envelope = Envelope::candidate(candidate, remote_id);
                envelope.channel = Some(channel);
                self.emit(envelope).await;
            }

            SessionEvent::Connectivity { remote_id, state } => {
                let Some(negotiator) = self.registry.find_mut(&remote_id) else {
                    return;
                };
                let was_connected = negotiator.state() == NegotiationState::Connected;
                if negotiator.on_connectivity_change(state).await {
                    // Terminal: drop every registration for this identity.
                    for mut stale in self.registry.remove_all(&remote_id) {
                        stale.disconnect().await;
                    }
                    self.notify(ClientEvent::PeerDisconnected { remote_id });
                } else if !was_connected && state == ConnectivityState::Connected {
                    self.notify(ClientEvent::PeerConnected { remote_id });
                }
            }
        }
    }

    /// Build a negotiator for a remote peer, falling back to a
    /// receiver-only session when local capture is unavailable.
    async fn create_negotiator(
        &mut self,
        channel: &str,
        remote_id: PeerId,
    ) -> Option<SessionNegotiator> {
        let mut receiver_only = self.config.receiver_only;

        let session = match self
            .factory
            .create(remote_id.clone(), receiver_only, self.session_tx.clone())
            .await
        {
            Ok(session) => session,
            Err(NegotiationError::MediaAcquisition(reason)) if !receiver_only => {
                warn!("Local capture unavailable ({reason}); continuing receive-only");
                self.notify(ClientEvent::MediaUnavailable {
                    reason: reason.clone(),
                });
                receiver_only = true;
                match self
                    .factory
                    .create(remote_id.clone(), receiver_only, self.session_tx.clone())
                    .await
                {
                    Ok(session) => session,
                    Err(e) => {
                        error!("Failed to create session for {remote_id}: {e}");
                        return None;
                    }
                }
            }
            Err(e) => {
                error!("Failed to create session for {remote_id}: {e}");
                return None;
            }
        };

        Some(SessionNegotiator::new(
            remote_id,
            channel,
            session,
            self.transport.clone(),
            self.config.sdp_policy.clone(),
        ))
    }

    /// Channel for an inbound envelope: explicit channel, an existing
    /// registration, or the only room we are in.
    fn resolve_channel(&self, channel: Option<String>, remote_id: &PeerId) -> Option<String> {
        channel
            .or_else(|| self.registry.channel_of(remote_id).map(str::to_owned))
            .or_else(|| self.rooms.last().cloned())
    }

    fn find_negotiator(
        &mut self,
        channel: Option<&str>,
        remote_id: &PeerId,
    ) -> Option<&mut SessionNegotiator> {
        match channel {
            Some(channel) if self.registry.contains(channel, remote_id) => {
                self.registry.get_mut(channel, remote_id)
            }
            _ => self.registry.find_mut(remote_id),
        }
    }

    async fn emit(&self, envelope: Envelope) {
        if let Err(e) = self.transport.emit(envelope).await {
            error!("Failed to reach relay: {e}");
        }
    }

    fn notify(&self, event: ClientEvent) {
        let _ = self.events.send(event);
    }
}
