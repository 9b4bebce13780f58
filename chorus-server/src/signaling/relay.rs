use crate::config::ServerConfig;
use crate::room::{JoinOutcome, RoomRegistry};
use axum::extract::ws::Message;
use chorus_core::{Action, Envelope, PeerId};
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

struct RelayInner {
    peers: DashMap<PeerId, mpsc::UnboundedSender<Message>>,
    rooms: RoomRegistry,
    config: ServerConfig,
}

/// The rendezvous relay: introduces peers inside named rooms and
/// forwards their negotiation envelopes. It never carries media.
#[derive(Clone)]
pub struct RelayService {
    inner: Arc<RelayInner>,
}

impl RelayService {
    pub fn new(config: ServerConfig) -> Self {
        Self {
            inner: Arc::new(RelayInner {
                peers: DashMap::new(),
                rooms: RoomRegistry::new(),
                config,
            }),
        }
    }

    pub fn config(&self) -> &ServerConfig {
        &self.inner.config
    }

    pub fn add_peer(&self, peer_id: PeerId, tx: mpsc::UnboundedSender<Message>) {
        self.inner.peers.insert(peer_id, tx);
    }

    /// Forget a disconnected peer: drop its outbox, remove it from every
    /// room and tell each room's remaining members it left.
    pub fn remove_peer(&self, peer_id: &PeerId) {
        self.inner.peers.remove(peer_id);

        for (channel, remaining) in self.inner.rooms.leave_all(peer_id) {
            info!("Client {peer_id} dropped out of room '{channel}'");
            for member in remaining {
                self.send(&member, &Envelope::leave(channel.clone(), peer_id.clone()));
            }
        }
    }

    /// Process one validated envelope from `sender`. Never fails: bad
    /// input is logged and dropped, the connection stays open.
    pub fn handle_envelope(&self, sender: &PeerId, envelope: Envelope) {
        match envelope.action {
            Action::Join => self.handle_join(sender, envelope),
            Action::Offer | Action::Answer | Action::Candidate => {
                self.relay(sender, envelope);
            }
            Action::Leave => self.handle_leave(sender, envelope),
            Action::Ipaddr => self.handle_ipaddr(sender),
            Action::Created | Action::Joined | Action::Full => {
                warn!(
                    "Dropping server-only {:?} envelope from {sender}",
                    envelope.action
                );
            }
        }
    }

    fn handle_join(&self, sender: &PeerId, envelope: Envelope) {
        let Some(channel) = envelope.channel else {
            warn!("Dropping join without a channel from {sender}");
            return;
        };

        info!("Received request to create or join room '{channel}'");

        match self
            .inner
            .rooms
            .join(&channel, sender.clone(), self.inner.config.max_clients)
        {
            JoinOutcome::Created => {
                info!("Client {sender} created room '{channel}'");
                self.send(sender, &Envelope::created(channel, sender.clone()));
            }
            JoinOutcome::Joined { others } => {
                info!(
                    "Client {sender} joined room '{channel}' ({} member(s) present)",
                    others.len()
                );
                self.send(sender, &Envelope::joined(channel.clone(), sender.clone()));

                let announcement = Envelope::peer_joined(channel, sender.clone());
                for member in others {
                    self.send(&member, &announcement);
                }
            }
            JoinOutcome::Full => {
                info!("Room '{channel}' is full; rejecting {sender}");
                self.send(sender, &Envelope::full(channel));
            }
        }
    }

    /// Forward a negotiation envelope verbatim to its recipient.
    fn relay(&self, sender: &PeerId, envelope: Envelope) {
        let Some(recipient) = envelope.recipient.clone() else {
            warn!(
                "Dropping {:?} without a recipient from {sender}",
                envelope.action
            );
            return;
        };

        if !self.inner.peers.contains_key(&recipient) {
            info!(
                "Dropping {:?} from {sender}: recipient {recipient} is not connected",
                envelope.action
            );
            return;
        }

        self.send(&recipient, &envelope);
    }

    /// Only the connection's own membership can be given up; an `id`
    /// field naming someone else is ignored.
    fn handle_leave(&self, sender: &PeerId, envelope: Envelope) {
        let Some(channel) = envelope.channel else {
            warn!("Dropping leave without a channel from {sender}");
            return;
        };

        info!("Client {sender} left room '{channel}'");

        if let Some(remaining) = self.inner.rooms.leave(&channel, sender) {
            let notice = Envelope::leave(channel, sender.clone());
            for member in remaining {
                self.send(&member, &notice);
            }
        }
    }

    /// Reply with every non-loopback IPv4 address of this host. Useful
    /// for debugging firewall and connectivity issues; no state changes.
    fn handle_ipaddr(&self, sender: &PeerId) {
        let interfaces = if_addrs::get_if_addrs().unwrap_or_default();
        for interface in interfaces {
            let if_addrs::IfAddr::V4(v4) = &interface.addr else {
                continue;
            };
            if v4.ip.is_loopback() {
                continue;
            }
            self.send(sender, &Envelope::ipaddr(v4.ip.to_string()));
        }
    }

    fn send(&self, peer_id: &PeerId, envelope: &Envelope) {
        let Some(peer) = self.inner.peers.get(peer_id) else {
            warn!("Attempted to send {:?} to disconnected client {peer_id}", envelope.action);
            return;
        };
        match serde_json::to_string(envelope) {
            Ok(json) => {
                if peer.send(Message::Text(json.into())).is_err() {
                    error!("Outbox for {peer_id} is closed");
                }
            }
            Err(e) => error!("Failed to serialize envelope: {e}"),
        }
    }
}
