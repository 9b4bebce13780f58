use crate::session::SessionNegotiator;
use chorus_core::PeerId;
use std::collections::HashMap;

/// channel -> remote id -> live negotiator.
///
/// The registry is the sole owner of negotiator lifetime and is itself
/// owned by the client event-loop task, which serializes every mutation;
/// `remove_all` can therefore never interleave with `insert`.
#[derive(Default)]
pub struct ConnectionRegistry {
    channels: HashMap<String, HashMap<PeerId, SessionNegotiator>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_mut(
        &mut self,
        channel: &str,
        remote_id: &PeerId,
    ) -> Option<&mut SessionNegotiator> {
        self.channels.get_mut(channel)?.get_mut(remote_id)
    }

    pub fn contains(&self, channel: &str, remote_id: &PeerId) -> bool {
        self.channels
            .get(channel)
            .is_some_and(|peers| peers.contains_key(remote_id))
    }

    /// Register a negotiator, returning a displaced stale one if the
    /// (channel, remote) slot was occupied.
    pub fn insert(
        &mut self,
        channel: impl Into<String>,
        remote_id: PeerId,
        negotiator: SessionNegotiator,
    ) -> Option<SessionNegotiator> {
        self.channels
            .entry(channel.into())
            .or_default()
            .insert(remote_id, negotiator)
    }

    pub fn remove(&mut self, channel: &str, remote_id: &PeerId) -> Option<SessionNegotiator> {
        let peers = self.channels.get_mut(channel)?;
        let removed = peers.remove(remote_id);
        if peers.is_empty() {
            self.channels.remove(channel);
        }
        removed
    }

    /// Remove the negotiator for `remote_id` from every channel it
    /// participates in. Disconnect notifications carry only an identity,
    /// not a channel.
    pub fn remove_all(&mut self, remote_id: &PeerId) -> Vec<SessionNegotiator> {
        let mut removed = Vec::new();
        self.channels.retain(|_, peers| {
            if let Some(negotiator) = peers.remove(remote_id) {
                removed.push(negotiator);
            }
            !peers.is_empty()
        });
        removed
    }

    /// Remove every negotiator in a channel (used when leaving a room).
    pub fn remove_channel(&mut self, channel: &str) -> Vec<SessionNegotiator> {
        self.channels
            .remove(channel)
            .map(|peers| peers.into_values().collect())
            .unwrap_or_default()
    }

    /// First negotiator for `remote_id` in any channel. Relayed
    /// envelopes without a channel are resolved through this.
    pub fn find_mut(&mut self, remote_id: &PeerId) -> Option<&mut SessionNegotiator> {
        self.channels
            .values_mut()
            .find_map(|peers| peers.get_mut(remote_id))
    }

    /// Channel of the first negotiator registered for `remote_id`.
    pub fn channel_of(&self, remote_id: &PeerId) -> Option<&str> {
        self.channels
            .iter()
            .find(|(_, peers)| peers.contains_key(remote_id))
            .map(|(channel, _)| channel.as_str())
    }

    pub fn len(&self) -> usize {
        self.channels.values().map(HashMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    pub fn drain(&mut self) -> Vec<SessionNegotiator> {
        let channels = std::mem::take(&mut self.channels);
        channels
            .into_values()
            .flat_map(HashMap::into_values)
            .collect()
    }
}
