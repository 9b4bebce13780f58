use chorus_core::PeerId;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tracing::info;

/// Result of an atomic join attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JoinOutcome {
    /// The room did not exist; the sender is its first member.
    Created,
    /// The sender was admitted; `others` are the members present before.
    Joined { others: Vec<PeerId> },
    /// The room is at capacity; the sender was not added.
    Full,
}

/// Server-side room membership. Rooms are created on first join and
/// discarded when the last member leaves.
#[derive(Default)]
pub struct RoomRegistry {
    rooms: DashMap<String, Vec<PeerId>>,
}

impl RoomRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Atomic capacity check-and-add: the occupancy read and the
    /// membership insert happen under one entry lock, so concurrent
    /// joins can never overfill a room. Joining a room one is already
    /// in is a no-op reported as `Joined`.
    pub fn join(&self, channel: &str, peer: PeerId, max_clients: usize) -> JoinOutcome {
        match self.rooms.entry(channel.to_owned()) {
            Entry::Vacant(vacant) => {
                info!("Creating room '{channel}'");
                vacant.insert(vec![peer]);
                JoinOutcome::Created
            }
            Entry::Occupied(mut occupied) => {
                let members = occupied.get_mut();
                if members.contains(&peer) {
                    let others = members.iter().filter(|m| **m != peer).cloned().collect();
                    return JoinOutcome::Joined { others };
                }
                if members.len() >= max_clients {
                    return JoinOutcome::Full;
                }
                let others = members.clone();
                members.push(peer);
                JoinOutcome::Joined { others }
            }
        }
    }

    /// Remove `peer` from a room. Returns the remaining members when the
    /// peer actually was one, `None` otherwise. An emptied room is
    /// discarded.
    pub fn leave(&self, channel: &str, peer: &PeerId) -> Option<Vec<PeerId>> {
        let Entry::Occupied(mut occupied) = self.rooms.entry(channel.to_owned()) else {
            return None;
        };
        let members = occupied.get_mut();
        let before = members.len();
        members.retain(|m| m != peer);
        if members.len() == before {
            return None;
        }
        if members.is_empty() {
            info!("Discarding empty room '{channel}'");
            occupied.remove();
            return Some(Vec::new());
        }
        Some(members.clone())
    }

    /// Remove `peer` from every room it is in (socket teardown carries
    /// only an identity). Returns each affected room with its remaining
    /// members.
    pub fn leave_all(&self, peer: &PeerId) -> Vec<(String, Vec<PeerId>)> {
        let channels: Vec<String> = self
            .rooms
            .iter()
            .filter(|entry| entry.value().contains(peer))
            .map(|entry| entry.key().clone())
            .collect();

        channels
            .into_iter()
            .filter_map(|channel| {
                self.leave(&channel, peer)
                    .map(|remaining| (channel, remaining))
            })
            .collect()
    }

    pub fn member_count(&self, channel: &str) -> usize {
        self.rooms.get(channel).map(|m| m.len()).unwrap_or(0)
    }

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MAX_CLIENTS;
    use std::sync::Arc;

    #[test]
    fn first_joiner_creates_then_others_join_until_full() {
        let registry = RoomRegistry::new();
        let first = PeerId::new();
        assert_eq!(
            registry.join("abc", first.clone(), MAX_CLIENTS),
            JoinOutcome::Created
        );

        for n in 1..MAX_CLIENTS {
            let outcome = registry.join("abc", PeerId::new(), MAX_CLIENTS);
            match outcome {
                JoinOutcome::Joined { others } => assert_eq!(others.len(), n),
                other => panic!("joiner {} got {:?}", n + 1, other),
            }
        }

        let overflow = PeerId::new();
        assert_eq!(
            registry.join("abc", overflow, MAX_CLIENTS),
            JoinOutcome::Full
        );
        assert_eq!(registry.member_count("abc"), MAX_CLIENTS);
    }

    #[test]
    fn rejoining_is_idempotent() {
        let registry = RoomRegistry::new();
        let peer = PeerId::new();
        registry.join("abc", peer.clone(), 3);
        let outcome = registry.join("abc", peer, 3);
        assert_eq!(outcome, JoinOutcome::Joined { others: Vec::new() });
        assert_eq!(registry.member_count("abc"), 1);
    }

    #[test]
    fn empty_room_is_discarded() {
        let registry = RoomRegistry::new();
        let a = PeerId::new();
        let b = PeerId::new();
        registry.join("abc", a.clone(), 3);
        registry.join("abc", b.clone(), 3);

        assert_eq!(registry.leave("abc", &a), Some(vec![b.clone()]));
        assert_eq!(registry.leave("abc", &b), Some(Vec::new()));
        assert_eq!(registry.room_count(), 0);
        // Leaving twice is harmless.
        assert_eq!(registry.leave("abc", &b), None);
    }

    #[test]
    fn leave_all_clears_every_room() {
        let registry = RoomRegistry::new();
        let peer = PeerId::new();
        let other = PeerId::new();
        registry.join("a", peer.clone(), 3);
        registry.join("b", peer.clone(), 3);
        registry.join("b", other.clone(), 3);

        let mut left = registry.leave_all(&peer);
        left.sort_by(|(a, _), (b, _)| a.cmp(b));
        assert_eq!(left, vec![("a".to_owned(), vec![]), ("b".to_owned(), vec![other])]);
        assert_eq!(registry.room_count(), 1);
    }

    #[test]
    fn concurrent_joins_never_overfill() {
        let registry = Arc::new(RoomRegistry::new());
        let max = 50;
        let handles: Vec<_> = (0..max * 2)
            .map(|_| {
                let registry = registry.clone();
                std::thread::spawn(move || registry.join("abc", PeerId::new(), max))
            })
            .collect();

        let outcomes: Vec<JoinOutcome> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        let admitted = outcomes
            .iter()
            .filter(|o| !matches!(o, JoinOutcome::Full))
            .count();

        assert_eq!(admitted, max);
        assert_eq!(registry.member_count("abc"), max);
        assert_eq!(
            outcomes
                .iter()
                .filter(|o| matches!(o, JoinOutcome::Created))
                .count(),
            1
        );
    }
}
