use crate::model::peer::PeerId;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Every signal the relay understands. `join` is dual-purpose: a client
/// sends `join { channel }` to enter a room, and the relay broadcasts
/// `join { id }` to the room's other members to announce the newcomer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Join,
    Created,
    Joined,
    Full,
    Offer,
    Answer,
    Candidate,
    Leave,
    Ipaddr,
}

/// Wire envelope exchanged with the rendezvous relay.
///
/// All payload fields are optional so that a malformed message can still
/// be deserialized, validated and dropped with a diagnostic instead of
/// killing the connection. [`Envelope::validate`] states which fields an
/// action requires.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope {
    pub action: Action,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender: Option<PeerId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recipient: Option<PeerId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sdp: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub candidate: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<PeerId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum EnvelopeError {
    #[error("envelope {action:?} is missing required field `{field}`")]
    MissingField { action: Action, field: &'static str },
}

impl Envelope {
    fn new(action: Action) -> Self {
        Self {
            action,
            channel: None,
            sender: None,
            recipient: None,
            sdp: None,
            candidate: None,
            id: None,
            address: None,
        }
    }

    /// Client -> server: enter a room.
    pub fn join(channel: impl Into<String>) -> Self {
        let mut e = Self::new(Action::Join);
        e.channel = Some(channel.into());
        e
    }

    /// Server -> other members: a new peer entered the room.
    pub fn peer_joined(channel: impl Into<String>, id: PeerId) -> Self {
        let mut e = Self::new(Action::Join);
        e.channel = Some(channel.into());
        e.id = Some(id);
        e
    }

    pub fn created(channel: impl Into<String>, id: PeerId) -> Self {
        let mut e = Self::new(Action::Created);
        e.channel = Some(channel.into());
        e.id = Some(id);
        e
    }

    pub fn joined(channel: impl Into<String>, id: PeerId) -> Self {
        let mut e = Self::new(Action::Joined);
        e.channel = Some(channel.into());
        e.id = Some(id);
        e
    }

    pub fn full(channel: impl Into<String>) -> Self {
        let mut e = Self::new(Action::Full);
        e.channel = Some(channel.into());
        e
    }

    pub fn offer(sdp: impl Into<String>, recipient: PeerId) -> Self {
        let mut e = Self::new(Action::Offer);
        e.sdp = Some(sdp.into());
        e.recipient = Some(recipient);
        e
    }

    pub fn answer(sdp: impl Into<String>, recipient: PeerId) -> Self {
        let mut e = Self::new(Action::Answer);
        e.sdp = Some(sdp.into());
        e.recipient = Some(recipient);
        e
    }

    pub fn candidate(candidate: impl Into<String>, recipient: PeerId) -> Self {
        let mut e = Self::new(Action::Candidate);
        e.candidate = Some(candidate.into());
        e.recipient = Some(recipient);
        e
    }

    pub fn leave(channel: impl Into<String>, id: PeerId) -> Self {
        let mut e = Self::new(Action::Leave);
        e.channel = Some(channel.into());
        e.id = Some(id);
        e
    }

    /// Client -> server: ask for the relay's reachable addresses.
    pub fn ipaddr_request() -> Self {
        Self::new(Action::Ipaddr)
    }

    /// Server -> client: one reachable non-loopback address.
    pub fn ipaddr(address: impl Into<String>) -> Self {
        let mut e = Self::new(Action::Ipaddr);
        e.address = Some(address.into());
        e
    }

    /// Check that the fields this action requires are present.
    ///
    /// The relay runs this on everything a client sends; a failure means
    /// the envelope is dropped, never that the connection is closed.
    pub fn validate(&self) -> Result<(), EnvelopeError> {
        let missing = |field| EnvelopeError::MissingField {
            action: self.action,
            field,
        };

        match self.action {
            Action::Join | Action::Leave | Action::Full => {
                if self.channel.is_none() && self.id.is_none() {
                    return Err(missing("channel"));
                }
            }
            Action::Created | Action::Joined => {
                if self.channel.is_none() {
                    return Err(missing("channel"));
                }
            }
            Action::Offer | Action::Answer => {
                if self.sdp.is_none() {
                    return Err(missing("sdp"));
                }
                if self.recipient.is_none() {
                    return Err(missing("recipient"));
                }
            }
            Action::Candidate => {
                if self.candidate.is_none() {
                    return Err(missing("candidate"));
                }
                if self.recipient.is_none() {
                    return Err(missing("recipient"));
                }
            }
            Action::Ipaddr => {}
        }

        Ok(())
    }
}
