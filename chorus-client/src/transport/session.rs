use crate::error::NegotiationError;
use anyhow::Result;
use async_trait::async_trait;
use chorus_core::PeerId;
use tokio::sync::mpsc;

/// Which half of the offer/answer exchange a description belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SdpKind {
    Offer,
    Answer,
}

/// Connectivity of the underlying peer transport, observed by the
/// surrounding transport layer and reported into the client loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectivityState {
    New,
    Checking,
    Connected,
    Disconnected,
    Failed,
    Closed,
}

impl ConnectivityState {
    /// Terminal states trigger negotiator teardown.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Disconnected | Self::Failed | Self::Closed)
    }
}

/// Events a transport session pushes into the client event loop.
#[derive(Debug)]
pub enum SessionEvent {
    /// A local transport-address candidate is ready to be relayed.
    CandidateGenerated {
        remote_id: PeerId,
        candidate: String,
    },
    /// The transport's connectivity changed.
    Connectivity {
        remote_id: PeerId,
        state: ConnectivityState,
    },
}

/// Opaque capability over one peer media transport. The negotiator
/// drives this but does not implement it.
#[async_trait]
pub trait TransportSession: Send + Sync {
    async fn create_offer(&self) -> Result<String>;

    async fn create_answer(&self) -> Result<String>;

    async fn set_local_description(&self, kind: SdpKind, sdp: String) -> Result<()>;

    async fn set_remote_description(&self, kind: SdpKind, sdp: String) -> Result<()>;

    async fn add_remote_candidate(&self, candidate: String) -> Result<()>;

    async fn close(&self) -> Result<()>;
}

/// Builds one transport session per remote peer.
#[async_trait]
pub trait SessionFactory: Send + Sync {
    /// Create a session for `remote_id`, reporting its candidates and
    /// connectivity changes on `events`.
    ///
    /// Fails with [`NegotiationError::MediaAcquisition`] when local
    /// capture is required but unavailable; the caller may retry with
    /// `receiver_only` set.
    async fn create(
        &self,
        remote_id: PeerId,
        receiver_only: bool,
        events: mpsc::Sender<SessionEvent>,
    ) -> Result<Box<dyn TransportSession>, NegotiationError>;
}
