use crate::error::NegotiationError;
use crate::session::CandidateQueue;
use crate::signaling::SignalTransport;
use crate::transport::{ConnectivityState, SdpKind, TransportSession};
use chorus_core::{Envelope, PeerId, SdpPolicy};
use std::sync::Arc;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NegotiationState {
    New,
    Offering,
    Answering,
    Connected,
    Disconnecting,
    Closed,
}

/// One outgoing connection negotiation with exactly one remote party.
///
/// The negotiator owns its transport session and an opaque emit
/// capability; it holds no reference to the registry that owns it. All
/// methods are invoked from the client event loop, one at a time, so
/// two offer/answer cycles can never interleave on one instance.
pub struct SessionNegotiator {
    remote_id: PeerId,
    channel: String,
    state: NegotiationState,
    offered: bool,
    answered: bool,
    has_remote_description: bool,
    disconnecting: bool,
    candidates: CandidateQueue,
    session: Box<dyn TransportSession>,
    signals: Arc<dyn SignalTransport>,
    policy: SdpPolicy,
}

impl SessionNegotiator {
    pub fn new(
        remote_id: PeerId,
        channel: impl Into<String>,
        session: Box<dyn TransportSession>,
        signals: Arc<dyn SignalTransport>,
        policy: SdpPolicy,
    ) -> Self {
        Self {
            remote_id,
            channel: channel.into(),
            state: NegotiationState::New,
            offered: false,
            answered: false,
            has_remote_description: false,
            disconnecting: false,
            candidates: CandidateQueue::new(),
            session,
            signals,
            policy,
        }
    }

    pub fn remote_id(&self) -> &PeerId {
        &self.remote_id
    }

    pub fn channel(&self) -> &str {
        &self.channel
    }

    pub fn state(&self) -> NegotiationState {
        self.state
    }

    pub fn offered(&self) -> bool {
        self.offered
    }

    pub fn answered(&self) -> bool {
        self.answered
    }

    pub fn has_remote_description(&self) -> bool {
        self.has_remote_description
    }

    pub fn queued_candidates(&self) -> usize {
        self.candidates.len()
    }

    /// Start negotiation from our side: produce a local description, run
    /// it through the transform pipeline, and transmit the offer.
    pub async fn initiate(&mut self) -> Result<(), NegotiationError> {
        if self.state != NegotiationState::New {
            warn!(
                "Ignoring initiate for {} in state {:?}",
                self.remote_id, self.state
            );
            return Ok(());
        }

        self.offered = true;
        self.state = NegotiationState::Offering;

        let sdp = self.session.create_offer().await?;
        let sdp = self.policy.transform(&sdp);
        self.session
            .set_local_description(SdpKind::Offer, sdp.clone())
            .await?;

        info!("Sending offer to {}", self.remote_id);
        self.emit(Envelope::offer(sdp, self.remote_id.clone())).await;
        Ok(())
    }

    /// The remote side offered first: consume its description and
    /// transmit a transformed answer.
    pub async fn handle_offer(&mut self, sdp: &str) -> Result<(), NegotiationError> {
        if self.state != NegotiationState::New {
            warn!(
                "Ignoring offer from {} in state {:?}",
                self.remote_id, self.state
            );
            return Ok(());
        }

        self.answered = true;
        self.state = NegotiationState::Answering;

        self.apply_remote_description(SdpKind::Offer, sdp).await?;

        let answer = self.session.create_answer().await?;
        let answer = self.policy.transform(&answer);
        self.session
            .set_local_description(SdpKind::Answer, answer.clone())
            .await?;

        info!("Sending answer to {}", self.remote_id);
        self.emit(Envelope::answer(answer, self.remote_id.clone()))
            .await;
        Ok(())
    }

    /// Consume the remote answer to our offer. An answer we never asked
    /// for is discarded without touching the state machine.
    pub async fn handle_answer(&mut self, sdp: &str) -> Result<(), NegotiationError> {
        if !self.offered {
            warn!("Unexpected answer from {}", self.remote_id);
            return Ok(());
        }
        if self.state != NegotiationState::Offering {
            warn!(
                "Ignoring answer from {} in state {:?}",
                self.remote_id, self.state
            );
            return Ok(());
        }

        self.apply_remote_description(SdpKind::Answer, sdp).await
    }

    /// Apply a candidate immediately once the remote description is
    /// known, otherwise buffer it in arrival order.
    pub async fn add_remote_candidate(&mut self, candidate: String) {
        if !(self.offered || self.answered) {
            warn!("Unexpected candidate from {}", self.remote_id);
            return;
        }

        if self.has_remote_description {
            if let Err(e) = self.session.add_remote_candidate(candidate).await {
                warn!("Failed to add candidate from {}: {e:#}", self.remote_id);
            }
        } else {
            debug!("Cached candidate from {}", self.remote_id);
            self.candidates.push(candidate);
        }
    }

    /// Promote to `Connected` or tear down, depending on what the
    /// transport reports. Returns `true` when this call performed the
    /// teardown (the owner must then drop the negotiator).
    pub async fn on_connectivity_change(&mut self, connectivity: ConnectivityState) -> bool {
        debug!(
            "Connectivity for {} changed to {connectivity:?}",
            self.remote_id
        );

        if connectivity.is_terminal() {
            return self.disconnect().await;
        }

        if connectivity == ConnectivityState::Connected
            && matches!(
                self.state,
                NegotiationState::Offering | NegotiationState::Answering
            )
        {
            info!("Connected to {}", self.remote_id);
            self.state = NegotiationState::Connected;
        }
        false
    }

    /// Tear the session down. Only the first invocation has effects;
    /// later calls observe `disconnecting` and return `false`.
    pub async fn disconnect(&mut self) -> bool {
        if self.disconnecting {
            return false;
        }
        self.disconnecting = true;
        self.state = NegotiationState::Disconnecting;

        if let Err(e) = self.session.close().await {
            warn!("Error closing session with {}: {e:#}", self.remote_id);
        }
        self.release();

        self.state = NegotiationState::Closed;
        info!("Disconnected from {}", self.remote_id);
        true
    }

    /// Release transient resources of a stale negotiator so a fresh one
    /// can take over, without tearing down relay bookkeeping a second
    /// time.
    pub fn reconnect(&mut self) {
        debug!("Releasing stale negotiator for {}", self.remote_id);
        self.release();
    }

    fn release(&mut self) {
        self.candidates.clear();
    }

    async fn apply_remote_description(
        &mut self,
        kind: SdpKind,
        sdp: &str,
    ) -> Result<(), NegotiationError> {
        self.session
            .set_remote_description(kind, sdp.to_owned())
            .await?;
        self.has_remote_description = true;

        // Flush cached candidates in arrival order, exactly once. One bad
        // candidate must not fail the whole session.
        for candidate in self.candidates.drain() {
            debug!("Applying cached candidate from {}", self.remote_id);
            if let Err(e) = self.session.add_remote_candidate(candidate).await {
                warn!(
                    "Failed to apply cached candidate from {}: {e:#}",
                    self.remote_id
                );
            }
        }
        Ok(())
    }

    async fn emit(&self, envelope: Envelope) {
        let mut envelope = envelope;
        envelope.channel = Some(self.channel.clone());
        if let Err(e) = self.signals.emit(envelope).await {
            warn!("Failed to emit signal for {}: {e}", self.remote_id);
        }
    }
}
