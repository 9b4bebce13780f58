use crate::error::NegotiationError;
use crate::media::MediaCaptureSource;
use crate::transport::session::{
    ConnectivityState, SdpKind, SessionEvent, SessionFactory, TransportSession,
};
use crate::transport::transport_config::TransportConfig;
use anyhow::{Context, Result};
use async_trait::async_trait;
use bytes::Bytes;
use chorus_core::PeerId;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use webrtc::api::APIBuilder;
use webrtc::api::interceptor_registry::register_default_interceptors;
use webrtc::api::media_engine::MediaEngine;
use webrtc::data_channel::RTCDataChannel;
use webrtc::data_channel::data_channel_message::DataChannelMessage;
use webrtc::ice_transport::ice_candidate::RTCIceCandidate;
use webrtc::ice_transport::ice_server::RTCIceServer;
use webrtc::interceptor::registry::Registry;
use webrtc::peer_connection::RTCPeerConnection;
use webrtc::peer_connection::configuration::RTCConfiguration;
use webrtc::peer_connection::peer_connection_state::RTCPeerConnectionState;
use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;
use webrtc::rtp_transceiver::RTCRtpTransceiverInit;
use webrtc::rtp_transceiver::rtp_codec::RTPCodecType;
use webrtc::rtp_transceiver::rtp_transceiver_direction::RTCRtpTransceiverDirection;

/// Peer transport session over the `webrtc` crate.
///
/// Besides the media transceivers it opens a `session-info` data channel
/// for lightweight peer-to-peer messages.
pub struct RtcSession {
    remote_id: PeerId,
    peer_connection: Arc<RTCPeerConnection>,
    send_channel: Arc<RTCDataChannel>,
}

impl RtcSession {
    pub async fn connect(
        remote_id: PeerId,
        config: &TransportConfig,
        receiver_only: bool,
        video: bool,
        event_tx: mpsc::Sender<SessionEvent>,
    ) -> Result<Self> {
        let mut media_engine = MediaEngine::default();
        media_engine.register_default_codecs()?;

        let registry = register_default_interceptors(Registry::new(), &mut media_engine)?;

        let api = APIBuilder::new()
            .with_media_engine(media_engine)
            .with_interceptor_registry(registry)
            .build();

        let rtc_config = RTCConfiguration {
            ice_servers: vec![RTCIceServer {
                urls: config.ice_servers.clone(),
                ..Default::default()
            }],
            ..Default::default()
        };

        let peer_connection = Arc::new(api.new_peer_connection(rtc_config).await?);

        // Transceivers shape the local description; actual capture tracks
        // are attached by the audio-graph layer, not here.
        peer_connection
            .add_transceiver_from_kind(RTPCodecType::Audio, Some(transceiver_init(receiver_only)))
            .await?;
        if video {
            peer_connection
                .add_transceiver_from_kind(RTPCodecType::Video, Some(transceiver_init(receiver_only)))
                .await?;
        }

        let state_tx = event_tx.clone();
        let state_id = remote_id.clone();
        peer_connection.on_peer_connection_state_change(Box::new(
            move |s: RTCPeerConnectionState| {
                let tx = state_tx.clone();
                let remote_id = state_id.clone();

                Box::pin(async move {
                    debug!("Transport state for {remote_id}: {s:?}");
                    let _ = tx
                        .send(SessionEvent::Connectivity {
                            remote_id,
                            state: map_state(s),
                        })
                        .await;
                })
            },
        ));

        // Trickle ICE: surface local candidates so the loop can relay them.
        let ice_tx = event_tx.clone();
        let ice_id = remote_id.clone();
        peer_connection.on_ice_candidate(Box::new(move |c: Option<RTCIceCandidate>| {
            let tx = ice_tx.clone();
            let remote_id = ice_id.clone();

            Box::pin(async move {
                let Some(candidate) = c else { return };
                let Ok(json) = candidate.to_json() else {
                    return;
                };
                let Ok(candidate) = serde_json::to_string(&json) else {
                    return;
                };
                let _ = tx
                    .send(SessionEvent::CandidateGenerated {
                        remote_id,
                        candidate,
                    })
                    .await;
            })
        }));

        let send_channel = peer_connection
            .create_data_channel("session-info", None)
            .await
            .context("Failed to create session-info channel")?;

        let hello_channel = send_channel.clone();
        let dc_id = remote_id.clone();
        peer_connection.on_data_channel(Box::new(move |dc: Arc<RTCDataChannel>| {
            let remote_id = dc_id.clone();
            let hello_channel = hello_channel.clone();

            Box::pin(async move {
                debug!("Received data channel '{}' from {remote_id}", dc.label());

                let msg_id = remote_id.clone();
                dc.on_message(Box::new(move |msg: DataChannelMessage| {
                    let remote_id = msg_id.clone();
                    Box::pin(async move {
                        debug!(
                            "session-info message from {remote_id}: {} bytes",
                            msg.data.len()
                        );
                    })
                }));

                let greeting = Bytes::from_static(br#"{"type":"msg","contents":"hello"}"#);
                if let Err(e) = hello_channel.send(&greeting).await {
                    debug!("Could not greet {remote_id} over session-info: {e}");
                }
            })
        }));

        info!("Created transport session for {remote_id}");

        Ok(Self {
            remote_id,
            peer_connection,
            send_channel,
        })
    }

    pub fn remote_id(&self) -> &PeerId {
        &self.remote_id
    }
}

// `RTCRtpTransceiverInit` is not `Clone`; build one per transceiver.
fn transceiver_init(receiver_only: bool) -> RTCRtpTransceiverInit {
    let direction = if receiver_only {
        RTCRtpTransceiverDirection::Recvonly
    } else {
        RTCRtpTransceiverDirection::Sendrecv
    };
    RTCRtpTransceiverInit {
        direction,
        send_encodings: vec![],
    }
}

fn map_state(state: RTCPeerConnectionState) -> ConnectivityState {
    match state {
        RTCPeerConnectionState::Connecting => ConnectivityState::Checking,
        RTCPeerConnectionState::Connected => ConnectivityState::Connected,
        RTCPeerConnectionState::Disconnected => ConnectivityState::Disconnected,
        RTCPeerConnectionState::Failed => ConnectivityState::Failed,
        RTCPeerConnectionState::Closed => ConnectivityState::Closed,
        RTCPeerConnectionState::New | RTCPeerConnectionState::Unspecified => {
            ConnectivityState::New
        }
    }
}

fn description(kind: SdpKind, sdp: String) -> Result<RTCSessionDescription> {
    let desc = match kind {
        SdpKind::Offer => RTCSessionDescription::offer(sdp)?,
        SdpKind::Answer => RTCSessionDescription::answer(sdp)?,
    };
    Ok(desc)
}

#[async_trait]
impl TransportSession for RtcSession {
    async fn create_offer(&self) -> Result<String> {
        let offer = self
            .peer_connection
            .create_offer(None)
            .await
            .context("Failed to create offer")?;
        Ok(offer.sdp)
    }

    async fn create_answer(&self) -> Result<String> {
        let answer = self
            .peer_connection
            .create_answer(None)
            .await
            .context("Failed to create answer")?;
        Ok(answer.sdp)
    }

    async fn set_local_description(&self, kind: SdpKind, sdp: String) -> Result<()> {
        self.peer_connection
            .set_local_description(description(kind, sdp)?)
            .await
            .context("Failed to set local description")?;
        Ok(())
    }

    async fn set_remote_description(&self, kind: SdpKind, sdp: String) -> Result<()> {
        self.peer_connection
            .set_remote_description(description(kind, sdp)?)
            .await
            .context("Failed to set remote description")?;
        Ok(())
    }

    async fn add_remote_candidate(&self, candidate: String) -> Result<()> {
        let candidate: webrtc::ice_transport::ice_candidate::RTCIceCandidateInit =
            serde_json::from_str(&candidate).context("Failed to parse candidate JSON")?;
        self.peer_connection
            .add_ice_candidate(candidate)
            .await
            .context("Failed to add candidate")?;
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        if let Err(e) = self.send_channel.close().await {
            warn!("Failed to close session-info channel: {e}");
        }
        self.peer_connection
            .close()
            .await
            .context("Failed to close peer connection")?;
        Ok(())
    }
}

/// [`SessionFactory`] producing [`RtcSession`]s.
pub struct RtcSessionFactory {
    config: TransportConfig,
    media: Option<Arc<dyn MediaCaptureSource>>,
    video: bool,
}

impl RtcSessionFactory {
    pub fn new(config: TransportConfig, media: Option<Arc<dyn MediaCaptureSource>>) -> Self {
        Self {
            config,
            media,
            video: false,
        }
    }

    pub fn with_video(mut self, video: bool) -> Self {
        self.video = video;
        self
    }
}

#[async_trait]
impl SessionFactory for RtcSessionFactory {
    async fn create(
        &self,
        remote_id: PeerId,
        receiver_only: bool,
        events: mpsc::Sender<SessionEvent>,
    ) -> Result<Box<dyn TransportSession>, NegotiationError> {
        if !receiver_only {
            let media = self.media.as_ref().ok_or_else(|| {
                NegotiationError::MediaAcquisition("no capture source configured".to_owned())
            })?;
            if media.audio_track_count() == 0 {
                return Err(NegotiationError::MediaAcquisition(format!(
                    "capture source '{}' has no audio tracks",
                    media.label()
                )));
            }
            info!("Using audio device: {}", media.label());
        }

        let session =
            RtcSession::connect(remote_id, &self.config, receiver_only, self.video, events)
                .await?;
        Ok(Box::new(session))
    }
}
