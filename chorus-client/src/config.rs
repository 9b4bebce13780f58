use crate::transport::TransportConfig;
use chorus_core::SdpPolicy;

/// Client-wide settings, constructed once and passed by reference to
/// everything that needs them.
#[derive(Debug, Clone, Default)]
pub struct ClientConfig {
    /// Negotiate receive-only sessions; no local capture is offered.
    pub receiver_only: bool,
    /// Negotiate a video track in addition to audio.
    pub show_video: bool,
    /// Codec/bitrate policy applied to every local description.
    pub sdp_policy: SdpPolicy,
    /// ICE configuration for transport sessions.
    pub transport: TransportConfig,
}
