pub mod config;
pub mod error;
pub mod media;
pub mod session;
pub mod signaling;
pub mod transport;

pub use config::ClientConfig;
pub use error::{NegotiationError, SignalingError};
pub use media::{MediaCaptureSource, NativeCaptureAddon};
pub use session::{CandidateQueue, ConnectionRegistry, NegotiationState, SessionNegotiator};
pub use signaling::{
    ClientCommand, ClientEvent, ClientHandle, SignalTransport, SignalingClient, WsSignalTransport,
};
pub use transport::{
    ConnectivityState, RtcSessionFactory, SdpKind, SessionEvent, SessionFactory, TransportConfig,
    TransportSession,
};
