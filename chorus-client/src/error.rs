use thiserror::Error;

/// Failures scoped to a single peer negotiation. They never affect
/// sibling negotiators in the same room.
#[derive(Debug, Error)]
pub enum NegotiationError {
    /// The underlying transport session rejected an operation.
    #[error(transparent)]
    Transport(#[from] anyhow::Error),

    /// Local capture is unavailable. The only category that must reach
    /// the operator; the caller decides the fallback (receiver-only).
    #[error("local media unavailable: {0}")]
    MediaAcquisition(String),
}

/// Failures of the relay connection itself.
#[derive(Debug, Error)]
pub enum SignalingError {
    #[error("signal transport is closed")]
    TransportClosed,

    #[error("websocket failure: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("envelope encoding failed: {0}")]
    Encode(#[from] serde_json::Error),
}
