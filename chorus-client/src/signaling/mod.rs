mod client;
mod transport;
mod ws_transport;

pub use client::{ClientCommand, ClientEvent, ClientHandle, SignalingClient};
pub use transport::SignalTransport;
pub use ws_transport::WsSignalTransport;
