pub mod model;
pub mod sdp;

pub use model::{Action, Envelope, EnvelopeError, PeerId};
pub use sdp::SdpPolicy;
