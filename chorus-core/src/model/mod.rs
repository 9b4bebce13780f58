mod envelope;
mod peer;

pub use envelope::{Action, Envelope, EnvelopeError};
pub use peer::PeerId;
