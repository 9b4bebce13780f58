mod candidate_queue;
mod negotiator;
mod registry;

pub use candidate_queue::CandidateQueue;
pub use negotiator::{NegotiationState, SessionNegotiator};
pub use registry::ConnectionRegistry;
