mod registry;

pub use registry::{JoinOutcome, RoomRegistry};
