pub mod assets;
pub mod config;
pub mod room;
pub mod signaling;

pub use config::{MAX_CLIENTS, ServerConfig};
pub use room::{JoinOutcome, RoomRegistry};
pub use signaling::{RelayService, build_router};
