pub use chorus_core::model::PeerId;

pub mod model {
    pub use chorus_core::model::*;
}

pub mod sdp {
    pub use chorus_core::sdp::*;
}

#[cfg(feature = "server")]
pub mod server {
    pub use chorus_server::*;
}

#[cfg(feature = "client")]
pub mod client {
    pub use chorus_client::*;
}
