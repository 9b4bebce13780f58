mod rtc_session;
mod session;
mod transport_config;

pub use rtc_session::{RtcSession, RtcSessionFactory};
pub use session::{ConnectivityState, SdpKind, SessionEvent, SessionFactory, TransportSession};
pub use transport_config::TransportConfig;
