mod relay;
mod ws_handler;

pub use relay::RelayService;
pub use ws_handler::ws_handler;

use crate::assets::asset_handler;
use axum::Router;
use axum::routing::get;

/// The relay's full HTTP surface: the signaling socket plus the static
/// asset fallback.
pub fn build_router(relay: RelayService) -> Router {
    Router::new()
        .route("/ws/{peer_id}", get(ws_handler))
        .fallback(get(asset_handler))
        .with_state(relay)
}
