use crate::signaling::RelayService;
use axum::extract::ws::{Message, WebSocket};
use axum::extract::{Path, State, WebSocketUpgrade};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use chorus_core::{Envelope, PeerId};
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tracing::{info, warn};

pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Path(peer_id): Path<String>,
    State(relay): State<RelayService>,
) -> Response {
    let Ok(peer_id) = peer_id.parse::<PeerId>() else {
        return (StatusCode::BAD_REQUEST, "invalid peer id").into_response();
    };

    ws.on_upgrade(move |socket| handle_socket(socket, peer_id, relay))
        .into_response()
}

async fn handle_socket(socket: WebSocket, peer_id: PeerId, relay: RelayService) {
    info!("New client connection: {peer_id}");

    let (mut sender, mut receiver) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel();

    relay.add_peer(peer_id.clone(), tx);

    let mut send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            if sender.send(msg).await.is_err() {
                break;
            }
        }
    });

    let mut recv_task = tokio::spawn({
        let relay = relay.clone();
        let peer_id = peer_id.clone();

        async move {
            while let Some(Ok(msg)) = receiver.next().await {
                match msg {
                    Message::Text(text) => match serde_json::from_str::<Envelope>(&text) {
                        Ok(mut envelope) => {
                            // The connection is the source of truth for
                            // identity; never trust the claimed sender.
                            envelope.sender = Some(peer_id.clone());

                            if let Err(e) = envelope.validate() {
                                warn!("Dropping malformed envelope from {peer_id}: {e}");
                                continue;
                            }
                            relay.handle_envelope(&peer_id, envelope);
                        }
                        Err(e) => warn!("Unparseable envelope from {peer_id}: {e}"),
                    },
                    Message::Close(_) => break,
                    _ => {}
                }
            }
        }
    });

    tokio::select! {
        _ = (&mut send_task) => recv_task.abort(),
        _ = (&mut recv_task) => send_task.abort(),
    };

    relay.remove_peer(&peer_id);
    info!("Client disconnected: {peer_id}");
}
