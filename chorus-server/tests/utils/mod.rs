#![allow(dead_code)]

use anyhow::{Context, Result, bail};
use chorus_core::{Action, Envelope, PeerId};
use chorus_server::{RelayService, ServerConfig, build_router};
use futures::{SinkExt, StreamExt};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::Level;

/// Timeout for a single envelope to arrive (ms).
pub const RECV_TIMEOUT_MS: u64 = 2000;

/// How long to listen when asserting that nothing arrives (ms).
pub const SILENCE_WINDOW_MS: u64 = 300;

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(Level::DEBUG)
        .with_test_writer()
        .try_init();
}

/// Start a relay on an ephemeral local port and return its address.
pub async fn spawn_relay(max_clients: usize) -> SocketAddr {
    let config = ServerConfig {
        max_clients,
        ..Default::default()
    };
    let relay = RelayService::new(config);
    let app = build_router(relay);

    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind test listener");
    let addr = listener.local_addr().expect("No local addr");

    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("Relay crashed");
    });

    addr
}

/// A conferencing client talking to the relay over a real WebSocket.
pub struct TestClient {
    pub peer_id: PeerId,
    socket: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

impl TestClient {
    pub async fn connect(addr: SocketAddr) -> Result<Self> {
        let peer_id = PeerId::new();
        let url = format!("ws://{addr}/ws/{peer_id}");
        let (socket, _) = connect_async(&url)
            .await
            .with_context(|| format!("Failed to connect to {url}"))?;
        Ok(Self { peer_id, socket })
    }

    pub async fn send(&mut self, envelope: &Envelope) -> Result<()> {
        let json = serde_json::to_string(envelope)?;
        self.socket
            .send(Message::Text(json))
            .await
            .context("Failed to send envelope")
    }

    pub async fn send_raw(&mut self, text: &str) -> Result<()> {
        self.socket
            .send(Message::Text(text.to_owned()))
            .await
            .context("Failed to send raw frame")
    }

    /// Next envelope, or an error after [`RECV_TIMEOUT_MS`].
    pub async fn recv(&mut self) -> Result<Envelope> {
        let deadline = Duration::from_millis(RECV_TIMEOUT_MS);
        loop {
            let frame = tokio::time::timeout(deadline, self.socket.next())
                .await
                .context("Timed out waiting for envelope")?;
            match frame {
                Some(Ok(Message::Text(text))) => {
                    return serde_json::from_str(&text).context("Unparseable envelope");
                }
                Some(Ok(_)) => continue,
                Some(Err(e)) => bail!("Socket error: {e}"),
                None => bail!("Connection closed"),
            }
        }
    }

    /// Skip envelopes until one with the wanted action arrives.
    pub async fn recv_action(&mut self, action: Action) -> Result<Envelope> {
        loop {
            let envelope = self.recv().await?;
            if envelope.action == action {
                return Ok(envelope);
            }
        }
    }

    /// True when nothing arrives within the silence window.
    pub async fn silent(&mut self) -> bool {
        tokio::time::timeout(
            Duration::from_millis(SILENCE_WINDOW_MS),
            self.socket.next(),
        )
        .await
        .is_err()
    }

    /// Join a room and return the relay's direct reply.
    pub async fn join(&mut self, room: &str) -> Result<Envelope> {
        self.send(&Envelope::join(room)).await?;
        self.recv().await
    }

    pub async fn close(mut self) {
        let _ = self.socket.close(None).await;
    }
}
