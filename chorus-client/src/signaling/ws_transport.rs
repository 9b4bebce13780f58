use crate::error::SignalingError;
use crate::signaling::transport::SignalTransport;
use async_trait::async_trait;
use chorus_core::Envelope;
use dashmap::DashSet;
use futures::{SinkExt, StreamExt};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, warn};

/// [`SignalTransport`] over a WebSocket connection to the relay.
///
/// A writer task drains the outbound queue; a reader task parses inbound
/// frames into [`Envelope`]s and feeds the inbox. Channel-scoped
/// envelopes for channels the client has unsubscribed from are dropped
/// before they reach the inbox.
pub struct WsSignalTransport {
    out_tx: mpsc::UnboundedSender<Message>,
    channels: Arc<DashSet<String>>,
}

impl WsSignalTransport {
    /// Connect to the relay, e.g. `ws://127.0.0.1:8080/ws/<peer-id>`.
    pub async fn connect(
        url: &str,
    ) -> Result<(Arc<Self>, mpsc::UnboundedReceiver<Envelope>), SignalingError> {
        let (socket, _) = connect_async(url).await?;
        info!("Connected to relay at {url}");

        let (mut write, mut read) = socket.split();
        let (out_tx, mut out_rx) = mpsc::unbounded_channel::<Message>();
        let (inbox_tx, inbox_rx) = mpsc::unbounded_channel::<Envelope>();
        let channels: Arc<DashSet<String>> = Arc::new(DashSet::new());

        tokio::spawn(async move {
            while let Some(msg) = out_rx.recv().await {
                if write.send(msg).await.is_err() {
                    break;
                }
            }
        });

        let subscribed = channels.clone();
        tokio::spawn(async move {
            while let Some(Ok(msg)) = read.next().await {
                match msg {
                    Message::Text(text) => match serde_json::from_str::<Envelope>(&text) {
                        Ok(envelope) => {
                            if let Some(channel) = &envelope.channel {
                                if !subscribed.contains(channel) {
                                    debug!(
                                        "Dropping {:?} for unsubscribed channel '{channel}'",
                                        envelope.action
                                    );
                                    continue;
                                }
                            }
                            if inbox_tx.send(envelope).is_err() {
                                break;
                            }
                        }
                        Err(e) => warn!("Invalid envelope from relay: {e}"),
                    },
                    Message::Close(_) => break,
                    _ => {}
                }
            }
            info!("Relay connection closed");
        });

        Ok((Arc::new(Self { out_tx, channels }), inbox_rx))
    }
}

#[async_trait]
impl SignalTransport for WsSignalTransport {
    async fn emit(&self, envelope: Envelope) -> Result<(), SignalingError> {
        let json = serde_json::to_string(&envelope)?;
        self.out_tx
            .send(Message::Text(json))
            .map_err(|_| SignalingError::TransportClosed)
    }

    fn subscribe(&self, channel: &str) {
        self.channels.insert(channel.to_owned());
    }

    fn unsubscribe(&self, channel: &str) {
        self.channels.remove(channel);
    }
}
