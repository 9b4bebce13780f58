use crate::error::SignalingError;
use async_trait::async_trait;
use chorus_core::Envelope;

/// Outbound half of the relay connection.
///
/// Any rendezvous transport (a persistent bidirectional socket, a
/// pub/sub bus) can satisfy this. Inbound envelopes arrive on the inbox
/// receiver the concrete transport hands out at connect time;
/// `subscribe`/`unsubscribe` tell the transport which channels the
/// client currently cares about so it can drop stale room broadcasts.
#[async_trait]
pub trait SignalTransport: Send + Sync {
    async fn emit(&self, envelope: Envelope) -> Result<(), SignalingError>;

    fn subscribe(&self, channel: &str);

    fn unsubscribe(&self, channel: &str);
}
