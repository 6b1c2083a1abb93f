use anyhow::Result;
use async_trait::async_trait;
use roomie_core::types::ClientEvent;

/// The outbound half of the session transport, as the executor sees it.
/// Kept as a trait so the executor can be tested without a socket.
#[async_trait]
pub trait SessionTransport: Send + Sync {
    async fn send(&self, event: ClientEvent) -> Result<()>;
}

#[async_trait]
impl SessionTransport for roomie_realtime::Client {
    async fn send(&self, event: ClientEvent) -> Result<()> {
        roomie_realtime::Client::send(self, event).await
    }
}
