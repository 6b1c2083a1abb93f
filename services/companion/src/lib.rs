pub mod config;
pub mod console;
pub mod executor;
pub mod player;
pub mod recognizer;
pub mod renderer;
pub mod transport;

pub use roomie_core::types;

/// Inputs flowing into the single task that owns the core.
pub type EventTx = tokio::sync::mpsc::Sender<roomie_core::Event>;
pub type EventRx = tokio::sync::mpsc::Receiver<roomie_core::Event>;

/// Hand an event to the core from a synchronous callback.
pub(crate) fn deliver(events: &EventTx, event: roomie_core::Event) {
    if let Err(e) = events.try_send(event) {
        tracing::warn!("Failed to deliver event to core: {:?}", e);
    }
}
