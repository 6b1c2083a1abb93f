use crate::client::stats::Stats;
use crate::types;
use crate::types::ConnectionState;
use anyhow::{Context, Result};
use futures_util::{SinkExt, StreamExt};
use std::sync::{Arc, Mutex};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

pub(crate) mod config;
pub(crate) mod consts;
pub(crate) mod stats;
mod utils;

pub type ClientTx = tokio::sync::mpsc::Sender<types::ClientEvent>;
type ClientRx = tokio::sync::mpsc::Receiver<types::ClientEvent>;
type ServerTx = tokio::sync::broadcast::Sender<types::ServerEvent>;
pub type ServerRx = tokio::sync::broadcast::Receiver<types::ServerEvent>;
type StateTx = tokio::sync::watch::Sender<ConnectionState>;
pub type StateRx = tokio::sync::watch::Receiver<ConnectionState>;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Why a live connection stopped pumping.
enum Disconnect {
    /// Every `Client` handle is gone; nothing left to reconnect for.
    ClientDropped,
    /// The socket closed or failed; the supervisor should retry.
    Lost(Option<String>),
}

// A reconnecting duplex channel. Outbound events are queued on an mpsc
// channel, inbound events are fanned out on a broadcast channel and the
// connection state is published on a watch channel.
pub struct Client {
    c_tx: ClientTx,
    s_tx: ServerTx,
    state_rx: StateRx,
    stats: Arc<Mutex<Stats>>,
    supervisor: tokio::task::JoinHandle<()>,
}

impl Client {
    fn spawn(config: config::Config) -> Self {
        let (c_tx, c_rx) = tokio::sync::mpsc::channel(config.capacity());
        let (s_tx, _) = tokio::sync::broadcast::channel(config.capacity());
        let (state_tx, state_rx) = tokio::sync::watch::channel(ConnectionState::Disconnected);
        let stats = Arc::new(Mutex::new(Stats::new()));

        let supervisor = tokio::spawn(supervise(
            config,
            c_rx,
            s_tx.clone(),
            state_tx,
            stats.clone(),
        ));

        Self {
            c_tx,
            s_tx,
            state_rx,
            stats,
            supervisor,
        }
    }

    // Get a server receiver that we can use to receive server events.
    pub fn server_events(&self) -> ServerRx {
        self.s_tx.subscribe()
    }

    pub fn connection_state(&self) -> StateRx {
        self.state_rx.clone()
    }

    pub fn sender(&self) -> ClientTx {
        self.c_tx.clone()
    }

    pub fn stats(&self) -> Result<Stats> {
        if let Ok(stats_guard) = self.stats.lock() {
            Ok(stats_guard.clone())
        } else {
            Err(anyhow::anyhow!("failed to get stats"))
        }
    }

    /// True once the supervisor has given up reconnecting (or been shut down).
    pub fn is_closed(&self) -> bool {
        self.supervisor.is_finished()
    }

    /// Queue a client event for delivery.
    pub async fn send(&self, event: types::ClientEvent) -> Result<()> {
        if self.supervisor.is_finished() {
            return Err(anyhow::anyhow!("transport is closed"));
        }
        self.c_tx
            .send(event)
            .await
            .map_err(|e| anyhow::anyhow!("failed to queue {} event", e.0.name()))
    }

    /// Close the socket and wait for the supervisor to exit.
    pub async fn shutdown(self) -> Result<()> {
        let Client {
            c_tx, supervisor, ..
        } = self;
        drop(c_tx);
        supervisor.await.context("transport supervisor panicked")
    }
}

async fn supervise(
    config: config::Config,
    mut c_rx: ClientRx,
    s_tx: ServerTx,
    state_tx: StateTx,
    stats: Arc<Mutex<Stats>>,
) {
    let mut failures: u32 = 0;
    let mut has_connected = false;

    loop {
        state_tx.send_replace(ConnectionState::Connecting);
        if let Ok(mut stats_guard) = stats.lock() {
            stats_guard.record_attempt();
        }

        match open(&config).await {
            Ok(ws_stream) => {
                failures = 0;
                // Anything queued while offline belonged to the previous
                // connection; the session layer re-issues what it needs.
                while let Ok(stale) = c_rx.try_recv() {
                    tracing::warn!("discarding {} queued while disconnected", stale.name());
                }
                if let Ok(mut stats_guard) = stats.lock() {
                    stats_guard.record_connected(has_connected);
                }
                has_connected = true;
                tracing::info!("connected to {}", config.base_url());
                state_tx.send_replace(ConnectionState::Connected);

                let outcome = pump(ws_stream, &mut c_rx, &s_tx, &stats).await;
                state_tx.send_replace(ConnectionState::Disconnected);
                match outcome {
                    Disconnect::ClientDropped => {
                        tracing::info!("client dropped, transport shutting down");
                        return;
                    }
                    Disconnect::Lost(reason) => {
                        tracing::warn!("connection lost: {:?}", reason);
                        broadcast(&s_tx, types::ServerEvent::Close { reason });
                    }
                }
            }
            Err(e) => {
                failures += 1;
                tracing::error!(
                    "connection attempt {}/{} failed: {:#}",
                    failures,
                    config.max_reconnect_attempts(),
                    e
                );
                state_tx.send_replace(ConnectionState::Disconnected);
                if failures >= config.max_reconnect_attempts() {
                    tracing::error!("reconnect attempts exhausted, giving up");
                    broadcast(
                        &s_tx,
                        types::ServerEvent::Close {
                            reason: Some("reconnect attempts exhausted".to_string()),
                        },
                    );
                    return;
                }
            }
        }

        // Wait out the retry delay, but stop early if the client is dropped.
        tokio::select! {
            _ = tokio::time::sleep(config.reconnect_delay()) => {}
            _ = c_rx_closed(&mut c_rx) => {
                tracing::info!("client dropped while reconnecting");
                return;
            }
        }
    }
}

async fn c_rx_closed(c_rx: &mut ClientRx) {
    // Events queued while offline are dropped at reconnect anyway.
    while c_rx.recv().await.is_some() {}
}

async fn open(config: &config::Config) -> Result<WsStream> {
    let request = utils::build_request(config).context("failed to build request")?;
    let (ws_stream, _) = tokio_tungstenite::connect_async(request)
        .await
        .with_context(|| format!("failed to connect to {}", config.base_url()))?;
    Ok(ws_stream)
}

fn broadcast(s_tx: &ServerTx, event: types::ServerEvent) {
    // No subscribers is not an error; the event is simply unobserved.
    if s_tx.receiver_count() == 0 {
        tracing::debug!("no subscribers for {}", event.name());
        return;
    }
    if let Err(e) = s_tx.send(event) {
        tracing::error!("failed to send event: {}", e);
    }
}

async fn pump(
    ws_stream: WsStream,
    c_rx: &mut ClientRx,
    s_tx: &ServerTx,
    stats: &Arc<Mutex<Stats>>,
) -> Disconnect {
    let (mut write, mut read) = ws_stream.split();

    loop {
        tokio::select! {
            outbound = c_rx.recv() => {
                let Some(event) = outbound else {
                    if let Err(e) = write.send(Message::Close(None)).await {
                        tracing::debug!("failed to send close frame: {}", e);
                    }
                    return Disconnect::ClientDropped;
                };
                match serde_json::to_string(&event) {
                    Ok(text) => {
                        tracing::debug!("sending message: {}", event.name());
                        if let Err(e) = write.send(Message::Text(text)).await {
                            tracing::error!("failed to send message: {}", e);
                            return Disconnect::Lost(Some(e.to_string()));
                        }
                        if let Ok(mut stats_guard) = stats.lock() {
                            stats_guard.record_sent();
                        }
                    }
                    Err(e) => {
                        tracing::error!("failed to serialize event: {}", e);
                    }
                }
            }
            inbound = read.next() => {
                let message = match inbound {
                    None => return Disconnect::Lost(None),
                    Some(Err(e)) => {
                        tracing::error!("failed to read message: {}", e);
                        return Disconnect::Lost(Some(e.to_string()));
                    }
                    Some(Ok(message)) => message,
                };
                match message {
                    Message::Text(text) => {
                        match serde_json::from_str::<types::ServerEvent>(&text) {
                            Ok(event) => {
                                tracing::debug!("received message: {}", event.name());
                                if let Ok(mut stats_guard) = stats.lock() {
                                    stats_guard.record_received();
                                }
                                broadcast(s_tx, event);
                            }
                            // Log an error if we couldn't deserialize the server event.
                            Err(e) => {
                                tracing::error!(
                                    "failed to deserialize event: {}, text=> {:?}",
                                    e,
                                    text
                                );
                            }
                        }
                    }
                    Message::Binary(bin) => {
                        tracing::warn!("unexpected binary message: {} bytes", bin.len());
                    }
                    Message::Close(reason) => {
                        tracing::info!("connection closed: {:?}", reason);
                        return Disconnect::Lost(reason.map(|v| v.reason.to_string()));
                    }
                    _ => {}
                }
            }
        }
    }
}

// Spawn a transport with an explicit config. Returns immediately; progress is
// reported through `connection_state()`.
pub fn connect_with_config(config: config::Config) -> Client {
    Client::spawn(config)
}

pub fn connect() -> Client {
    connect_with_config(config::Config::new())
}
