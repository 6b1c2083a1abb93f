use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use roomie_companion::config::Config;
use roomie_companion::console::{self, ConsoleInput};
use roomie_companion::executor::CommandExecutor;
use roomie_companion::player::HeadlessPlayer;
use roomie_companion::recognizer::ConsoleRecognizer;
use roomie_companion::renderer::ConsoleRenderer;
use roomie_companion::{EventRx, EventTx};
use roomie_core::lifecycle::FileSessionStore;
use roomie_core::{Command, CommandTx, Companion, CompanionConfig, DisplayEvent, Event};
use tokio::io::AsyncBufReadExt;
use tokio::sync::broadcast::error::RecvError;
use tokio::time::Instant;
use tracing_subscriber::fmt::time::ChronoLocal;

#[derive(Parser)]
#[command(version, about = "Console client for the roomie companion")]
struct Cli {
    /// Websocket endpoint, overrides ROOMIE_SERVER_URL
    #[arg(long)]
    server_url: Option<String>,
    /// Where the restore record is kept, overrides ROOMIE_SESSION_FILE
    #[arg(long)]
    session_file: Option<PathBuf>,
    /// Do not restart listening after each reply
    #[arg(long)]
    no_auto_listen: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // --- 1. Load Configuration ---
    let mut config = Config::from_env().context("Failed to load application configuration")?;

    // --- 2. Initialize Logging ---
    tracing_subscriber::fmt()
        .with_max_level(config.log_level)
        .with_timer(ChronoLocal::rfc_3339())
        .with_writer(std::io::stderr)
        .init();

    // --- 3. Parse Command-Line Arguments ---
    let args = Cli::parse();
    if let Some(server_url) = args.server_url {
        config.server_url = server_url;
    }
    if let Some(session_file) = args.session_file {
        config.session_file = session_file;
    }
    if args.no_auto_listen {
        config.auto_listen = false;
    }
    tracing::info!("Configuration loaded successfully. Connecting to {}...", config.server_url);

    // --- 4. Transport ---
    let transport = Arc::new(roomie_realtime::connect_with_config(
        roomie_realtime::Config::builder()
            .with_base_url(&config.server_url)
            .build(),
    ));

    // Everything the core reacts to goes through one channel; everything it
    // asks for comes back through another.
    let (event_tx, event_rx) = tokio::sync::mpsc::channel::<Event>(1024);
    let (command_tx, command_rx) = tokio::sync::mpsc::unbounded_channel::<Command>();

    let server_forwarder = tokio::spawn(forward_server_events(
        transport.server_events(),
        event_tx.clone(),
    ));
    let state_forwarder = tokio::spawn(forward_connection_state(
        transport.connection_state(),
        event_tx.clone(),
    ));

    // --- 5. Adapters ---
    let recognizer = ConsoleRecognizer::new(event_tx.clone());
    let executor = CommandExecutor::new(
        transport.clone(),
        HeadlessPlayer::new(event_tx.clone(), config.playback),
        recognizer.clone(),
        ConsoleRenderer::new(std::io::stdout(), config.mood_history),
    );
    let command_handler = tokio::spawn(executor.run(command_rx));
    let input_handle = tokio::spawn(read_console(event_tx, command_tx.clone(), recognizer));

    // --- 6. Core ---
    let companion = Companion::new(
        command_tx,
        Box::new(FileSessionStore::new(&config.session_file)),
        CompanionConfig::new()
            .with_auto_listen(config.auto_listen)
            .with_mood_poll(config.mood_poll),
    );
    let core_handle = tokio::spawn(run_core(companion, event_rx));

    tokio::select! {
        _ = input_handle => {
            tracing::info!("Console input closed.");
        }
        _ = core_handle => {},
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Received Ctrl-C, shutting down...");
        }
    }
    tracing::info!("Shutting down...");

    server_forwarder.abort();
    state_forwarder.abort();
    command_handler.abort();
    // Aborted tasks release their handles to the transport.
    let _ = command_handler.await;
    let _ = server_forwarder.await;
    let _ = state_forwarder.await;

    match transport.stats() {
        Ok(stats) => tracing::info!("Transport stats: {:?}", stats),
        Err(e) => tracing::warn!("{:#}", e),
    }
    match Arc::try_unwrap(transport) {
        Ok(client) => client.shutdown().await?,
        Err(_) => tracing::warn!("transport still shared at shutdown"),
    }
    Ok(())
}

/// Owns the core. Events ready at the same moment form one tick.
async fn run_core(mut companion: Companion, mut events: EventRx) {
    loop {
        let deadline = companion.next_deadline();
        tokio::select! {
            event = events.recv() => {
                let Some(event) = event else { break };
                let now = Instant::now();
                companion.handle(event, now);
                while let Ok(event) = events.try_recv() {
                    companion.handle(event, now);
                }
                companion.end_tick();
                companion.tick(now);
            }
            _ = sleep_until(deadline) => {
                companion.tick(Instant::now());
            }
        }
    }
    tracing::info!("event channel closed, core exiting");
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

async fn forward_server_events(mut server_rx: roomie_realtime::ServerRx, events: EventTx) {
    loop {
        match server_rx.recv().await {
            Ok(event) => {
                if events.send(Event::Server(event)).await.is_err() {
                    break;
                }
            }
            Err(RecvError::Lagged(skipped)) => {
                tracing::warn!("Dropped {} server events, core is lagging", skipped);
            }
            Err(RecvError::Closed) => break,
        }
    }
}

async fn forward_connection_state(mut state_rx: roomie_realtime::StateRx, events: EventTx) {
    let initial = *state_rx.borrow_and_update();
    if events.send(Event::Connection(initial)).await.is_err() {
        return;
    }
    while state_rx.changed().await.is_ok() {
        let state = *state_rx.borrow_and_update();
        if events.send(Event::Connection(state)).await.is_err() {
            break;
        }
    }
}

async fn read_console(events: EventTx, commands: CommandTx, recognizer: ConsoleRecognizer) {
    let notice = |text: String| {
        if commands.send(Command::Display(DisplayEvent::Notice(text))).is_err() {
            tracing::warn!("Failed to show notice, executor is gone");
        }
    };
    notice("type /help for commands".to_string());

    let mut lines = tokio::io::BufReader::new(tokio::io::stdin()).lines();
    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(e) => {
                tracing::error!("Failed to read console input: {}", e);
                break;
            }
        };
        match console::parse_line(&line) {
            None => {}
            Some(ConsoleInput::Action(action)) => {
                if events.send(Event::User(action)).await.is_err() {
                    break;
                }
            }
            Some(ConsoleInput::Dictation(text)) => {
                if !recognizer.dictate(&text) {
                    notice("not listening right now, try /listen".to_string());
                }
            }
            Some(ConsoleInput::Help) => notice(console::HELP.to_string()),
            Some(ConsoleInput::Invalid(message)) => notice(message),
            Some(ConsoleInput::Quit) => break,
        }
    }
}
