use std::io::Write;
use std::sync::Arc;

use anyhow::{Context, Result};
use roomie_core::Command;

use crate::player::HeadlessPlayer;
use crate::recognizer::ConsoleRecognizer;
use crate::renderer::ConsoleRenderer;
use crate::transport::SessionTransport;

/// Carries out the side effects the core decided on. This is the only owner
/// of the player and the renderer.
pub struct CommandExecutor<T: SessionTransport, W: Write> {
    transport: Arc<T>,
    player: HeadlessPlayer,
    recognizer: ConsoleRecognizer,
    renderer: ConsoleRenderer<W>,
}

impl<T: SessionTransport, W: Write> CommandExecutor<T, W> {
    pub fn new(
        transport: Arc<T>,
        player: HeadlessPlayer,
        recognizer: ConsoleRecognizer,
        renderer: ConsoleRenderer<W>,
    ) -> Self {
        Self {
            transport,
            player,
            recognizer,
            renderer,
        }
    }

    pub fn renderer(&self) -> &ConsoleRenderer<W> {
        &self.renderer
    }

    pub fn player(&self) -> &HeadlessPlayer {
        &self.player
    }

    pub async fn execute(&mut self, command: Command) -> Result<()> {
        match command {
            Command::Send(event) => {
                let name = event.name();
                tracing::debug!("COMMAND RECEIVED: Send {}", name);
                self.transport
                    .send(event)
                    .await
                    .with_context(|| format!("Failed to send {} event", name))?;
            }
            Command::StartRecognizer => self.recognizer.start(),
            Command::StopRecognizer => self.recognizer.stop(),
            Command::AbortRecognizer => self.recognizer.abort(),
            Command::PlayAudio { turn_id, url } => {
                self.player.play(turn_id, &url);
                self.renderer
                    .playing(&url)
                    .context("Failed to write to console")?;
            }
            Command::StopAudio { turn_id } => self.player.stop(turn_id),
            Command::Display(event) => {
                self.renderer
                    .render(event)
                    .context("Failed to write to console")?;
            }
        }
        Ok(())
    }

    /// Run until the core drops its command sender.
    pub async fn run(mut self, mut commands: roomie_core::CommandRx) {
        while let Some(command) = commands.recv().await {
            if let Err(e) = self.execute(command).await {
                // Log the error from the handler, but don't crash the whole task.
                tracing::error!("Error executing command: {:?}", e);
            }
        }
        tracing::info!("command channel closed, executor exiting");
    }
}
