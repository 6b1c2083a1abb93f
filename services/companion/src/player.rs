//! Headless audio sink. Nothing is decoded: a clip "plays" for a fixed
//! duration and then reports that it ended, unless it is stopped first.

use std::time::Duration;

use roomie_core::types::TurnId;
use roomie_core::{Event, PlaybackEvent};

use crate::EventTx;

pub struct HeadlessPlayer {
    events: EventTx,
    duration: Duration,
    current: Option<(TurnId, tokio::task::JoinHandle<()>)>,
}

impl HeadlessPlayer {
    pub fn new(events: EventTx, duration: Duration) -> Self {
        Self {
            events,
            duration,
            current: None,
        }
    }

    pub fn playing(&self) -> Option<TurnId> {
        self.current
            .as_ref()
            .filter(|(_, handle)| !handle.is_finished())
            .map(|(turn_id, _)| *turn_id)
    }

    pub fn play(&mut self, turn_id: TurnId, url: &str) {
        if let Some((previous, handle)) = self.current.take() {
            tracing::debug!("replacing clip for turn {}", previous);
            handle.abort();
        }

        let events = self.events.clone();
        if url.trim().is_empty() {
            crate::deliver(
                &events,
                Event::Playback(PlaybackEvent::Failed {
                    turn_id,
                    message: "empty audio url".to_string(),
                }),
            );
            return;
        }

        tracing::info!("playing {} for turn {}", url, turn_id);
        let duration = self.duration;
        let handle = tokio::spawn(async move {
            tokio::time::sleep(duration).await;
            tracing::debug!("clip for turn {} ended", turn_id);
            if let Err(e) = events
                .send(Event::Playback(PlaybackEvent::Ended { turn_id }))
                .await
            {
                tracing::warn!("Failed to report playback end: {:?}", e);
            }
        });
        self.current = Some((turn_id, handle));
    }

    /// Pause and rewind. Stopping a clip that already ended is a no-op.
    pub fn stop(&mut self, turn_id: TurnId) {
        match self.current.take() {
            Some((playing, handle)) if playing == turn_id => {
                tracing::info!("stopping clip for turn {}", turn_id);
                handle.abort();
            }
            other => {
                tracing::debug!("no clip playing for turn {}", turn_id);
                self.current = other;
            }
        }
    }
}

impl Drop for HeadlessPlayer {
    fn drop(&mut self) {
        if let Some((_, handle)) = self.current.take() {
            handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_clip_reports_end() {
        let (tx, mut rx) = tokio::sync::mpsc::channel(8);
        let mut player = HeadlessPlayer::new(tx, Duration::from_millis(20));
        player.play(4, "/audio/4.mp3");
        assert_eq!(player.playing(), Some(4));

        let event = tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert!(matches!(
            event,
            Event::Playback(PlaybackEvent::Ended { turn_id: 4 })
        ));
    }

    #[tokio::test]
    async fn test_stop_cancels_report() {
        let (tx, mut rx) = tokio::sync::mpsc::channel(8);
        let mut player = HeadlessPlayer::new(tx, Duration::from_millis(50));
        player.play(1, "/audio/1.mp3");
        // Stopping some other turn leaves the clip alone.
        player.stop(2);
        assert_eq!(player.playing(), Some(1));

        player.stop(1);
        assert_eq!(player.playing(), None);
        let waited = tokio::time::timeout(Duration::from_millis(200), rx.recv()).await;
        assert!(waited.is_err(), "stopped clip still reported an end");
    }

    #[tokio::test]
    async fn test_empty_url_fails_immediately() {
        let (tx, mut rx) = tokio::sync::mpsc::channel(8);
        let mut player = HeadlessPlayer::new(tx, Duration::from_millis(20));
        player.play(3, "");
        assert!(matches!(
            rx.recv().await,
            Some(Event::Playback(PlaybackEvent::Failed { turn_id: 3, .. }))
        ));
    }
}
