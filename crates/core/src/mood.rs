use std::collections::{HashMap, VecDeque};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::types::events::server::EmotionUpdateEvent;
use crate::types::Emotion;

#[derive(Debug, Clone, PartialEq)]
pub struct MoodSample {
    emotion: Emotion,
    confidence: f32,
    /// Seconds since the unix epoch.
    timestamp: f64,
}

impl MoodSample {
    pub fn new(emotion: Emotion, confidence: f32, timestamp: f64) -> Self {
        Self {
            emotion,
            confidence: confidence.clamp(0.0, 1.0),
            timestamp,
        }
    }

    /// Uses the server's timestamp when present, the local clock otherwise.
    pub fn from_update(update: &EmotionUpdateEvent) -> Self {
        let timestamp = update.timestamp().unwrap_or_else(|| {
            SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_secs_f64())
                .unwrap_or_default()
        });
        Self::new(update.emotion().clone(), update.confidence(), timestamp)
    }

    pub fn emotion(&self) -> &Emotion {
        &self.emotion
    }

    pub fn confidence(&self) -> f32 {
        self.confidence
    }

    pub fn timestamp(&self) -> f64 {
        self.timestamp
    }
}

/// Rolling window of mood samples; the oldest sample is evicted first.
#[derive(Debug, Clone)]
pub struct MoodHistory {
    capacity: usize,
    samples: VecDeque<MoodSample>,
}

impl MoodHistory {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            samples: VecDeque::with_capacity(capacity),
        }
    }

    pub fn push(&mut self, sample: MoodSample) {
        if self.samples.len() == self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(sample);
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn latest(&self) -> Option<&MoodSample> {
        self.samples.back()
    }

    pub fn iter(&self) -> impl Iterator<Item = &MoodSample> {
        self.samples.iter()
    }

    /// Emotion with the highest summed confidence across the window.
    pub fn dominant(&self) -> Option<&Emotion> {
        let mut weights: HashMap<&Emotion, f32> = HashMap::new();
        for sample in &self.samples {
            *weights.entry(&sample.emotion).or_default() += sample.confidence;
        }
        weights
            .into_iter()
            .max_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(emotion, _)| emotion)
    }

    pub fn average_confidence(&self) -> Option<f32> {
        if self.samples.is_empty() {
            return None;
        }
        let total: f32 = self.samples.iter().map(|s| s.confidence).sum();
        Some(total / self.samples.len() as f32)
    }
}
