use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::convert::Infallible;
use std::str::FromStr;

/// Emotion label reported by the server's detector.
///
/// Unknown labels are kept verbatim in `Custom` so a newer server never
/// breaks an older client.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Emotion {
    Happy,
    Sad,
    Angry,
    Fear,
    Surprise,
    Disgust,
    Neutral,
    Custom(String),
}

impl Emotion {
    pub fn as_str(&self) -> &str {
        match self {
            Emotion::Happy => "happy",
            Emotion::Sad => "sad",
            Emotion::Angry => "angry",
            Emotion::Fear => "fear",
            Emotion::Surprise => "surprise",
            Emotion::Disgust => "disgust",
            Emotion::Neutral => "neutral",
            Emotion::Custom(s) => s,
        }
    }
}

impl Default for Emotion {
    fn default() -> Self {
        Emotion::Neutral
    }
}

impl std::fmt::Display for Emotion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for Emotion {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

impl FromStr for Emotion {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "happy" => Emotion::Happy,
            "sad" => Emotion::Sad,
            "angry" => Emotion::Angry,
            "fear" => Emotion::Fear,
            "surprise" => Emotion::Surprise,
            "disgust" => Emotion::Disgust,
            "neutral" => Emotion::Neutral,
            _ => Emotion::Custom(s.to_string()),
        })
    }
}

impl<'de> Deserialize<'de> for Emotion {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        match Emotion::from_str(&s) {
            Ok(emotion) => Ok(emotion),
            Err(never) => match never {},
        }
    }
}
