use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

pub const DEFAULT_INSTRUCTIONS: &str =
    "You are a helpful AI assistant named Omnipotent. Respond naturally and warmly.";

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Voice {
    Alloy,
    Echo,
    Fable,
    Onyx,
    #[default]
    Nova,
    Shimmer,
    Custom(String),
}

impl Voice {
    pub fn as_str(&self) -> &str {
        match self {
            Voice::Alloy => "alloy",
            Voice::Echo => "echo",
            Voice::Fable => "fable",
            Voice::Onyx => "onyx",
            Voice::Nova => "nova",
            Voice::Shimmer => "shimmer",
            Voice::Custom(s) => s,
        }
    }
}

impl fmt::Display for Voice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&str> for Voice {
    fn from(s: &str) -> Self {
        match s {
            "alloy" => Voice::Alloy,
            "echo" => Voice::Echo,
            "fable" => Voice::Fable,
            "onyx" => Voice::Onyx,
            "nova" => Voice::Nova,
            "shimmer" => Voice::Shimmer,
            _ => Voice::Custom(s.to_string()),
        }
    }
}

impl FromStr for Voice {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Voice::from(s))
    }
}

impl Serialize for Voice {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Voice {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Ok(Voice::from(s.as_str()))
    }
}

/// Speech model bound to the session at negotiation time.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Model {
    #[default]
    Tts1,
    Tts1Hd,
    Custom(String),
}

impl Model {
    pub fn as_str(&self) -> &str {
        match self {
            Model::Tts1 => "tts-1",
            Model::Tts1Hd => "tts-1-hd",
            Model::Custom(s) => s,
        }
    }
}

impl fmt::Display for Model {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&str> for Model {
    fn from(s: &str) -> Self {
        match s {
            "tts-1" => Model::Tts1,
            "tts-1-hd" => Model::Tts1Hd,
            _ => Model::Custom(s.to_string()),
        }
    }
}

impl FromStr for Model {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Model::from(s))
    }
}

impl Serialize for Model {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Model {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Ok(Model::from(s.as_str()))
    }
}

/// Snapshot of the user-selected voice, model and instructions for one
/// connection attempt.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct SessionConfig {
    pub voice: Voice,
    pub model: Model,
    pub instructions: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            voice: Voice::default(),
            model: Model::default(),
            instructions: DEFAULT_INSTRUCTIONS.to_string(),
        }
    }
}

impl SessionConfig {
    pub fn new(voice: Voice, model: Model, instructions: &str) -> Self {
        Self {
            voice,
            model,
            instructions: instructions.to_string(),
        }
    }

    /// Voice and model are bound when the session is negotiated, so a change
    /// to either one needs a fresh session.
    pub fn requires_reconnect(&self, other: &SessionConfig) -> bool {
        self.voice != other.voice || self.model != other.model
    }

    pub fn instructions_changed(&self, other: &SessionConfig) -> bool {
        self.instructions != other.instructions
    }
}
