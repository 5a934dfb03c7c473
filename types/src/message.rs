use std::time::{Duration, SystemTime, UNIX_EPOCH};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

/// One `{role, content}` entry of the rolling conversation history.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ConversationTurn {
    pub role: Role,
    pub content: String,
}

impl ConversationTurn {
    pub fn new(role: Role, content: &str) -> Self {
        Self {
            role,
            content: content.to_string(),
        }
    }
}

/// A finalized utterance handed to the caller. Immutable once built.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct VoiceMessage {
    id: String,
    role: Role,
    /// Raw audio payload, empty when the remote only reported text.
    #[serde(default)]
    audio: Vec<u8>,
    #[serde(default)]
    transcript: Option<String>,
    /// Duration in milliseconds.
    duration_ms: u64,
    /// Milliseconds since the unix epoch.
    timestamp: u64,
}

impl VoiceMessage {
    pub fn builder(role: Role) -> VoiceMessageBuilder {
        VoiceMessageBuilder::new(role)
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn audio(&self) -> &[u8] {
        &self.audio
    }

    pub fn transcript(&self) -> Option<&str> {
        self.transcript.as_deref()
    }

    pub fn duration(&self) -> Duration {
        Duration::from_millis(self.duration_ms)
    }

    pub fn timestamp(&self) -> u64 {
        self.timestamp
    }
}

pub struct VoiceMessageBuilder {
    message: VoiceMessage,
}

impl VoiceMessageBuilder {
    pub fn new(role: Role) -> Self {
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or_default();
        Self {
            message: VoiceMessage {
                id: uuid::Uuid::new_v4().to_string(),
                role,
                audio: Vec::new(),
                transcript: None,
                duration_ms: 0,
                timestamp,
            },
        }
    }

    pub fn with_id(mut self, id: &str) -> Self {
        self.message.id = id.to_string();
        self
    }

    pub fn with_audio(mut self, audio: Vec<u8>) -> Self {
        self.message.audio = audio;
        self
    }

    pub fn with_transcript(mut self, transcript: &str) -> Self {
        self.message.transcript = Some(transcript.to_string());
        self
    }

    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.message.duration_ms = u64::try_from(duration.as_millis()).unwrap_or(u64::MAX);
        self
    }

    pub fn build(self) -> VoiceMessage {
        self.message
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_assigns_unique_ids() {
        let a = VoiceMessage::builder(Role::User).build();
        let b = VoiceMessage::builder(Role::User).build();
        assert_ne!(a.id(), b.id());
        assert!(a.timestamp() > 0);
    }

    #[test]
    fn test_turn_serialize() {
        let turn = ConversationTurn::new(Role::Assistant, "hello");
        let json = serde_json::to_string(&turn).unwrap();
        assert_eq!(json, r#"{"role":"assistant","content":"hello"}"#);
    }
}
