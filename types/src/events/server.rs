mod error;

pub use error::ErrorDetails;

use crate::session::SessionResource;

const DEFAULT_ERROR_MESSAGE: &str = "An error occurred";

/// `error` event
///
/// Some deployments put `message` at the top level, others nest it under
/// `error`; both are accepted.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ErrorEvent {
    #[serde(default)]
    event_id: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    error: Option<ErrorDetails>,
}

impl ErrorEvent {
    pub fn event_id(&self) -> Option<&str> {
        self.event_id.as_deref()
    }

    pub fn message(&self) -> &str {
        self.message
            .as_deref()
            .or_else(|| self.error.as_ref().map(|e| e.message()))
            .filter(|m| !m.is_empty())
            .unwrap_or(DEFAULT_ERROR_MESSAGE)
    }

    pub fn details(&self) -> Option<&ErrorDetails> {
        self.error.as_ref()
    }
}

/// `session.created` event
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct SessionCreatedEvent {
    #[serde(default)]
    event_id: Option<String>,
    #[serde(default)]
    session: SessionResource,
}

impl SessionCreatedEvent {
    pub fn event_id(&self) -> Option<&str> {
        self.event_id.as_deref()
    }

    pub fn session(&self) -> &SessionResource {
        &self.session
    }
}

/// `session.updated` event
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct SessionUpdatedEvent {
    #[serde(default)]
    event_id: Option<String>,
    #[serde(default)]
    session: SessionResource,
}

impl SessionUpdatedEvent {
    pub fn event_id(&self) -> Option<&str> {
        self.event_id.as_deref()
    }

    pub fn session(&self) -> &SessionResource {
        &self.session
    }
}

/// Voice activity on either the input or the output buffer.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct SpeechEvent {
    #[serde(default)]
    event_id: Option<String>,
    #[serde(default)]
    item_id: Option<String>,
    /// Milliseconds since the session started.
    #[serde(default, alias = "audio_start_ms", alias = "audio_end_ms")]
    audio_ms: Option<i64>,
}

impl SpeechEvent {
    pub fn event_id(&self) -> Option<&str> {
        self.event_id.as_deref()
    }

    pub fn item_id(&self) -> Option<&str> {
        self.item_id.as_deref()
    }

    pub fn audio_ms(&self) -> Option<i64> {
        self.audio_ms
    }
}

/// A completed user transcription or assistant response.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct UtteranceEvent {
    #[serde(default)]
    event_id: Option<String>,
    #[serde(default)]
    item_id: Option<String>,
    #[serde(default, alias = "transcript")]
    text: Option<String>,
    /// Base64 encoded audio payload.
    #[serde(default)]
    audio: Option<String>,
    /// Seconds.
    #[serde(default)]
    duration: Option<f64>,
}

impl UtteranceEvent {
    pub fn event_id(&self) -> Option<&str> {
        self.event_id.as_deref()
    }

    pub fn item_id(&self) -> Option<&str> {
        self.item_id.as_deref()
    }

    pub fn text(&self) -> Option<&str> {
        self.text.as_deref()
    }

    pub fn audio(&self) -> Option<&str> {
        self.audio.as_deref()
    }

    pub fn duration(&self) -> Option<f64> {
        self.duration
    }
}
