//! Interprets side-channel messages from the remote service.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use base64::Engine;

use crate::types::events::client::SessionUpdateEvent;
use crate::types::events::server::UtteranceEvent;
use crate::types::{ClientEvent, ConversationTurn, Role, ServerEvent, Session, VoiceMessage};

/// Append-only record of the conversation, kept across reconnects.
#[derive(Debug, Clone, Default)]
pub struct ConversationHistory {
    turns: Arc<Mutex<Vec<ConversationTurn>>>,
}

impl ConversationHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, turn: ConversationTurn) {
        self.turns.lock().unwrap_or_else(|e| e.into_inner()).push(turn);
    }

    pub fn snapshot(&self) -> Vec<ConversationTurn> {
        self.turns.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn len(&self) -> usize {
        self.turns.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Clone)]
pub enum RouterOutput {
    /// Write this event to the side-channel.
    Send(ClientEvent),
    StreamingChanged(bool),
    /// The remote service reported an error.
    Error(String),
    Message(VoiceMessage),
}

/// Per-session message router.
///
/// A `session.update` owed before the side-channel opens is held back and
/// released by [`EventRouter::channel_opened`], carrying the instructions
/// current at that point.
#[derive(Debug)]
pub struct EventRouter {
    instructions: String,
    history: ConversationHistory,
    streaming: bool,
    channel_open: bool,
    update_pending: bool,
}

impl EventRouter {
    pub fn new(instructions: &str, history: ConversationHistory) -> Self {
        Self {
            instructions: instructions.to_string(),
            history,
            streaming: false,
            channel_open: false,
            update_pending: false,
        }
    }

    pub fn is_streaming(&self) -> bool {
        self.streaming
    }

    pub fn instructions(&self) -> &str {
        &self.instructions
    }

    pub fn channel_opened(&mut self) -> Vec<ClientEvent> {
        self.channel_open = true;
        if std::mem::take(&mut self.update_pending) {
            vec![self.session_update()]
        } else {
            Vec::new()
        }
    }

    pub fn channel_closed(&mut self) {
        self.channel_open = false;
    }

    /// Stores new instructions and returns the update to push if the channel
    /// is open. Otherwise the next `session.update` carries them.
    pub fn update_instructions(&mut self, instructions: &str) -> Option<ClientEvent> {
        self.instructions = instructions.to_string();
        self.channel_open.then(|| self.session_update())
    }

    pub fn route(&mut self, raw: &str) -> Vec<RouterOutput> {
        let event = match serde_json::from_str::<ServerEvent>(raw) {
            Ok(event) => event,
            Err(e) => {
                tracing::error!("failed to parse server event: {e}");
                return Vec::new();
            }
        };
        tracing::trace!(event = event.type_name(), "server event");

        match event {
            ServerEvent::SessionCreated(e) => {
                tracing::info!(session = ?e.session().id(), "session created");
                if self.channel_open {
                    vec![RouterOutput::Send(self.session_update())]
                } else {
                    self.update_pending = true;
                    Vec::new()
                }
            }
            ServerEvent::SessionUpdated(e) => {
                tracing::info!(session = ?e.session().id(), "session updated");
                Vec::new()
            }
            ServerEvent::InputAudioBufferSpeechStarted(_) | ServerEvent::OutputAudioBufferStarted(_) => {
                self.set_streaming(true)
            }
            ServerEvent::InputAudioBufferSpeechStopped(_) | ServerEvent::OutputAudioBufferStopped(_) => {
                self.set_streaming(false)
            }
            ServerEvent::Error(e) => {
                tracing::error!(details = ?e.details(), "server error: {}", e.message());
                vec![RouterOutput::Error(e.message().to_string())]
            }
            ServerEvent::Transcription(e) | ServerEvent::ConversationItemInputAudioTranscriptionCompleted(e) => {
                vec![RouterOutput::Message(self.record(Role::User, &e))]
            }
            ServerEvent::AssistantResponse(e) | ServerEvent::ResponseAudioTranscriptDone(e) => {
                vec![RouterOutput::Message(self.record(Role::Assistant, &e))]
            }
            ServerEvent::Unknown => {
                tracing::debug!("ignoring unhandled server event");
                Vec::new()
            }
        }
    }

    fn session_update(&self) -> ClientEvent {
        let session = Session::builder().with_instructions(&self.instructions).build();
        ClientEvent::SessionUpdate(SessionUpdateEvent::new(session))
    }

    fn set_streaming(&mut self, streaming: bool) -> Vec<RouterOutput> {
        if self.streaming == streaming {
            return Vec::new();
        }
        self.streaming = streaming;
        vec![RouterOutput::StreamingChanged(streaming)]
    }

    fn record(&mut self, role: Role, event: &UtteranceEvent) -> VoiceMessage {
        let mut builder = VoiceMessage::builder(role);
        if let Some(id) = event.item_id() {
            builder = builder.with_id(id);
        }
        if let Some(text) = event.text() {
            builder = builder.with_transcript(text);
            if !text.is_empty() {
                self.history.push(ConversationTurn::new(role, text));
            }
        }
        if let Some(audio) = event.audio() {
            match base64::engine::general_purpose::STANDARD.decode(audio) {
                Ok(bytes) => builder = builder.with_audio(bytes),
                Err(e) => tracing::warn!("dropping undecodable audio payload: {e}"),
            }
        }
        if let Some(secs) = event.duration() {
            match Duration::try_from_secs_f64(secs) {
                Ok(duration) => builder = builder.with_duration(duration),
                Err(e) => tracing::warn!(secs, "ignoring out of range duration: {e}"),
            }
        }
        builder.build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn router() -> EventRouter {
        EventRouter::new("be helpful", ConversationHistory::new())
    }

    fn sent_instructions(output: &RouterOutput) -> Option<String> {
        match output {
            RouterOutput::Send(ClientEvent::SessionUpdate(e)) => e.session().instructions().map(str::to_string),
            _ => None,
        }
    }

    #[test]
    fn test_session_created_defers_update_until_open() {
        let mut router = router();
        assert!(router.route(r#"{"type":"session.created","session":{"id":"sess_1"}}"#).is_empty());

        let flushed = router.channel_opened();
        assert_eq!(flushed.len(), 1);
        assert!(router.channel_opened().is_empty());
    }

    #[test]
    fn test_deferred_update_carries_latest_instructions() {
        let mut router = router();
        router.route(r#"{"type":"session.created"}"#);
        assert!(router.update_instructions("be terse").is_none());
        let flushed = router.channel_opened().into_iter().map(RouterOutput::Send).collect::<Vec<_>>();
        assert_eq!(flushed.len(), 1);
        assert_eq!(sent_instructions(&flushed[0]).as_deref(), Some("be terse"));
    }

    #[test]
    fn test_session_created_sends_one_update_when_open() {
        let mut router = router();
        router.channel_opened();
        let out = router.route(r#"{"type":"session.created","session":{}}"#);
        assert_eq!(out.len(), 1);
        assert_eq!(sent_instructions(&out[0]).as_deref(), Some("be helpful"));
    }

    #[test]
    fn test_streaming_follows_speech_events() {
        let mut router = router();
        let out = router.route(r#"{"type":"input_audio_buffer.speech_started","audio_start_ms":120}"#);
        assert!(matches!(out[..], [RouterOutput::StreamingChanged(true)]));
        assert!(router.is_streaming());

        // repeated start is not a change
        assert!(router.route(r#"{"type":"output_audio_buffer.started"}"#).is_empty());

        let out = router.route(r#"{"type":"input_audio_buffer.speech_stopped"}"#);
        assert!(matches!(out[..], [RouterOutput::StreamingChanged(false)]));
        assert!(!router.is_streaming());
    }

    #[test]
    fn test_transcription_becomes_message_and_history() {
        let history = ConversationHistory::new();
        let mut router = EventRouter::new("x", history.clone());
        let raw = r#"{"type":"transcription","item_id":"item_7","text":"hello","audio":"AQID","duration":1.5}"#;
        let out = router.route(raw);
        let RouterOutput::Message(message) = &out[0] else {
            panic!("expected a message, got {out:?}");
        };
        assert_eq!(message.id(), "item_7");
        assert_eq!(message.role(), Role::User);
        assert_eq!(message.audio(), &[1, 2, 3]);
        assert_eq!(message.transcript(), Some("hello"));
        assert_eq!(message.duration(), Duration::from_millis(1500));

        router.route(r#"{"type":"response.audio_transcript.done","transcript":"hi!"}"#);
        let turns = history.snapshot();
        assert_eq!(turns.len(), 2);
        assert_eq!(turns[1], ConversationTurn::new(Role::Assistant, "hi!"));
    }

    #[test]
    fn test_out_of_range_duration_is_skipped() {
        let mut router = router();
        for duration in ["1e30", "-2.0"] {
            let raw = format!(r#"{{"type":"assistant.response","text":"hi","duration":{duration}}}"#);
            let out = router.route(&raw);
            let RouterOutput::Message(message) = &out[0] else {
                panic!("expected a message, got {out:?}");
            };
            assert_eq!(message.transcript(), Some("hi"));
            assert_eq!(message.duration(), Duration::ZERO);
        }
    }

    #[test]
    fn test_error_event() {
        let mut router = router();
        let out = router.route(r#"{"type":"error","error":{"type":"invalid_request_error","message":"bad voice"}}"#);
        assert!(matches!(&out[..], [RouterOutput::Error(m)] if m == "bad voice"));
    }

    #[test]
    fn test_unknown_and_malformed_events_are_ignored() {
        let mut router = router();
        assert!(router.route(r#"{"type":"rate_limits.updated","rate_limits":[]}"#).is_empty());
        assert!(router.route("not json").is_empty());
        assert!(router.route(r#"{"no_type":true}"#).is_empty());
    }

    #[test]
    fn test_update_instructions() {
        let mut router = router();
        assert!(router.update_instructions("be terse").is_none());
        router.channel_opened();
        let update = router.update_instructions("be kind").map(RouterOutput::Send).unwrap();
        assert_eq!(sent_instructions(&update).as_deref(), Some("be kind"));
        assert_eq!(router.instructions(), "be kind");
    }
}
