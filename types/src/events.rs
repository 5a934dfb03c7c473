pub mod client;
pub mod server;

use client::*;
use server::*;

/// Messages this side writes to the side-channel.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(tag = "type")]
pub enum ClientEvent {
    #[serde(rename = "session.update")]
    SessionUpdate(SessionUpdateEvent),
}

/// Messages the remote service writes to the side-channel.
///
/// Types this crate does not know about deserialize as [`ServerEvent::Unknown`]
/// so newer remote protocols keep working.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(tag = "type")]
pub enum ServerEvent {
    #[serde(rename = "error")]
    Error(ErrorEvent),
    #[serde(rename = "session.created")]
    SessionCreated(SessionCreatedEvent),
    #[serde(rename = "session.updated")]
    SessionUpdated(SessionUpdatedEvent),
    #[serde(rename = "input_audio_buffer.speech_started")]
    InputAudioBufferSpeechStarted(SpeechEvent),
    #[serde(rename = "input_audio_buffer.speech_stopped")]
    InputAudioBufferSpeechStopped(SpeechEvent),
    #[serde(rename = "output_audio_buffer.started")]
    OutputAudioBufferStarted(SpeechEvent),
    #[serde(rename = "output_audio_buffer.stopped")]
    OutputAudioBufferStopped(SpeechEvent),
    #[serde(rename = "conversation.item.input_audio_transcription.completed")]
    ConversationItemInputAudioTranscriptionCompleted(UtteranceEvent),
    #[serde(rename = "response.audio_transcript.done")]
    ResponseAudioTranscriptDone(UtteranceEvent),
    #[serde(rename = "transcription")]
    Transcription(UtteranceEvent),
    #[serde(rename = "assistant.response")]
    AssistantResponse(UtteranceEvent),
    #[serde(other)]
    Unknown,
}

impl ServerEvent {
    pub fn type_name(&self) -> &'static str {
        match self {
            ServerEvent::Error(_) => "error",
            ServerEvent::SessionCreated(_) => "session.created",
            ServerEvent::SessionUpdated(_) => "session.updated",
            ServerEvent::InputAudioBufferSpeechStarted(_) => "input_audio_buffer.speech_started",
            ServerEvent::InputAudioBufferSpeechStopped(_) => "input_audio_buffer.speech_stopped",
            ServerEvent::OutputAudioBufferStarted(_) => "output_audio_buffer.started",
            ServerEvent::OutputAudioBufferStopped(_) => "output_audio_buffer.stopped",
            ServerEvent::ConversationItemInputAudioTranscriptionCompleted(_) => {
                "conversation.item.input_audio_transcription.completed"
            }
            ServerEvent::ResponseAudioTranscriptDone(_) => "response.audio_transcript.done",
            ServerEvent::Transcription(_) => "transcription",
            ServerEvent::AssistantResponse(_) => "assistant.response",
            ServerEvent::Unknown => "unknown",
        }
    }
}
