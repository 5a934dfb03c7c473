//! Offer/answer exchange with the remote realtime service.

use async_trait::async_trait;
use base64::Engine;
use secrecy::{ExposeSecret, SecretString};

use crate::consts::{
    AUTHORIZATION_HEADER, CONTENT_TYPE_HEADER, CONTEXT_HEADER, CONTEXT_HEADER_MAX_BYTES, CONTEXT_HISTORY_MAX_TURNS,
    MODEL_HEADER, OPENAI_BETA_HEADER, OPENAI_BETA_VALUE, REALTIME_PATH, SDP_CONTENT_TYPE, VOICE_HEADER,
};
use crate::error::{Result, SessionError};
use crate::types::{ConversationTurn, SessionConfig};

/// Everything the remote service needs alongside the offer.
#[derive(Debug, Clone)]
pub struct NegotiationRequest {
    pub api_key: SecretString,
    pub config: SessionConfig,
    pub history: Vec<ConversationTurn>,
}

#[async_trait]
pub trait Negotiator: Send + Sync {
    /// Sends the serialized offer and returns the remote answer.
    async fn negotiate(&self, offer: &str, request: &NegotiationRequest) -> Result<String>;
}

#[derive(serde::Serialize)]
struct SessionContext<'a> {
    instructions: &'a str,
    history: &'a [ConversationTurn],
}

#[derive(serde::Deserialize)]
struct AnswerBody {
    sdp: String,
}

/// Encodes the instructions and the most recent conversation turns for the
/// context header, keeping the encoded value within
/// [`CONTEXT_HEADER_MAX_BYTES`] whenever the instructions alone fit.
pub fn context_header(instructions: &str, history: &[ConversationTurn]) -> Result<String> {
    let mut history = &history[history.len().saturating_sub(CONTEXT_HISTORY_MAX_TURNS)..];
    loop {
        let json = serde_json::to_vec(&SessionContext { instructions, history })
            .map_err(|e| SessionError::configuration(format!("Failed to encode session context: {e}")))?;
        let encoded = base64::engine::general_purpose::STANDARD.encode(json);
        if encoded.len() <= CONTEXT_HEADER_MAX_BYTES || history.is_empty() {
            if encoded.len() > CONTEXT_HEADER_MAX_BYTES {
                tracing::warn!(bytes = encoded.len(), "instructions exceed the context header budget");
            }
            return Ok(encoded);
        }
        history = &history[1..];
    }
}

/// Negotiates over a single HTTP POST.
#[derive(Debug, Clone)]
pub struct HttpNegotiator {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpNegotiator {
    pub fn new(base_url: &str) -> Self {
        Self::with_client(reqwest::Client::new(), base_url)
    }

    pub fn with_client(client: reqwest::Client, base_url: &str) -> Self {
        Self {
            client,
            endpoint: format!("{}/{}", base_url.trim_end_matches('/'), REALTIME_PATH),
        }
    }
}

#[async_trait]
impl Negotiator for HttpNegotiator {
    async fn negotiate(&self, offer: &str, request: &NegotiationRequest) -> Result<String> {
        let context = context_header(&request.config.instructions, &request.history)?;

        tracing::debug!(
            endpoint = %self.endpoint,
            voice = %request.config.voice,
            model = %request.config.model,
            "sending session offer"
        );
        let response = self
            .client
            .post(&self.endpoint)
            .header(AUTHORIZATION_HEADER, format!("Bearer {}", request.api_key.expose_secret()))
            .header(CONTENT_TYPE_HEADER, SDP_CONTENT_TYPE)
            .header(OPENAI_BETA_HEADER, OPENAI_BETA_VALUE)
            .header(VOICE_HEADER, request.config.voice.as_str())
            .header(MODEL_HEADER, request.config.model.as_str())
            .header(CONTEXT_HEADER, context)
            .body(offer.to_string())
            .send()
            .await
            .map_err(|e| SessionError::Request(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = status.as_u16(), body = %body, "negotiation rejected");
            return Err(SessionError::negotiation(
                status.as_u16(),
                status.canonical_reason().unwrap_or("Unknown Status"),
            ));
        }

        let is_json = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v.contains("json"));
        let body = response
            .text()
            .await
            .map_err(|e| SessionError::Request(format!("Failed to read answer: {e}")))?;

        if is_json {
            let answer: AnswerBody = serde_json::from_str(&body)
                .map_err(|e| SessionError::Request(format!("Failed to parse answer: {e}")))?;
            Ok(answer.sdp)
        } else {
            Ok(body)
        }
    }
}
