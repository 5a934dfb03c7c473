//! Peer-to-peer transport seam.
//!
//! Browser style callbacks (track arrival, connection state, channel messages)
//! are delivered as one ordered [`TransportEvent`] stream per transport.

#[cfg(feature = "webrtc")]
pub mod webrtc;

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::diagnostics::ConnectionStats;
use crate::error::Result;
use crate::media::{AudioFrame, RemoteTrack};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    #[default]
    New,
    Connecting,
    Connected,
    Disconnected,
    Failed,
    Closed,
}

impl ConnectionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionState::New => "new",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Failed => "failed",
            ConnectionState::Closed => "closed",
        }
    }

    /// `failed` and `disconnected` end the session and trigger diagnostics.
    pub fn is_failure(&self) -> bool {
        matches!(self, ConnectionState::Failed | ConnectionState::Disconnected)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ConnectionState::Failed | ConnectionState::Disconnected | ConnectionState::Closed
        )
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug)]
pub enum TransportEvent {
    StateChanged(ConnectionState),
    Track(RemoteTrack),
    ChannelOpen,
    ChannelMessage(String),
    ChannelClosed,
}

pub type TransportEvents = mpsc::UnboundedReceiver<TransportEvent>;

/// NAT traversal hints handed to each new transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IceConfig {
    pub servers: Vec<String>,
    pub candidate_pool_size: u8,
}

/// Structured-message channel carried next to the audio.
#[async_trait]
pub trait SideChannel: Send + Sync {
    fn label(&self) -> &str;

    fn is_open(&self) -> bool;

    async fn send(&self, text: String) -> Result<()>;

    fn close(&self);
}

/// One peer connection. A transport is good for a single negotiation; a new
/// attempt needs a new transport.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Hands out the event stream. Only the first call returns it.
    fn take_events(&self) -> Option<TransportEvents>;

    async fn add_audio_track(&self, frames: mpsc::Receiver<AudioFrame>) -> Result<()>;

    async fn create_side_channel(&self, label: &str) -> Result<Arc<dyn SideChannel>>;

    /// Builds the local offer and returns it serialized.
    async fn create_offer(&self) -> Result<String>;

    async fn apply_answer(&self, answer: &str) -> Result<()>;

    fn state(&self) -> ConnectionState;

    async fn stats(&self) -> ConnectionStats;

    /// Closes the connection and stops all media pumps. Idempotent.
    fn close(&self);
}

#[async_trait]
pub trait TransportFactory: Send + Sync {
    async fn create(&self, ice: &IceConfig) -> Result<Arc<dyn Transport>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_states() {
        assert!(ConnectionState::Failed.is_failure());
        assert!(ConnectionState::Disconnected.is_failure());
        assert!(!ConnectionState::Closed.is_failure());
        assert!(ConnectionState::Closed.is_terminal());
        assert!(!ConnectionState::Connected.is_terminal());
        assert_eq!(serde_json::to_string(&ConnectionState::Failed).unwrap(), r#""failed""#);
    }
}
