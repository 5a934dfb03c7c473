//! Local microphone acquisition and remote audio playback seams.

#[cfg(feature = "utils")]
mod native;

#[cfg(feature = "utils")]
pub use native::{NativeAudioOutput, NativeMediaDevices};

use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::error::MediaError;

/// One encoded media sample travelling on an audio track.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioFrame {
    pub data: Vec<u8>,
    pub duration: Duration,
}

/// A live local audio source holding an exclusive input device.
pub trait AudioSource: Send + Sync {
    fn label(&self) -> &str;

    /// Hands out the outbound frame stream. Only the first call returns it.
    fn take_frames(&self) -> Option<mpsc::Receiver<AudioFrame>>;

    /// Releases every underlying hardware track. Calling it again is a no-op.
    fn stop(&self);
}

/// Grants access to audio input devices.
#[async_trait]
pub trait MediaDevices: Send + Sync {
    /// May prompt the user for permission the first time it is called.
    async fn acquire_audio(&self) -> std::result::Result<Box<dyn AudioSource>, MediaError>;
}

/// Audio arriving from the remote peer.
#[derive(Debug)]
pub struct RemoteTrack {
    pub id: String,
    pub frames: mpsc::Receiver<AudioFrame>,
}

/// A running playback of a [`RemoteTrack`].
pub trait Playback: Send {
    fn stop(&mut self);
}

/// Plays remote audio tracks as they arrive.
pub trait AudioOutput: Send + Sync {
    fn play(&self, track: RemoteTrack) -> Box<dyn Playback>;
}

/// Playback driven by a spawned task; stopping aborts the task.
pub struct TaskPlayback {
    handle: Option<JoinHandle<()>>,
}

impl TaskPlayback {
    pub fn new(handle: JoinHandle<()>) -> Self {
        Self { handle: Some(handle) }
    }
}

impl Playback for TaskPlayback {
    fn stop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

impl Drop for TaskPlayback {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Drains remote audio without playing it.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullOutput;

impl AudioOutput for NullOutput {
    fn play(&self, mut track: RemoteTrack) -> Box<dyn Playback> {
        let handle = tokio::spawn(async move {
            let mut received = 0usize;
            while track.frames.recv().await.is_some() {
                received += 1;
            }
            tracing::debug!(track = %track.id, frames = received, "remote track ended");
        });
        Box::new(TaskPlayback::new(handle))
    }
}
