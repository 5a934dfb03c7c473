use std::sync::Mutex;

use async_trait::async_trait;
use tokio::sync::mpsc;
use voice_session_utils::{CaptureError, EncodedFrame, Microphone, Speaker};

use super::{AudioFrame, AudioOutput, AudioSource, MediaDevices, Playback, RemoteTrack, TaskPlayback};
use crate::error::MediaError;

const FRAME_CAPACITY: usize = 256;

impl From<CaptureError> for MediaError {
    fn from(e: CaptureError) -> Self {
        match e {
            CaptureError::PermissionDenied(msg) => MediaError::PermissionDenied(msg),
            CaptureError::DeviceUnavailable(msg) => MediaError::DeviceUnavailable(msg),
            CaptureError::Stream(msg) => MediaError::DeviceUnavailable(msg),
        }
    }
}

impl From<EncodedFrame> for AudioFrame {
    fn from(frame: EncodedFrame) -> Self {
        Self {
            data: frame.data,
            duration: frame.duration,
        }
    }
}

/// Microphones reached through cpal.
#[derive(Debug, Clone, Default)]
pub struct NativeMediaDevices {
    input_device: Option<String>,
}

impl NativeMediaDevices {
    pub fn new(input_device: Option<String>) -> Self {
        Self { input_device }
    }
}

#[async_trait]
impl MediaDevices for NativeMediaDevices {
    async fn acquire_audio(&self) -> Result<Box<dyn AudioSource>, MediaError> {
        let (tx, rx) = mpsc::channel::<AudioFrame>(FRAME_CAPACITY);
        let device = self.input_device.clone();

        let microphone = tokio::task::spawn_blocking(move || {
            Microphone::open(device, move |frame| match tx.try_send(frame.into()) {
                Ok(()) => true,
                Err(mpsc::error::TrySendError::Full(_)) => {
                    tracing::warn!("outbound audio backlog, dropping frame");
                    true
                }
                Err(mpsc::error::TrySendError::Closed(_)) => false,
            })
        })
        .await
        .map_err(|e| MediaError::DeviceUnavailable(e.to_string()))??;

        tracing::info!(device = microphone.name(), "microphone acquired");
        Ok(Box::new(NativeAudioSource {
            label: microphone.name().to_string(),
            microphone: Mutex::new(Some(microphone)),
            frames: Mutex::new(Some(rx)),
        }))
    }
}

struct NativeAudioSource {
    label: String,
    microphone: Mutex<Option<Microphone>>,
    frames: Mutex<Option<mpsc::Receiver<AudioFrame>>>,
}

impl AudioSource for NativeAudioSource {
    fn label(&self) -> &str {
        &self.label
    }

    fn take_frames(&self) -> Option<mpsc::Receiver<AudioFrame>> {
        self.frames.lock().unwrap_or_else(|e| e.into_inner()).take()
    }

    fn stop(&self) {
        let microphone = self.microphone.lock().unwrap_or_else(|e| e.into_inner()).take();
        if let Some(mut microphone) = microphone {
            microphone.stop();
            tracing::info!(device = %self.label, "microphone stopped");
        }
    }
}

impl Drop for NativeAudioSource {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Plays Opus encoded remote audio on a cpal output device.
#[derive(Debug, Clone, Default)]
pub struct NativeAudioOutput {
    output_device: Option<String>,
}

impl NativeAudioOutput {
    pub fn new(output_device: Option<String>) -> Self {
        Self { output_device }
    }
}

impl AudioOutput for NativeAudioOutput {
    fn play(&self, mut track: RemoteTrack) -> Box<dyn Playback> {
        let device = self.output_device.clone();
        let handle = tokio::spawn(async move {
            let mut speaker = match tokio::task::spawn_blocking(move || Speaker::open(device)).await {
                Ok(Ok(speaker)) => speaker,
                Ok(Err(e)) => {
                    tracing::error!("failed to open speaker: {}", e);
                    return;
                }
                Err(e) => {
                    tracing::error!("speaker task failed: {}", e);
                    return;
                }
            };
            tracing::info!(track = %track.id, "audio playback started");
            while let Some(frame) = track.frames.recv().await {
                if let Err(e) = speaker.play_opus(&frame.data) {
                    tracing::warn!("failed to play remote frame: {}", e);
                }
            }
            tracing::info!(track = %track.id, "audio playback ended");
        });
        Box::new(TaskPlayback::new(handle))
    }
}
