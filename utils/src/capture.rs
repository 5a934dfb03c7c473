use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc};
use std::thread::JoinHandle;
use std::time::Duration;

use cpal::traits::{DeviceTrait, StreamTrait};
use cpal::{BuildStreamError, PlayStreamError, Stream};
use rubato::{FastFixedIn, Resampler};

use crate::audio::{self, OpusFramer, FRAME_DURATION, OPUS_FRAME_SAMPLES, OPUS_SAMPLE_RATE};
use crate::device;

const INPUT_CHUNK_SIZE: usize = 480;
const POLL_INTERVAL: Duration = Duration::from_millis(50);

#[derive(Debug, thiserror::Error)]
pub enum CaptureError {
    #[error("permission denied: {0}")]
    PermissionDenied(String),
    #[error("device unavailable: {0}")]
    DeviceUnavailable(String),
    #[error("capture failed: {0}")]
    Stream(String),
}

impl CaptureError {
    /// Hosts report a refused microphone through backend specific errors, so
    /// the description is all there is to go on.
    pub(crate) fn classify(message: String) -> Self {
        let lower = message.to_lowercase();
        if lower.contains("permission") || lower.contains("denied") || lower.contains("not allowed") {
            CaptureError::PermissionDenied(message)
        } else if lower.contains("not available") || lower.contains("no device") || lower.contains("busy") {
            CaptureError::DeviceUnavailable(message)
        } else {
            CaptureError::Stream(message)
        }
    }
}

impl From<BuildStreamError> for CaptureError {
    fn from(e: BuildStreamError) -> Self {
        match e {
            BuildStreamError::DeviceNotAvailable => CaptureError::DeviceUnavailable(e.to_string()),
            other => CaptureError::classify(other.to_string()),
        }
    }
}

impl From<PlayStreamError> for CaptureError {
    fn from(e: PlayStreamError) -> Self {
        match e {
            PlayStreamError::DeviceNotAvailable => CaptureError::DeviceUnavailable(e.to_string()),
            other => CaptureError::classify(other.to_string()),
        }
    }
}

/// One Opus packet of captured audio.
#[derive(Debug, Clone)]
pub struct EncodedFrame {
    pub data: Vec<u8>,
    pub duration: Duration,
}

/// Turns raw mono samples at the device rate into 20 ms Opus frames.
struct FrameEncoder {
    resampler: Option<FastFixedIn<f32>>,
    input: Vec<f32>,
    output: Vec<f32>,
    opus: OpusFramer,
}

impl FrameEncoder {
    fn new(device_rate: f64) -> anyhow::Result<Self> {
        let resampler = if (device_rate - OPUS_SAMPLE_RATE).abs() < f64::EPSILON {
            None
        } else {
            Some(audio::create_resampler(device_rate, OPUS_SAMPLE_RATE, INPUT_CHUNK_SIZE)?)
        };
        Ok(Self {
            resampler,
            input: Vec::with_capacity(INPUT_CHUNK_SIZE * 2),
            output: Vec::with_capacity(OPUS_FRAME_SAMPLES * 2),
            opus: OpusFramer::new()?,
        })
    }

    fn push(&mut self, samples: &[f32]) -> Vec<EncodedFrame> {
        match self.resampler.as_mut() {
            None => self.output.extend_from_slice(samples),
            Some(resampler) => {
                self.input.extend_from_slice(samples);
                loop {
                    let needed = resampler.input_frames_next();
                    if self.input.len() < needed {
                        break;
                    }
                    let chunk: Vec<f32> = self.input.drain(..needed).collect();
                    match resampler.process(&[chunk.as_slice()], None) {
                        Ok(resampled) => {
                            if let Some(channel) = resampled.first() {
                                self.output.extend_from_slice(channel);
                            }
                        }
                        Err(e) => tracing::warn!("failed to resample microphone input: {}", e),
                    }
                }
            }
        }

        let mut frames = Vec::new();
        while self.output.len() >= OPUS_FRAME_SAMPLES {
            let pcm: Vec<f32> = self.output.drain(..OPUS_FRAME_SAMPLES).collect();
            match self.opus.encode(&audio::to_pcm16(&pcm)) {
                Ok(data) => frames.push(EncodedFrame {
                    data,
                    duration: FRAME_DURATION,
                }),
                Err(e) => tracing::warn!("dropping microphone frame: {}", e),
            }
        }
        frames
    }
}

fn build_stream(device_name: Option<String>, raw_tx: mpsc::Sender<Vec<f32>>) -> Result<(Stream, String, f64), CaptureError> {
    let input = device::get_or_default_input(device_name)?;
    let name = input.name().unwrap_or_else(|_| "unknown".to_string());
    let config = input
        .default_input_config()
        .map_err(|e| CaptureError::classify(e.to_string()))?
        .config();
    let channels = config.channels as usize;
    let sample_rate = config.sample_rate.0 as f64;
    tracing::debug!("input: device={:?}, config={:?}", &name, &config);

    let stream = input.build_input_stream(
        &config,
        move |data: &[f32], _: &cpal::InputCallbackInfo| {
            // the receiver is gone once capture has been stopped
            let _ = raw_tx.send(audio::downmix(data, channels));
        },
        move |err| tracing::error!("an error occurred on input stream: {}", err),
        None,
    )?;
    stream.play()?;
    Ok((stream, name, sample_rate))
}

/// A live microphone. The hardware stays open until [`Microphone::stop`] is
/// called or the value is dropped.
pub struct Microphone {
    name: String,
    running: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl Microphone {
    /// Opens the device and starts delivering Opus frames to `on_frame` from a
    /// capture thread. Returning `false` from `on_frame` stops capture.
    ///
    /// Blocks until the device has either started or failed.
    pub fn open<F>(device_name: Option<String>, mut on_frame: F) -> Result<Self, CaptureError>
    where
        F: FnMut(EncodedFrame) -> bool + Send + 'static,
    {
        let (ready_tx, ready_rx) = mpsc::channel::<Result<String, CaptureError>>();
        let running = Arc::new(AtomicBool::new(true));
        let flag = running.clone();

        let handle = std::thread::Builder::new()
            .name("microphone".to_string())
            .spawn(move || {
                let (raw_tx, raw_rx) = mpsc::channel::<Vec<f32>>();
                let (stream, name, sample_rate) = match build_stream(device_name, raw_tx) {
                    Ok(opened) => opened,
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                };
                let mut encoder = match FrameEncoder::new(sample_rate) {
                    Ok(encoder) => encoder,
                    Err(e) => {
                        let _ = ready_tx.send(Err(CaptureError::Stream(e.to_string())));
                        return;
                    }
                };
                let _ = ready_tx.send(Ok(name));

                'capture: while flag.load(Ordering::Acquire) {
                    match raw_rx.recv_timeout(POLL_INTERVAL) {
                        Ok(samples) => {
                            for frame in encoder.push(&samples) {
                                if !on_frame(frame) {
                                    break 'capture;
                                }
                            }
                        }
                        Err(mpsc::RecvTimeoutError::Timeout) => continue,
                        Err(mpsc::RecvTimeoutError::Disconnected) => break,
                    }
                }
                flag.store(false, Ordering::Release);
                drop(stream);
                tracing::debug!("microphone released");
            })
            .map_err(|e| CaptureError::Stream(e.to_string()))?;

        match ready_rx.recv() {
            Ok(Ok(name)) => Ok(Self {
                name,
                running,
                handle: Some(handle),
            }),
            Ok(Err(e)) => {
                let _ = handle.join();
                Err(e)
            }
            Err(_) => {
                let _ = handle.join();
                Err(CaptureError::Stream("capture thread exited before starting".to_string()))
            }
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_live(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Stops capture and waits for the device to be released.
    pub fn stop(&mut self) {
        self.running.store(false, Ordering::Release);
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                tracing::error!("microphone thread panicked");
            }
        }
    }
}

impl Drop for Microphone {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_capture_errors() {
        assert!(matches!(
            CaptureError::classify("Permission denied by the system".to_string()),
            CaptureError::PermissionDenied(_)
        ));
        assert!(matches!(
            CaptureError::classify("The requested device is no longer available".to_string()),
            CaptureError::Stream(_)
        ));
        assert!(matches!(
            CaptureError::classify("device not available".to_string()),
            CaptureError::DeviceUnavailable(_)
        ));
    }

    #[test]
    fn test_frame_encoder_emits_20ms_frames() {
        let mut encoder = FrameEncoder::new(OPUS_SAMPLE_RATE).unwrap();
        assert!(encoder.push(&vec![0.0; OPUS_FRAME_SAMPLES - 1]).is_empty());
        let frames = encoder.push(&vec![0.0; OPUS_FRAME_SAMPLES + 1]);
        assert_eq!(frames.len(), 2);
        assert!(frames.iter().all(|f| f.duration == FRAME_DURATION && !f.data.is_empty()));
    }
}
