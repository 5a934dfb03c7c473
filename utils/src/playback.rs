use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc};
use std::thread::JoinHandle;
use std::time::Duration;

use cpal::traits::{DeviceTrait, StreamTrait};
use ringbuf::traits::{Consumer, Producer, Split};
use ringbuf::{HeapCons, HeapProd};
use rubato::{FastFixedIn, Resampler};

use crate::audio::{self, OpusFramer, OPUS_FRAME_SAMPLES, OPUS_SAMPLE_RATE};
use crate::device;

const OUTPUT_LATENCY_MS: usize = 1000;
const POLL_INTERVAL: Duration = Duration::from_millis(50);

fn run_output(
    device_name: Option<String>,
    mut consumer: HeapCons<f32>,
    running: Arc<AtomicBool>,
    ready_tx: mpsc::Sender<anyhow::Result<f64>>,
) {
    let opened = (|| -> anyhow::Result<(cpal::Stream, f64)> {
        let output = device::get_or_default_output(device_name)?;
        let config = output.default_output_config()?.config();
        let channels = config.channels as usize;
        let sample_rate = config.sample_rate.0 as f64;
        tracing::debug!("output: device={:?}, config={:?}", output.name().ok(), &config);

        let stream = output.build_output_stream(
            &config,
            move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                for frame in data.chunks_mut(channels) {
                    let sample = consumer.try_pop().unwrap_or(0.0);
                    frame.iter_mut().for_each(|s| *s = sample);
                }
            },
            move |err| tracing::error!("an error occurred on output stream: {}", err),
            None,
        )?;
        stream.play()?;
        Ok((stream, sample_rate))
    })();

    let stream = match opened {
        Ok((stream, sample_rate)) => {
            let _ = ready_tx.send(Ok(sample_rate));
            stream
        }
        Err(e) => {
            let _ = ready_tx.send(Err(e));
            return;
        }
    };

    while running.load(Ordering::Acquire) {
        std::thread::sleep(POLL_INTERVAL);
    }
    drop(stream);
    tracing::debug!("speaker released");
}

/// Plays decoded remote audio on an output device.
pub struct Speaker {
    producer: HeapProd<f32>,
    decoder: OpusFramer,
    resampler: Option<FastFixedIn<f32>>,
    pending: Vec<f32>,
    running: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl Speaker {
    /// Blocks until the output stream has started or failed.
    pub fn open(device_name: Option<String>) -> anyhow::Result<Self> {
        let (ready_tx, ready_rx) = mpsc::channel();
        let running = Arc::new(AtomicBool::new(true));

        // the buffer is sized for the worst case device rate
        let buffer = audio::shared_buffer(192 * OUTPUT_LATENCY_MS);
        let (producer, consumer) = buffer.split();

        let flag = running.clone();
        let handle = std::thread::Builder::new()
            .name("speaker".to_string())
            .spawn(move || run_output(device_name, consumer, flag, ready_tx))?;

        let sample_rate = match ready_rx.recv() {
            Ok(Ok(rate)) => rate,
            Ok(Err(e)) => {
                let _ = handle.join();
                return Err(e);
            }
            Err(_) => {
                let _ = handle.join();
                return Err(anyhow::anyhow!("speaker thread exited before starting"));
            }
        };

        let resampler = if (sample_rate - OPUS_SAMPLE_RATE).abs() < f64::EPSILON {
            None
        } else {
            Some(audio::create_resampler(OPUS_SAMPLE_RATE, sample_rate, OPUS_FRAME_SAMPLES)?)
        };

        Ok(Self {
            producer,
            decoder: OpusFramer::new()?,
            resampler,
            pending: Vec::with_capacity(OPUS_FRAME_SAMPLES * 2),
            running,
            handle: Some(handle),
        })
    }

    /// Queues one Opus packet for playback.
    pub fn play_opus(&mut self, packet: &[u8]) -> anyhow::Result<()> {
        let pcm = self.decoder.decode(packet)?;
        let samples = audio::from_pcm16(&pcm);
        self.push(&samples);
        Ok(())
    }

    fn push(&mut self, samples: &[f32]) {
        let resampled = match self.resampler.as_mut() {
            None => samples.to_vec(),
            Some(resampler) => {
                self.pending.extend_from_slice(samples);
                let mut out = Vec::new();
                loop {
                    let needed = resampler.input_frames_next();
                    if self.pending.len() < needed {
                        break;
                    }
                    let chunk: Vec<f32> = self.pending.drain(..needed).collect();
                    match resampler.process(&[chunk.as_slice()], None) {
                        Ok(channels) => {
                            if let Some(channel) = channels.first() {
                                out.extend_from_slice(channel);
                            }
                        }
                        Err(e) => tracing::warn!("failed to resample playback audio: {}", e),
                    }
                }
                out
            }
        };

        let pushed = self.producer.push_slice(&resampled);
        if pushed < resampled.len() {
            tracing::warn!("playback buffer full, dropped {} samples", resampled.len() - pushed);
        }
    }

    pub fn stop(&mut self) {
        self.running.store(false, Ordering::Release);
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                tracing::error!("speaker thread panicked");
            }
        }
    }
}

impl Drop for Speaker {
    fn drop(&mut self) {
        self.stop();
    }
}
