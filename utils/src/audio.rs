use std::time::Duration;

use audiopus::coder::{Decoder, Encoder};
use audiopus::{Application, Channels, MutSignals, SampleRate};
use ringbuf::HeapRb;
use rubato::{FastFixedIn, PolynomialDegree};

/// WebRTC carries Opus on a 48 kHz clock regardless of the capture rate.
pub const OPUS_SAMPLE_RATE: f64 = 48000.0;
pub const FRAME_DURATION: Duration = Duration::from_millis(20);
/// 20 ms of mono audio at 48 kHz.
pub const OPUS_FRAME_SAMPLES: usize = 960;

const MAX_OPUS_FRAME_BYTES: usize = 4000;
/// 120 ms at 48 kHz, the longest frame Opus can produce.
const MAX_DECODED_SAMPLES: usize = 5760;

pub fn create_resampler(in_sampling_rate: f64, out_sampling_rate: f64, chunk_size: usize) -> anyhow::Result<FastFixedIn<f32>> {
    let resampler = FastFixedIn::<f32>::new(
        out_sampling_rate / in_sampling_rate,
        1.0,
        PolynomialDegree::Cubic,
        chunk_size,
        1,
    )?;
    Ok(resampler)
}

pub fn shared_buffer(size: usize) -> HeapRb<f32> {
    HeapRb::new(size)
}

/// Averages interleaved frames down to a single channel.
pub fn downmix(data: &[f32], channels: usize) -> Vec<f32> {
    if channels <= 1 {
        return data.to_vec();
    }
    data.chunks(channels)
        .map(|frame| frame.iter().sum::<f32>() / frame.len() as f32)
        .collect()
}

pub fn to_pcm16(samples: &[f32]) -> Vec<i16> {
    samples
        .iter()
        .map(|&sample| (sample.clamp(-1.0, 1.0) * i16::MAX as f32) as i16)
        .collect()
}

pub fn from_pcm16(samples: &[i16]) -> Vec<f32> {
    samples
        .iter()
        .map(|&v| (v as f32 / i16::MAX as f32).clamp(-1.0, 1.0))
        .collect()
}

/// Opus encoder/decoder pair for 48 kHz mono voice.
pub struct OpusFramer {
    encoder: Encoder,
    decoder: Decoder,
}

impl OpusFramer {
    pub fn new() -> anyhow::Result<Self> {
        let encoder = Encoder::new(SampleRate::Hz48000, Channels::Mono, Application::Voip)
            .map_err(|e| anyhow::anyhow!("failed to create Opus encoder: {e}"))?;
        let decoder = Decoder::new(SampleRate::Hz48000, Channels::Mono)
            .map_err(|e| anyhow::anyhow!("failed to create Opus decoder: {e}"))?;
        Ok(Self { encoder, decoder })
    }

    /// Encodes exactly one [`OPUS_FRAME_SAMPLES`] frame.
    pub fn encode(&mut self, pcm: &[i16]) -> anyhow::Result<Vec<u8>> {
        let mut output = vec![0u8; MAX_OPUS_FRAME_BYTES];
        let len = self
            .encoder
            .encode(pcm, &mut output)
            .map_err(|e| anyhow::anyhow!("Opus encode failed: {e}"))?;
        output.truncate(len);
        Ok(output)
    }

    pub fn decode(&mut self, packet: &[u8]) -> anyhow::Result<Vec<i16>> {
        let mut output = vec![0i16; MAX_DECODED_SAMPLES];
        let packet = audiopus::packet::Packet::try_from(packet)
            .map_err(|e| anyhow::anyhow!("invalid Opus packet: {e}"))?;
        let signals = MutSignals::try_from(output.as_mut_slice())
            .map_err(|e| anyhow::anyhow!("failed to create output buffer: {e}"))?;
        let decoded = self
            .decoder
            .decode(Some(packet), signals, false)
            .map_err(|e| anyhow::anyhow!("Opus decode failed: {e}"))?;
        output.truncate(decoded);
        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pcm16_roundtrip_clamps() {
        let samples = to_pcm16(&[0.0, 0.5, -2.0]);
        assert_eq!(samples[2], -i16::MAX);
        let back = from_pcm16(&samples);
        assert!((back[1] - 0.5).abs() < 1e-3);
        assert_eq!(back[2], -1.0);
    }

    #[test]
    fn test_downmix_stereo() {
        assert_eq!(downmix(&[1.0, 0.0, 0.5, 0.5], 2), vec![0.5, 0.5]);
        assert_eq!(downmix(&[0.25, 0.75], 1), vec![0.25, 0.75]);
    }
}
