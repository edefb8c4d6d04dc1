use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;

use crate::error::DecodeError;

/// Rate of captured/outgoing audio on the wire.
pub const CAPTURE_RATE_HZ: u32 = 16_000;
/// Rate of incoming synthesized audio.
pub const PLAYBACK_RATE_HZ: u32 = 24_000;
/// Fixed capture block size. Bounds end-to-end latency (256 ms at 16 kHz)
/// without paying per-block overhead on every device callback.
pub const CAPTURE_BLOCK_SAMPLES: usize = 4096;

/// A wire-format unit of audio: 16-bit signed linear PCM. Immutable once
/// produced, moved stage to stage rather than shared.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioFrame {
    pub pcm: Vec<i16>,
    pub channels: u16,
    pub sample_rate: u32,
}

impl AudioFrame {
    pub fn duration_secs(&self) -> f64 {
        let frames = self.pcm.len() / self.channels.max(1) as usize;
        frames as f64 / self.sample_rate as f64
    }

    /// Wire descriptor identifying encoding and rate, e.g. `audio/pcm;rate=16000`.
    pub fn mime_type(&self) -> String {
        format!("audio/pcm;rate={}", self.sample_rate)
    }

    pub fn to_le_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(self.pcm.len() * 2);
        for sample in &self.pcm {
            bytes.extend_from_slice(&sample.to_le_bytes());
        }
        bytes
    }

    pub fn to_base64(&self) -> String {
        BASE64.encode(self.to_le_bytes())
    }
}

/// Converts a block of normalized float samples into a mono wire frame.
///
/// Out-of-range samples clamp (never wrap), and non-finite samples become
/// silence: a capture glitch must not abort the session, so this stage has
/// no error path at all.
pub fn encode_block(raw: &[f32], source_rate: u32) -> AudioFrame {
    let pcm = raw
        .iter()
        .map(|&s| {
            if !s.is_finite() {
                return 0;
            }
            (s * 32767.0).round().clamp(i16::MIN as f32, i16::MAX as f32) as i16
        })
        .collect();
    AudioFrame {
        pcm,
        channels: 1,
        sample_rate: source_rate,
    }
}

/// A decoded frame ready for device playback: normalized floats,
/// de-interleaved per channel.
#[derive(Debug, Clone, PartialEq)]
pub struct PlayableFrame {
    pub channel_data: Vec<Vec<f32>>,
    pub sample_rate: u32,
}

impl PlayableFrame {
    pub fn frame_count(&self) -> usize {
        self.channel_data.first().map_or(0, Vec::len)
    }

    pub fn duration_secs(&self) -> f64 {
        self.frame_count() as f64 / self.sample_rate as f64
    }

    /// Collapses to a single channel for the mono output path.
    pub fn into_mono(self) -> Vec<f32> {
        let channels = self.channel_data.len();
        if channels <= 1 {
            return self.channel_data.into_iter().next().unwrap_or_default();
        }
        let frames = self.channel_data[0].len();
        let mut mono = Vec::with_capacity(frames);
        for i in 0..frames {
            let sum: f32 = self.channel_data.iter().map(|ch| ch[i]).sum();
            mono.push(sum / channels as f32);
        }
        mono
    }
}

/// Inverse of encoding: reinterprets the byte buffer as consecutive i16
/// little-endian samples, de-interleaves by channel, and rescales to
/// normalized floats.
///
/// The only failure is a byte length that is not a whole number of
/// `2 * channels`-byte sample groups; the caller drops such frames.
pub fn decode_frame(
    bytes: &[u8],
    sample_rate: u32,
    channels: u16,
) -> Result<PlayableFrame, DecodeError> {
    let group = 2 * channels.max(1) as usize;
    if bytes.len() % group != 0 {
        return Err(DecodeError {
            len: bytes.len(),
            channels,
        });
    }

    let frames = bytes.len() / group;
    let mut channel_data = vec![Vec::with_capacity(frames); channels.max(1) as usize];
    for (i, pair) in bytes.chunks_exact(2).enumerate() {
        let sample = i16::from_le_bytes([pair[0], pair[1]]);
        channel_data[i % channels.max(1) as usize].push(sample as f32 / 32768.0);
    }

    Ok(PlayableFrame {
        channel_data,
        sample_rate,
    })
}
