//! Preamble Generator (spec §4.8).
//!
//! Synthesizes a short single-frequency sine burst into the output ring at
//! the start of an inbound (network) call, when `preambleLeaderTone` is set.
//! Backpressure wins over tone fidelity: if there isn't enough free space in
//! the output ring the whole burst is skipped, not truncated.

use super::ring::RingBuffer;
use crate::types::SAMPLE_RATE_HZ;
use std::f32::consts::PI;

const AMPLITUDE: f32 = 0.2;

/// `toSamples(8000, 1, ms)` from spec §4.8.
pub fn to_samples(sample_rate: u32, channels: u32, ms: u32) -> usize {
    (sample_rate as u64 * channels as u64 * ms as u64 / 1000) as usize
}

/// Generates `frame_count` samples of a `tone_hz` sine at 16-bit amplitude
/// `AMPLITUDE * i16::MAX`, mono, at [`SAMPLE_RATE_HZ`].
fn generate_sine(tone_hz: u16, frame_count: usize) -> Vec<i16> {
    let mut out = Vec::with_capacity(frame_count);
    let step = 2.0 * PI * tone_hz as f32 / SAMPLE_RATE_HZ as f32;
    for n in 0..frame_count {
        let v = (step * n as f32).sin() * AMPLITUDE * i16::MAX as f32;
        out.push(v as i16);
    }
    out
}

/// Writes a preamble tone into `output` if there is room; logs and skips
/// silently otherwise. Returns `true` if the tone was written.
pub fn emit_preamble(output: &mut RingBuffer, tone_hz: u16, length_ms: u32) -> bool {
    let frame_count = to_samples(SAMPLE_RATE_HZ, 1, length_ms);
    if frame_count > output.free_space() {
        tracing::error!(
            frame_count,
            free_space = output.free_space(),
            "preamble tone abandoned, insufficient output ring space"
        );
        return false;
    }
    let tone = generate_sine(tone_hz, frame_count);
    output.add_data(&tone);
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn to_samples_matches_spec_example() {
        assert_eq!(to_samples(8000, 1, 200), 1600);
    }

    #[test]
    fn emits_when_space_available() {
        let mut ring = RingBuffer::new(4000);
        assert!(emit_preamble(&mut ring, 2175, 200));
        assert_eq!(ring.data_size(), 1600);
    }

    #[test]
    fn skips_silently_when_ring_too_small() {
        let mut ring = RingBuffer::new(100);
        assert!(!emit_preamble(&mut ring, 2175, 200));
        assert_eq!(ring.data_size(), 0);
    }
}
