//! Ring buffers, gain staging, and the preamble generator -- the audio side
//! of the bridge (spec §4.1, §4.2 gain staging, §4.8).

pub mod device;
pub mod gain;
pub mod preamble;
pub mod ring;

use parking_lot::Mutex;
use ring::RingBuffer;

/// The shared state guarded by `audioMutex` in spec §4.7/§5: both PCM rings
/// plus anything the preamble generator touches. Held for the minimum span
/// needed -- encode/decode work happens outside the lock.
pub struct AudioRings {
    pub input: RingBuffer,
    pub output: RingBuffer,
}

impl AudioRings {
    pub fn new(capacity_frames: usize) -> Self {
        let capacity_samples = capacity_frames * crate::types::PCM_FRAME_SAMPLES;
        AudioRings {
            input: RingBuffer::new(capacity_samples),
            output: RingBuffer::new(capacity_samples),
        }
    }
}

pub type AudioMutex = Mutex<AudioRings>;
