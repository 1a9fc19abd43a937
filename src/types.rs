//! Core data model shared across the bridge (spec §3).

use std::time::Instant;

/// 20 ms of 8 kHz mono 16-bit PCM -- 160 samples, the unit every pipeline
/// stage operates on.
pub const PCM_FRAME_SAMPLES: usize = 160;
pub const SAMPLE_RATE_HZ: u32 = 8_000;

pub type PcmFrame = [i16; PCM_FRAME_SAMPLES];

pub const SILENT_FRAME: PcmFrame = [0i16; PCM_FRAME_SAMPLES];

/// An opaque vocoder codeword: 9 bytes for DMR AMBE, 11 bytes for P25 IMBE.
/// One codeword encodes exactly one [`PcmFrame`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Codeword(pub Vec<u8>);

pub const AMBE_CODEWORD_LEN: usize = 9;
pub const IMBE_CODEWORD_LEN: usize = 11;

impl Codeword {
    pub fn ambe(bytes: [u8; AMBE_CODEWORD_LEN]) -> Self {
        Codeword(bytes.to_vec())
    }

    pub fn imbe(bytes: [u8; IMBE_CODEWORD_LEN]) -> Self {
        Codeword(bytes.to_vec())
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.0
    }
}

/// Fixed at configuration time; never changes mid-run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TxMode {
    Dmr,
    P25,
    Analog,
}

/// Derived from which worker pushed the frame, not stored explicitly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallDirection {
    LocalMic,
    Udp,
    Network,
}

pub const RTP_TIMESTAMP_INVALID: u32 = u32::MAX;

/// Per-bridge call state; at most one active call at a time (spec §3, §4.5).
#[derive(Debug, Clone)]
pub struct CallState {
    pub active: bool,
    pub direction: CallDirection,
    pub stream_id: u32,
    pub src_id: u32,
    pub dst_id: u32,
    pub algo_id: u8,
    pub key_id: u16,
    pub start_time: Instant,
    pub last_pkt_time: Instant,

    // sequence counters, reset to 0 on call-end per the invariant in §3.
    pub dmr_seq_no: u32,
    pub dmr_n: u8,
    pub p25_n: u8,
    pub analog_n: u8,
    pub rtp_seq_no: u16,
    pub rtp_timestamp: u32,
}

impl CallState {
    pub fn idle() -> Self {
        let now = Instant::now();
        CallState {
            active: false,
            direction: CallDirection::LocalMic,
            stream_id: 0,
            src_id: 0,
            dst_id: 0,
            algo_id: 0,
            key_id: 0,
            start_time: now,
            last_pkt_time: now,
            dmr_seq_no: 0,
            dmr_n: 0,
            p25_n: 0,
            analog_n: 0,
            rtp_seq_no: 0,
            rtp_timestamp: RTP_TIMESTAMP_INVALID,
        }
    }

    /// `active ⇒ streamId ≠ 0`; `active=false ⇒` all sequence counters reset.
    pub fn invariant_holds(&self) -> bool {
        if self.active {
            self.stream_id != 0
        } else {
            self.dmr_seq_no == 0
                && self.dmr_n == 0
                && self.p25_n == 0
                && self.analog_n == 0
                && self.rtp_seq_no == 0
                && self.rtp_timestamp == RTP_TIMESTAMP_INVALID
        }
    }

    pub fn reset(&mut self) {
        *self = CallState::idle();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn idle_state_satisfies_invariant() {
        let s = CallState::idle();
        assert!(s.invariant_holds());
    }

    #[test]
    fn active_state_requires_nonzero_stream_id() {
        let mut s = CallState::idle();
        s.active = true;
        s.stream_id = 0;
        assert!(!s.invariant_holds());
        s.stream_id = 42;
        assert!(s.invariant_holds());
    }

    #[test]
    fn reset_clears_sequence_counters() {
        let mut s = CallState::idle();
        s.active = true;
        s.stream_id = 7;
        s.dmr_seq_no = 3;
        s.dmr_n = 2;
        s.p25_n = 5;
        s.analog_n = 9;
        s.rtp_seq_no = 11;
        s.rtp_timestamp = 123;
        s.reset();
        assert!(s.invariant_holds());
        assert!(!s.active);
    }
}
