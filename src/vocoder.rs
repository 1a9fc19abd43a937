//! The MBE/IMBE/AMBE vocoder is deliberately out of scope (spec §1): this
//! crate treats it as an opaque PCM<->codeword black box behind the
//! [`Vocoder`] trait. `NullVocoder` is a deterministic test double;
//! `OpusVocoder` is a real (if not protocol-accurate) stand-in so the
//! pipeline is runnable end-to-end without a proprietary AMBE DSP.

use crate::types::{Codeword, PcmFrame, AMBE_CODEWORD_LEN, IMBE_CODEWORD_LEN, PCM_FRAME_SAMPLES};

pub trait Vocoder: Send {
    fn encode(&mut self, frame: &PcmFrame) -> Codeword;
    fn decode(&mut self, codeword: &Codeword) -> PcmFrame;
    /// Length in bytes of this vocoder's codeword (9 for AMBE, 11 for IMBE).
    fn codeword_len(&self) -> usize;
}

/// Deterministic black-box double: truncates/zero-pads PCM bytes into the
/// codeword and back. Good enough to exercise frame assembly and call-state
/// logic without a real DSP.
pub struct NullVocoder {
    codeword_len: usize,
}

impl NullVocoder {
    pub fn ambe() -> Self {
        NullVocoder {
            codeword_len: AMBE_CODEWORD_LEN,
        }
    }

    pub fn imbe() -> Self {
        NullVocoder {
            codeword_len: IMBE_CODEWORD_LEN,
        }
    }
}

impl Vocoder for NullVocoder {
    fn encode(&mut self, frame: &PcmFrame) -> Codeword {
        let mut bytes = vec![0u8; self.codeword_len];
        for (i, sample) in frame.iter().enumerate().take(self.codeword_len / 2) {
            let b = sample.to_le_bytes();
            bytes[i * 2] = b[0];
            if i * 2 + 1 < self.codeword_len {
                bytes[i * 2 + 1] = b[1];
            }
        }
        Codeword(bytes)
    }

    fn decode(&mut self, codeword: &Codeword) -> PcmFrame {
        let mut frame = [0i16; PCM_FRAME_SAMPLES];
        for (i, chunk) in codeword.0.chunks(2).enumerate() {
            if i >= PCM_FRAME_SAMPLES {
                break;
            }
            frame[i] = match chunk {
                [lo, hi] => i16::from_le_bytes([*lo, *hi]),
                [lo] => *lo as i16,
                _ => 0,
            };
        }
        frame
    }

    fn codeword_len(&self) -> usize {
        self.codeword_len
    }
}

/// Wraps the real `opus` codec as the pluggable vocoder strategy the way
/// spec §9 "Conditional external vocoder" treats the AMBE DLL: a strategy
/// selection behind the same trait, the core stays vocoder-agnostic.
pub struct OpusVocoder {
    encoder: opus::Encoder,
    decoder: opus::Decoder,
    codeword_len: usize,
}

impl OpusVocoder {
    pub fn new(codeword_len: usize) -> anyhow::Result<Self> {
        let encoder = opus::Encoder::new(
            crate::types::SAMPLE_RATE_HZ,
            opus::Channels::Mono,
            opus::Application::Voip,
        )?;
        let decoder = opus::Decoder::new(crate::types::SAMPLE_RATE_HZ, opus::Channels::Mono)?;
        Ok(OpusVocoder {
            encoder,
            decoder,
            codeword_len,
        })
    }
}

impl Vocoder for OpusVocoder {
    fn encode(&mut self, frame: &PcmFrame) -> Codeword {
        let mut buf = vec![0u8; 400];
        match self.encoder.encode(frame, &mut buf) {
            Ok(len) => {
                buf.truncate(len);
                buf.resize(self.codeword_len, 0);
                Codeword(buf)
            }
            Err(e) => {
                tracing::error!(error = %e, "vocoder encode error");
                Codeword(vec![0u8; self.codeword_len])
            }
        }
    }

    fn decode(&mut self, codeword: &Codeword) -> PcmFrame {
        let mut pcm = [0i16; PCM_FRAME_SAMPLES];
        // MBE is error-tolerant per spec §7 CodecError: still play the
        // frame (silence) on decode failure rather than propagating.
        if let Err(e) = self.decoder.decode(&codeword.0, &mut pcm, false) {
            tracing::warn!(error = %e, "vocoder decode error, playing silence");
        }
        pcm
    }

    fn codeword_len(&self) -> usize {
        self.codeword_len
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_vocoder_round_trips_low_order_samples() {
        let mut v = NullVocoder::ambe();
        let mut frame = [0i16; PCM_FRAME_SAMPLES];
        frame[0] = 1234;
        frame[1] = -5678;
        let cw = v.encode(&frame);
        assert_eq!(cw.0.len(), AMBE_CODEWORD_LEN);
        let back = v.decode(&cw);
        assert_eq!(back[0], 1234);
        assert_eq!(back[1], -5678);
    }
}
