//! DMR outbound/inbound frame assembly (spec §4.2a, §3 `FrameAssemblerState`).

use super::{embedded_lcss_for, OutboundFrame};
use crate::types::{Codeword, PcmFrame, AMBE_CODEWORD_LEN};
use crate::vocoder::Vocoder;

pub const SUPERFRAME_BURSTS: u8 = 6;
const CODEWORDS_PER_SUPERFRAME: usize = 3;
const AMBE_BUFFER_LEN: usize = CODEWORDS_PER_SUPERFRAME * AMBE_CODEWORD_LEN; // 27

pub struct DmrAssembler {
    ambe_buf: [u8; AMBE_BUFFER_LEN],
    ambe_count: usize,
    pub dmr_n: u8,
    pub dmr_seq_no: u32,
}

impl Default for DmrAssembler {
    fn default() -> Self {
        Self::new()
    }
}

impl DmrAssembler {
    pub fn new() -> Self {
        DmrAssembler {
            ambe_buf: [0u8; AMBE_BUFFER_LEN],
            ambe_count: 0,
            dmr_n: 0,
            dmr_seq_no: 0,
        }
    }

    pub fn reset(&mut self) {
        *self = DmrAssembler::new();
    }

    /// Packs the rolling 27-byte AMBE buffer into the 33-byte DMR payload
    /// per the byte layout documented in spec §4.2a.
    fn pack_payload(&self) -> [u8; 33] {
        let mut payload = [0u8; 33];
        payload[0..13].copy_from_slice(&self.ambe_buf[0..13]);
        payload[13] = (self.ambe_buf[13] & 0xF0) | ((self.ambe_buf[14] >> 4) & 0x0F);
        // bytes 14..19 left for sync/embedded-signalling, filled by the caller.
        payload[20..33].copy_from_slice(&self.ambe_buf[14..27]);
        payload
    }

    /// Feeds one PCM frame through `vocoder`, accumulating AMBE codewords
    /// and emitting DMR frames as the 3-codeword / 6-burst superframe
    /// windows complete. Returns the frames produced for this PCM frame (0,
    /// 1, or 2 -- the header plus the first data frame of a call).
    pub fn push_frame(
        &mut self,
        pcm: &PcmFrame,
        vocoder: &mut dyn Vocoder,
        src_id: u32,
        dst_id: u32,
        grant_demand: bool,
    ) -> Vec<OutboundFrame> {
        let codeword = vocoder.encode(pcm);
        self.push_codeword(&codeword, src_id, dst_id, grant_demand)
    }

    pub fn push_codeword(
        &mut self,
        codeword: &Codeword,
        src_id: u32,
        dst_id: u32,
        grant_demand: bool,
    ) -> Vec<OutboundFrame> {
        let offset = self.ambe_count * AMBE_CODEWORD_LEN;
        self.ambe_buf[offset..offset + AMBE_CODEWORD_LEN]
            .copy_from_slice(&codeword.0[..AMBE_CODEWORD_LEN]);
        self.ambe_count += 1;

        let mut out = Vec::new();
        if self.ambe_count == CODEWORDS_PER_SUPERFRAME {
            if self.dmr_seq_no == 0 {
                out.push(OutboundFrame::DmrVoiceLcHeader {
                    src_id,
                    dst_id,
                    control: if grant_demand { 0x80 } else { 0x00 },
                });
            }
            let _lcss = embedded_lcss_for(self.dmr_n);
            out.push(OutboundFrame::DmrVoiceFrame {
                payload: self.pack_payload(),
                sync: self.dmr_n == 0,
            });

            self.dmr_n = (self.dmr_n + 1) % SUPERFRAME_BURSTS;
            self.ambe_count = 0;
            self.dmr_seq_no += 1;
        }
        out
    }

    /// Emits three null-AMBE voice frames then a terminator, per spec
    /// §4.2a "silence hang" call-end behavior.
    pub fn silence_hang_and_terminate(
        &mut self,
        src_id: u32,
        dst_id: u32,
    ) -> Vec<OutboundFrame> {
        let null_ambe = Codeword(vec![0u8; AMBE_CODEWORD_LEN]);
        let mut out = Vec::new();
        for _ in 0..3 {
            out.extend(self.push_codeword(&null_ambe, src_id, dst_id, false));
        }
        out.push(OutboundFrame::DmrTerminatorWithLc { src_id, dst_id });
        out
    }

    pub fn terminate(&self, src_id: u32, dst_id: u32) -> OutboundFrame {
        OutboundFrame::DmrTerminatorWithLc { src_id, dst_id }
    }
}

/// Parsed inbound DMR frame header fields (spec §4.6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flco {
    Group,
    Private,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DmrInboundHeader {
    pub seq_no: u8,
    pub src_id: u32,
    pub dst_id: u32,
    pub flco: Flco,
    pub slot_no: u8,
    pub data_sync: bool,
    pub voice_sync: bool,
    pub data_type: Option<u8>,
    pub payload: [u8; 33],
}

fn u24_be(b: &[u8]) -> u32 {
    ((b[0] as u32) << 16) | ((b[1] as u32) << 8) | (b[2] as u32)
}

/// Parses a raw inbound DMR network frame per spec §4.6's byte-exact
/// offsets. Returns `None` if the buffer is too short to contain a frame.
pub fn parse_inbound(buf: &[u8]) -> Option<DmrInboundHeader> {
    if buf.len() < 53 {
        return None;
    }
    let seq_no = buf[4];
    let src_id = u24_be(&buf[5..8]);
    let dst_id = u24_be(&buf[8..11]);
    let flco = if buf[15] & 0x40 != 0 {
        Flco::Private
    } else {
        Flco::Group
    };
    let slot_no = if buf[15] & 0x80 != 0 { 2 } else { 1 };
    let data_sync = buf[15] & 0x20 != 0;
    let voice_sync = buf[15] & 0x10 != 0;
    let data_type = if data_sync { Some(buf[15] & 0x0F) } else { None };
    let mut payload = [0u8; 33];
    payload.copy_from_slice(&buf[20..53]);
    Some(DmrInboundHeader {
        seq_no,
        src_id,
        dst_id,
        flco,
        slot_no,
        data_sync,
        voice_sync,
        data_type,
        payload,
    })
}

/// Extracts the 27-byte rolling AMBE buffer back out of a 33-byte DMR
/// payload, the inverse of [`DmrAssembler::pack_payload`].
pub fn unpack_payload(payload: &[u8; 33]) -> [u8; AMBE_BUFFER_LEN] {
    let mut ambe = [0u8; AMBE_BUFFER_LEN];
    ambe[0..13].copy_from_slice(&payload[0..13]);
    ambe[13] = (payload[13] & 0xF0) | (ambe[13] & 0x0F);
    ambe[14..27].copy_from_slice(&payload[20..33]);
    // the split high nibble in payload[13] duplicates ambe[14]'s high
    // nibble; ambe[14] itself is already fully recovered from payload[20].
    ambe
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vocoder::NullVocoder;

    #[test]
    fn every_three_ambe_produce_one_voice_frame() {
        let mut asm = DmrAssembler::new();
        let mut voc = NullVocoder::ambe();
        let pcm = [0i16; 160];
        let mut frame_count = 0;
        let mut header_count = 0;
        for _ in 0..18 {
            for f in asm.push_frame(&pcm, &mut voc, 1, 2, false) {
                match f {
                    OutboundFrame::DmrVoiceLcHeader { .. } => header_count += 1,
                    OutboundFrame::DmrVoiceFrame { .. } => frame_count += 1,
                    _ => {}
                }
            }
        }
        // 18 PcmFrames / 3 per voice frame = 6 voice frames.
        assert_eq!(frame_count, 6);
        assert_eq!(header_count, 1);
    }

    #[test]
    fn first_voice_frame_of_call_preceded_by_exactly_one_header() {
        let mut asm = DmrAssembler::new();
        let mut voc = NullVocoder::ambe();
        let pcm = [0i16; 160];
        let mut saw_header_before_frame = false;
        let mut saw_frame = false;
        for _ in 0..3 {
            for f in asm.push_frame(&pcm, &mut voc, 1, 2, false) {
                match f {
                    OutboundFrame::DmrVoiceLcHeader { .. } => {
                        assert!(!saw_frame, "header must precede the first voice frame");
                        saw_header_before_frame = true;
                    }
                    OutboundFrame::DmrVoiceFrame { .. } => saw_frame = true,
                    _ => {}
                }
            }
        }
        assert!(saw_header_before_frame && saw_frame);
    }

    #[test]
    fn dmr_n_wraps_after_six_bursts() {
        let mut asm = DmrAssembler::new();
        let mut voc = NullVocoder::ambe();
        let pcm = [0i16; 160];
        for _ in 0..36 {
            asm.push_frame(&pcm, &mut voc, 1, 2, false);
        }
        assert_eq!(asm.dmr_n, 0);
    }

    #[test]
    fn grant_demand_sets_header_control_byte() {
        let mut asm = DmrAssembler::new();
        let mut voc = NullVocoder::ambe();
        let pcm = [0i16; 160];
        let mut control = None;
        for f in asm.push_frame(&pcm, &mut voc, 1, 2, true) {
            if let OutboundFrame::DmrVoiceLcHeader { control: c, .. } = f {
                control = Some(c);
            }
        }
        assert_eq!(control, Some(0x80));
    }

    #[test]
    fn inbound_parse_rejects_short_buffers() {
        assert!(parse_inbound(&[0u8; 10]).is_none());
    }

    #[test]
    fn inbound_parse_extracts_fields() {
        let mut buf = [0u8; 53];
        buf[4] = 7;
        buf[5..8].copy_from_slice(&[0, 0, 42]);
        buf[8..11].copy_from_slice(&[0, 0, 99]);
        buf[15] = 0x80; // slot 2, group
        let hdr = parse_inbound(&buf).unwrap();
        assert_eq!(hdr.seq_no, 7);
        assert_eq!(hdr.src_id, 42);
        assert_eq!(hdr.dst_id, 99);
        assert_eq!(hdr.slot_no, 2);
        assert_eq!(hdr.flco, Flco::Group);
    }
}
