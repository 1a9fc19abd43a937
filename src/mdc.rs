//! MDC-1200 in-band signalling (spec §1 "DELIBERATELY OUT OF SCOPE": the
//! detector DSP itself is an opaque, callback-based collaborator that
//! supplies unit IDs from PCM). The crate only owns the callback contract
//! and the documented unit-ID conversion hack (spec §9).

use crate::types::PcmFrame;

#[derive(Debug, Clone, Copy)]
pub struct MdcPacket {
    pub op: u8,
    pub arg: u8,
    pub unit_id: u32,
    pub extra: [u8; 4],
}

/// Opaque MDC-1200 detector collaborator: feed it PCM, it calls back with a
/// decoded packet when a PTT-ID burst is recognized. The DSP itself is out
/// of scope; only the shape of the contract lives here.
pub trait Mdc1200Detector: Send {
    fn feed(&mut self, frame: &PcmFrame) -> Option<MdcPacket>;
}

/// Never detects anything -- used when `detectAnalogMDC1200` is disabled, or
/// as a test double standing in for the real DSP.
pub struct NullMdcDetector;

impl Mdc1200Detector for NullMdcDetector {
    fn feed(&mut self, _frame: &PcmFrame) -> Option<MdcPacket> {
        None
    }
}

/// Bit-exact reproduction of the "nasty hack" documented in spec §9: the
/// source converts a raw 16-bit MDC unit ID to a decimal-looking value by
/// printing it as hex and then re-parsing that same string either as
/// decimal (if every digit happens to be a decimal digit) or as hex
/// otherwise. Preserved here for field compatibility, not because it is
/// sensible arithmetic.
pub fn unit_id_from_hex_hack(raw: u16) -> u32 {
    let hex = format!("{raw:04X}");
    if hex.chars().all(|c| c.is_ascii_digit()) {
        hex.parse::<u32>().unwrap_or(raw as u32)
    } else {
        raw as u32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_decimal_hex_reparsed_as_decimal() {
        // 0x1234 -> "1234" (all decimal digits) -> parsed as decimal 1234.
        assert_eq!(unit_id_from_hex_hack(0x1234), 1234);
    }

    #[test]
    fn non_decimal_hex_keeps_raw_value() {
        // 0xABCD -> "ABCD" contains non-digit chars -> raw value kept.
        assert_eq!(unit_id_from_hex_hack(0xABCD), 0xABCD as u32);
    }

    #[test]
    fn null_detector_never_fires() {
        let mut d = NullMdcDetector;
        assert!(d.feed(&[0i16; 160]).is_none());
    }
}
