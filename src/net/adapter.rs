//! Inbound frame validation/routing on top of the byte-exact parsers in
//! `proto::dmr`/`proto::p25` (spec §4.6).

use crate::proto::dmr::{self, Flco};
use crate::proto::p25;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RejectReason {
    WrongFlco,
    WrongDstId,
    WrongSlot,
    Malformed,
}

/// Validates an inbound DMR frame against the configured destination/slot,
/// rejecting private calls, wrong-talkgroup, and wrong-slot traffic per
/// spec §4.6.
pub fn accept_dmr(
    buf: &[u8],
    configured_dst_id: u32,
    configured_slot: u8,
) -> Result<dmr::DmrInboundHeader, RejectReason> {
    let hdr = dmr::parse_inbound(buf).ok_or(RejectReason::Malformed)?;
    if hdr.flco != Flco::Group {
        return Err(RejectReason::WrongFlco);
    }
    if hdr.dst_id != configured_dst_id {
        return Err(RejectReason::WrongDstId);
    }
    if hdr.slot_no != configured_slot {
        return Err(RejectReason::WrongSlot);
    }
    Ok(hdr)
}

/// Parses an inbound P25 frame; P25 talkgroup calls are the normal path,
/// unit-to-unit (private) frames are still parsed and may be forwarded to
/// decode (spec §4.6 "Unit-to-unit (PRIVATE) calls").
pub fn accept_p25(buf: &[u8]) -> Result<p25::P25InboundHeader, RejectReason> {
    p25::parse_inbound(buf).ok_or(RejectReason::Malformed)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dmr_frame(dst_id: u32, slot_high_bit: bool) -> Vec<u8> {
        let mut buf = vec![0u8; 53];
        buf[8..11].copy_from_slice(&dst_id.to_be_bytes()[1..]);
        if slot_high_bit {
            buf[15] |= 0x80;
        }
        buf
    }

    #[test]
    fn accepts_matching_group_call() {
        let buf = dmr_frame(2, false);
        assert!(accept_dmr(&buf, 2, 1).is_ok());
    }

    #[test]
    fn rejects_wrong_dst_id() {
        let buf = dmr_frame(5, false);
        assert_eq!(accept_dmr(&buf, 2, 1), Err(RejectReason::WrongDstId));
    }

    #[test]
    fn rejects_wrong_slot() {
        let buf = dmr_frame(2, true); // slot 2
        assert_eq!(accept_dmr(&buf, 2, 1), Err(RejectReason::WrongSlot));
    }

    #[test]
    fn rejects_private_call() {
        let mut buf = dmr_frame(2, false);
        buf[15] |= 0x40; // PRIVATE
        assert_eq!(accept_dmr(&buf, 2, 1), Err(RejectReason::WrongFlco));
    }
}
