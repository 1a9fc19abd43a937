//! UDP audio wire framing (spec §4.4, §6.1).

use crate::config::Config;

pub const USRP_HEADER_LEN: usize = 32;
pub const USRP_PAYLOAD_LEN: usize = 320;
const G711_RTP_PAYLOAD_TYPE: u8 = 0;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedUdpFrame {
    pub pcm: Vec<u8>,
    pub is_ulaw: bool,
    pub src_id_override: Option<u32>,
    pub dst_id_override: Option<u32>,
    /// `false` only for a USRP PTT==0 end-of-transmission marker.
    pub has_audio: bool,
}

/// Parses one UDP datagram per the exclusive, first-match-wins framing
/// rules in spec §4.4. Returns `None` on a malformed/rejected frame.
pub fn parse_frame(buf: &[u8], cfg: &Config) -> Option<ParsedUdpFrame> {
    if cfg.udp_usrp {
        return parse_usrp(buf);
    }
    if cfg.udp_rtp_frames && cfg.udp_use_ulaw {
        return parse_rtp(buf);
    }
    if cfg.udp_no_include_length {
        return Some(ParsedUdpFrame {
            pcm: buf.to_vec(),
            is_ulaw: cfg.udp_use_ulaw,
            src_id_override: None,
            dst_id_override: None,
            has_audio: true,
        });
    }
    parse_length_prefixed(buf, cfg)
}

fn parse_usrp(buf: &[u8]) -> Option<ParsedUdpFrame> {
    if buf.len() < USRP_HEADER_LEN || &buf[0..4] != b"USRP" {
        return None;
    }
    let ptt = buf[15];
    if ptt != 1 {
        return Some(ParsedUdpFrame {
            pcm: Vec::new(),
            is_ulaw: false,
            src_id_override: None,
            dst_id_override: None,
            has_audio: false,
        });
    }
    if buf.len() <= USRP_HEADER_LEN {
        return None;
    }
    let end = (USRP_HEADER_LEN + USRP_PAYLOAD_LEN).min(buf.len());
    Some(ParsedUdpFrame {
        pcm: buf[USRP_HEADER_LEN..end].to_vec(),
        is_ulaw: false,
        src_id_override: None,
        dst_id_override: None,
        has_audio: true,
    })
}

fn parse_rtp(buf: &[u8]) -> Option<ParsedUdpFrame> {
    if buf.len() < 12 {
        return None;
    }
    let payload_type = buf[1] & 0x7F;
    if payload_type != G711_RTP_PAYLOAD_TYPE {
        return None;
    }
    Some(ParsedUdpFrame {
        pcm: buf[12..].to_vec(),
        is_ulaw: true,
        src_id_override: None,
        dst_id_override: None,
        has_audio: true,
    })
}

fn parse_length_prefixed(buf: &[u8], cfg: &Config) -> Option<ParsedUdpFrame> {
    if buf.len() < 4 {
        return None;
    }
    let pcm_len = u32::from_be_bytes([buf[0], buf[1], buf[2], buf[3]]) as usize;
    let payload_start = 4;
    if buf.len() < payload_start + pcm_len {
        return None;
    }
    let pcm = buf[payload_start..payload_start + pcm_len].to_vec();

    let (mut src_id_override, mut dst_id_override) = (None, None);
    if cfg.udp_metadata {
        let dst_off = payload_start + pcm_len + 4;
        let src_off = payload_start + pcm_len + 8;
        if buf.len() >= src_off + 4 {
            dst_id_override = Some(u32::from_be_bytes([
                buf[dst_off],
                buf[dst_off + 1],
                buf[dst_off + 2],
                buf[dst_off + 3],
            ]));
            src_id_override = Some(u32::from_be_bytes([
                buf[src_off],
                buf[src_off + 1],
                buf[src_off + 2],
                buf[src_off + 3],
            ]));
        }
    }

    Some(ParsedUdpFrame {
        pcm,
        is_ulaw: cfg.udp_use_ulaw,
        src_id_override,
        dst_id_override,
        has_audio: true,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_cfg() -> Config {
        Config::load_str(
            r#"
txMode: analog
identity: t
srcId: 1
dstId: 2
"#,
        )
        .unwrap()
    }

    #[test]
    fn length_prefixed_frame_parses_pcm() {
        let cfg = base_cfg();
        let mut buf = vec![0u8, 0, 0, 4];
        buf.extend_from_slice(&[1, 2, 3, 4]);
        let parsed = parse_frame(&buf, &cfg).unwrap();
        assert_eq!(parsed.pcm, vec![1, 2, 3, 4]);
    }

    #[test]
    fn metadata_extracts_src_and_dst_after_pcm() {
        let mut cfg = base_cfg();
        cfg.udp_metadata = true;
        let mut buf = vec![0u8, 0, 0, 2];
        buf.extend_from_slice(&[9, 9]); // pcm
        buf.extend_from_slice(&[0, 0, 0, 5]); // dstId
        buf.extend_from_slice(&[0, 0, 0, 7]); // srcId
        let parsed = parse_frame(&buf, &cfg).unwrap();
        assert_eq!(parsed.dst_id_override, Some(5));
        assert_eq!(parsed.src_id_override, Some(7));
    }

    #[test]
    fn no_include_length_takes_whole_payload() {
        let mut cfg = base_cfg();
        cfg.udp_no_include_length = true;
        let buf = vec![1u8, 2, 3];
        let parsed = parse_frame(&buf, &cfg).unwrap();
        assert_eq!(parsed.pcm, buf);
    }

    #[test]
    fn usrp_ptt_zero_is_eot_marker_with_no_audio() {
        let mut cfg = base_cfg();
        cfg.udp_usrp = true;
        let mut buf = vec![0u8; 32];
        buf[0..4].copy_from_slice(b"USRP");
        buf[15] = 0;
        let parsed = parse_frame(&buf, &cfg).unwrap();
        assert!(!parsed.has_audio);
    }

    #[test]
    fn usrp_ptt_one_extracts_320_byte_payload() {
        let mut cfg = base_cfg();
        cfg.udp_usrp = true;
        let mut buf = vec![0u8; 32 + 320];
        buf[0..4].copy_from_slice(b"USRP");
        buf[15] = 1;
        let parsed = parse_frame(&buf, &cfg).unwrap();
        assert!(parsed.has_audio);
        assert_eq!(parsed.pcm.len(), 320);
    }

    #[test]
    fn rtp_rejects_non_g711_payload_type() {
        let mut cfg = base_cfg();
        cfg.udp_rtp_frames = true;
        cfg.udp_use_ulaw = true;
        let mut buf = vec![0u8; 12 + 160];
        buf[1] = 99; // wrong payload type
        assert!(parse_frame(&buf, &cfg).is_none());
    }

    #[test]
    fn rtp_accepts_g711_payload_type() {
        let mut cfg = base_cfg();
        cfg.udp_rtp_frames = true;
        cfg.udp_use_ulaw = true;
        let mut buf = vec![0u8; 12 + 160];
        buf[1] = G711_RTP_PAYLOAD_TYPE;
        let parsed = parse_frame(&buf, &cfg).unwrap();
        assert_eq!(parsed.pcm.len(), 160);
        assert!(parsed.is_ulaw);
    }
}
