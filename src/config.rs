//! Parameter & Identity State (C10, spec §4.10) plus the ambient config
//! surface enumerated in §6.3. Loaded once at startup from a YAML document
//! (grounded on `original_source`'s `yaml::Node`-based `readParams()`);
//! read-mostly thereafter.

use crate::error::BridgeError;
use crate::types::TxMode;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct TekConfig {
    #[serde(default)]
    pub enable: bool,
    #[serde(rename = "tekAlgo", default = "default_tek_algo")]
    pub tek_algo: String,
    #[serde(rename = "tekKeyId", default)]
    pub tek_key_id: u16,
    #[serde(default)]
    pub key: Option<String>,
}

fn default_tek_algo() -> String {
    "aes".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(rename = "txMode")]
    pub tx_mode: TxMode,
    #[serde(default)]
    pub identity: String,

    #[serde(rename = "netId", default)]
    pub net_id: u32,
    #[serde(rename = "sysId", default)]
    pub sys_id: u32,
    #[serde(rename = "localTimeOffset", default)]
    pub local_time_offset: i32,

    #[serde(rename = "srcId")]
    pub src_id: u32,
    #[serde(rename = "dstId")]
    pub dst_id: u32,
    #[serde(default = "default_slot")]
    pub slot: u8,

    #[serde(rename = "overrideSourceIdFromMDC", default)]
    pub override_src_id_from_mdc: bool,
    #[serde(rename = "overrideSourceIdFromUDP", default)]
    pub override_src_id_from_udp: bool,
    #[serde(rename = "resetCallForSourceIdChange", default)]
    pub reset_call_for_source_id_change: bool,

    #[serde(rename = "rxAudioGain", default = "default_gain")]
    pub rx_audio_gain: f32,
    #[serde(rename = "txAudioGain", default = "default_gain")]
    pub tx_audio_gain: f32,
    #[serde(rename = "vocoderDecoderAudioGain", default = "default_gain")]
    pub vocoder_decoder_audio_gain: f32,
    #[serde(rename = "vocoderEncoderAudioGain", default = "default_gain")]
    pub vocoder_encoder_audio_gain: f32,
    #[serde(rename = "vocoderDecoderAutoGain", default)]
    pub vocoder_decoder_auto_gain: bool,

    #[serde(rename = "voxSampleLevel", default = "default_vox")]
    pub vox_sample_level: f32,
    #[serde(rename = "dropTimeMs", default = "default_drop_time")]
    pub drop_time_ms: u32,

    #[serde(rename = "detectAnalogMDC1200", default)]
    pub detect_analog_mdc1200: bool,

    #[serde(rename = "preambleLeaderTone", default)]
    pub preamble_leader_tone: bool,
    #[serde(rename = "preambleTone", default = "default_preamble_tone")]
    pub preamble_tone: u16,
    #[serde(rename = "preambleLength", default = "default_preamble_length")]
    pub preamble_length: u32,

    #[serde(rename = "grantDemand", default)]
    pub grant_demand: bool,

    #[serde(rename = "localAudio", default = "default_true")]
    pub local_audio: bool,
    #[serde(rename = "udpAudio", default)]
    pub udp_audio: bool,

    #[serde(rename = "udpSendAddress", default)]
    pub udp_send_address: String,
    #[serde(rename = "udpSendPort", default)]
    pub udp_send_port: u16,
    #[serde(rename = "udpReceiveAddress", default = "default_bind_addr")]
    pub udp_receive_address: String,
    #[serde(rename = "udpReceivePort", default)]
    pub udp_receive_port: u16,

    #[serde(rename = "udpMetadata", default)]
    pub udp_metadata: bool,
    #[serde(rename = "udpUseULaw", default)]
    pub udp_use_ulaw: bool,
    #[serde(rename = "udpNoIncludeLength", default)]
    pub udp_no_include_length: bool,
    #[serde(rename = "udpRTPFrames", default)]
    pub udp_rtp_frames: bool,
    #[serde(rename = "udpUsrp", default)]
    pub udp_usrp: bool,
    #[serde(rename = "udpInterFrameDelay", default)]
    pub udp_inter_frame_delay: u32,
    #[serde(rename = "udpJitter", default = "default_jitter")]
    pub udp_jitter: u32,
    #[serde(rename = "udpHangSilence", default)]
    pub udp_hang_silence: bool,

    /// FNE peer-network endpoint for the `UdpPeerNetwork` transport. Not
    /// part of the distilled parameter set -- the real peer session client
    /// is opaque (spec §1) and normally carries its own connection config;
    /// this is the minimal addition needed to make the bridge runnable
    /// end-to-end against a real socket.
    #[serde(rename = "peerAddress", default = "default_bind_addr")]
    pub peer_address: String,
    #[serde(rename = "peerPort", default = "default_peer_port")]
    pub peer_port: u16,

    #[serde(default)]
    pub tek: Option<TekConfig>,

    #[serde(rename = "dumpSampleLevel", default)]
    pub dump_sample_level: bool,
    #[serde(default)]
    pub trace: bool,
    #[serde(default)]
    pub debug: bool,
}

fn default_slot() -> u8 {
    1
}
fn default_gain() -> f32 {
    1.0
}
fn default_vox() -> f32 {
    30.0
}
fn default_drop_time() -> u32 {
    180
}
fn default_preamble_tone() -> u16 {
    2175
}
fn default_preamble_length() -> u32 {
    200
}
fn default_true() -> bool {
    true
}
fn default_bind_addr() -> String {
    "0.0.0.0".to_string()
}
fn default_jitter() -> u32 {
    200
}
fn default_peer_port() -> u16 {
    62031
}

impl Config {
    pub fn load_str(yaml: &str) -> Result<Self, BridgeError> {
        let mut cfg: Config =
            serde_yaml::from_str(yaml).map_err(|e| BridgeError::Config(e.to_string()))?;
        cfg.apply_mutual_exclusions();
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn load_file(path: &std::path::Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| BridgeError::Config(format!("{}: {e}", path.display())))?;
        Ok(Config::load_str(&text)?)
    }

    /// Enforces the mutual exclusions normative in spec §6.3.
    fn apply_mutual_exclusions(&mut self) {
        if self.udp_usrp {
            self.udp_metadata = false;
            self.udp_rtp_frames = false;
            self.udp_no_include_length = false;
            self.udp_use_ulaw = false;
        }
        if self.udp_rtp_frames {
            self.udp_no_include_length = true;
        }
        if self.udp_use_ulaw {
            self.udp_usrp = false;
            self.udp_metadata = false;
        }
        if !matches!(self.tx_mode, TxMode::P25) {
            if let Some(tek) = self.tek.as_mut() {
                tek.enable = false;
            }
        }
        if matches!(self.tx_mode, TxMode::P25) && self.udp_hang_silence && self.drop_time_ms < 360
        {
            self.drop_time_ms = 360;
        }
    }

    fn validate(&self) -> Result<(), BridgeError> {
        if self.udp_rtp_frames && !self.udp_use_ulaw {
            return Err(BridgeError::Config(
                "udpRTPFrames requires udpUseULaw".to_string(),
            ));
        }
        if matches!(self.tx_mode, TxMode::Dmr) && !(1..=2).contains(&self.slot) {
            return Err(BridgeError::Config(format!(
                "invalid DMR slot {}",
                self.slot
            )));
        }
        if let Some(tek) = &self.tek {
            if tek.enable {
                match tek.tek_algo.as_str() {
                    "aes" | "arc4" => {}
                    other => {
                        return Err(BridgeError::Config(format!(
                            "unsupported tekAlgo '{other}'"
                        )))
                    }
                }
                match &tek.key {
                    Some(k) if !k.is_empty() => {}
                    _ => {
                        return Err(BridgeError::Config(
                            "tek.enable requires tek.key".to_string(),
                        ))
                    }
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_yaml() -> String {
        r#"
txMode: p25
identity: bridge1
srcId: 1
dstId: 2
"#
        .to_string()
    }

    #[test]
    fn loads_minimal_config_with_defaults() {
        let cfg = Config::load_str(&base_yaml()).unwrap();
        assert_eq!(cfg.slot, 1);
        assert_eq!(cfg.drop_time_ms, 180);
        assert!((cfg.rx_audio_gain - 1.0).abs() < f32::EPSILON);
    }

    #[test]
    fn usrp_disables_metadata_rtp_length_ulaw() {
        let mut yaml = base_yaml();
        yaml.push_str("udpUsrp: true\nudpMetadata: true\nudpUseULaw: true\n");
        let cfg = Config::load_str(&yaml).unwrap();
        assert!(cfg.udp_usrp);
        assert!(!cfg.udp_metadata);
        assert!(!cfg.udp_use_ulaw);
    }

    #[test]
    fn rtp_forces_no_include_length_and_requires_ulaw() {
        let mut yaml = base_yaml();
        yaml.push_str("udpRTPFrames: true\nudpUseULaw: true\n");
        let cfg = Config::load_str(&yaml).unwrap();
        assert!(cfg.udp_no_include_length);
    }

    #[test]
    fn rtp_without_ulaw_is_rejected() {
        let mut yaml = base_yaml();
        yaml.push_str("udpRTPFrames: true\n");
        assert!(Config::load_str(&yaml).is_err());
    }

    #[test]
    fn dmr_and_analog_force_tek_disabled() {
        let mut yaml = r#"
txMode: dmr
identity: bridge1
srcId: 1
dstId: 2
"#
        .to_string();
        yaml.push_str("tek:\n  enable: true\n  tekAlgo: aes\n  tekKeyId: 1\n  key: \"00\"\n");
        let cfg = Config::load_str(&yaml).unwrap();
        assert!(!cfg.tek.unwrap().enable);
    }

    #[test]
    fn p25_hang_silence_raises_minimum_drop_time() {
        let mut yaml = base_yaml();
        yaml.push_str("udpHangSilence: true\ndropTimeMs: 100\n");
        let cfg = Config::load_str(&yaml).unwrap();
        assert_eq!(cfg.drop_time_ms, 360);
    }

    #[test]
    fn invalid_dmr_slot_is_rejected() {
        let mut yaml = r#"
txMode: dmr
identity: bridge1
srcId: 1
dstId: 2
"#
        .to_string();
        yaml.push_str("slot: 3\n");
        assert!(Config::load_str(&yaml).is_err());
    }
}
