//! Top-level bridge composition root (spec module-mapping table
//! `bridge::Bridge`): owns configuration, the shared audio/network state,
//! and the opaque collaborators, and starts the worker set from
//! [`crate::workers`].

use crate::audio::device::SoundDevice;
use crate::audio::{AudioMutex, AudioRings};
use crate::call::state::CallMachine;
use crate::config::Config;
use crate::crypto::p25::{P25Crypto, TekAlgo};
use crate::mdc::{Mdc1200Detector, NullMdcDetector};
use crate::net::peer::PeerNetwork;
use crate::proto::analog::AnalogAssembler;
use crate::proto::dmr::DmrAssembler;
use crate::proto::p25::P25Assembler;
use crate::ptt::{NullPttSink, PttSink};
use crate::types::{AMBE_CODEWORD_LEN, IMBE_CODEWORD_LEN};
use crate::udp::jitter::{JitterSchedule, JitterScheduler};
use crate::vocoder::{OpusVocoder, Vocoder};
use crate::workers::{self, ShutdownToken};
use parking_lot::Mutex as PlMutex;
use std::sync::Arc;

/// Everything the worker set mutates that isn't raw PCM (spec §4.7
/// `networkMutex`): call state, per-protocol frame assemblers, crypto, the
/// jitter scheduler, and the MDC/PTT collaborators. One mutex, short
/// critical sections, mirroring how `audioMutex` guards [`AudioRings`].
pub struct BridgeState {
    pub call: CallMachine,
    pub dmr_asm: DmrAssembler,
    pub p25_asm: P25Assembler,
    pub analog_asm: AnalogAssembler,
    pub crypto: P25Crypto,
    pub jitter: JitterScheduler,
    pub schedule: JitterSchedule,
    pub mdc: Box<dyn Mdc1200Detector>,
    pub ptt: Box<dyn PttSink>,
    pub tx_vocoder: Box<dyn Vocoder>,
    pub rx_vocoder: Box<dyn Vocoder>,
    /// Source ID supplied by the last MDC detection (spec §4.5 override
    /// precedence), cleared on call-end.
    pub src_id_override: u32,
    /// Source ID carried by the last UDP-metadata frame (spec §4.5 override
    /// precedence / reset-on-source-change), cleared on call-end.
    pub udp_src_id: u32,
    /// Set when an inbound P25 call's HDU/LDU2 crypto parameters don't match
    /// the configured TEK (spec §4.3 `ignoreCall`); decoding is suppressed
    /// until the next TDU.
    pub ignore_call: bool,
}

pub type NetworkMutex = PlMutex<BridgeState>;

impl BridgeState {
    pub fn new(config: &Config) -> anyhow::Result<Self> {
        let codeword_len = match config.tx_mode {
            crate::types::TxMode::Dmr => AMBE_CODEWORD_LEN,
            crate::types::TxMode::P25 => IMBE_CODEWORD_LEN,
            crate::types::TxMode::Analog => AMBE_CODEWORD_LEN,
        };
        let mut crypto = P25Crypto::new();
        if let Some(tek) = &config.tek {
            crypto.set_tek_algo(TekAlgo::from_str_config(&tek.tek_algo));
            crypto.set_tek_key_id(tek.tek_key_id);
            if let Some(key) = &tek.key {
                let bytes = parse_hex_key(key);
                crypto.set_key(&bytes);
            }
        }

        let mdc: Box<dyn Mdc1200Detector> = Box::new(NullMdcDetector);
        Ok(BridgeState {
            call: CallMachine::new(config.drop_time_ms, config.udp_hang_silence),
            dmr_asm: DmrAssembler::new(),
            p25_asm: P25Assembler::new(),
            analog_asm: AnalogAssembler::new(),
            crypto,
            jitter: JitterScheduler::new(config.udp_jitter as u64),
            schedule: JitterSchedule::new(),
            mdc,
            ptt: Box::new(NullPttSink),
            tx_vocoder: Box::new(OpusVocoder::new(codeword_len)?),
            rx_vocoder: Box::new(OpusVocoder::new(codeword_len)?),
            src_id_override: 0,
            udp_src_id: 0,
            ignore_call: false,
        })
    }
}

fn parse_hex_key(key: &str) -> Vec<u8> {
    (0..key.len())
        .step_by(2)
        .filter_map(|i| key.get(i..i + 2))
        .filter_map(|b| u8::from_str_radix(b, 16).ok())
        .collect()
}

pub struct Bridge {
    pub config: Arc<Config>,
    pub audio: Arc<AudioMutex>,
    pub state: Arc<NetworkMutex>,
    pub peer: Arc<dyn PeerNetwork>,
    pub sound_device: Box<dyn SoundDevice>,
    shutdown: ShutdownToken,
}

const RING_CAPACITY_FRAMES: usize = 50; // ~1s at 20 ms/frame

impl Bridge {
    pub fn new(
        config: Config,
        peer: Arc<dyn PeerNetwork>,
        sound_device: Box<dyn SoundDevice>,
    ) -> anyhow::Result<Self> {
        let state = BridgeState::new(&config)?;
        Ok(Bridge {
            config: Arc::new(config),
            audio: Arc::new(AudioMutex::new(AudioRings::new(RING_CAPACITY_FRAMES))),
            state: Arc::new(PlMutex::new(state)),
            peer,
            sound_device,
            shutdown: workers::new_shutdown_token(),
        })
    }

    /// Wires the peer network's In-Call Control callbacks to
    /// [`workers::apply_icc_command`] (spec §4.9). Callbacks take `&self`
    /// on the trait specifically so this can happen after the collaborator
    /// is already shared via `Arc`.
    fn install_icc_callbacks(&self) {
        let make_callback = || {
            let state = self.state.clone();
            let config = self.config.clone();
            let peer = self.peer.clone();
            let audio = self.audio.clone();
            Arc::new(move |cmd| {
                let mut st = state.lock();
                workers::apply_icc_command(&mut st, &config, cmd, peer.as_ref(), audio.as_ref());
            }) as crate::net::peer::IccCallback
        };
        self.peer.set_dmr_icc_callback(make_callback());
        self.peer.set_p25_icc_callback(make_callback());
        self.peer.set_analog_icc_callback(make_callback());
    }

    /// Starts local audio capture/playback (if configured) and the worker
    /// set, then blocks until `shutdown()` is called or every worker exits.
    pub async fn run(mut self) -> anyhow::Result<()> {
        self.install_icc_callbacks();

        if self.config.local_audio {
            self.sound_device.start(self.audio.clone())?;
        }

        let handles = workers::spawn_all(
            self.config.clone(),
            self.audio.clone(),
            self.state.clone(),
            self.peer.clone(),
            self.shutdown.clone(),
        );

        tracing::info!(identity = %self.config.identity, "bridge running");
        handles.join_all().await;
        Ok(())
    }

    pub fn shutdown_token(&self) -> ShutdownToken {
        self.shutdown.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_hex_key_decodes_even_length_hex() {
        assert_eq!(parse_hex_key("0a1b"), vec![0x0a, 0x1b]);
    }

    #[test]
    fn bridge_state_builds_from_minimal_p25_config() {
        let cfg = Config::load_str(
            r#"
txMode: p25
identity: t
srcId: 1
dstId: 2
"#,
        )
        .unwrap();
        assert!(BridgeState::new(&cfg).is_ok());
    }
}
