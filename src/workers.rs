//! Audio Pipeline Worker Set (C7, spec §4.7): the audio worker, UDP-audio
//! worker, net-process worker, and call-watchdog as independent tokio
//! tasks, wired through `audioMutex`/`networkMutex` and the opaque peer
//! network -- the same one-task-per-concern shape as the teacher's
//! `network_task`/`decode_task` in `main.rs`, generalized from a single
//! fixed pipeline to the bridge's three selectable transmission modes.

use crate::audio::gain::apply_gain;
use crate::audio::preamble;
use crate::bridge::{BridgeState, NetworkMutex};
use crate::call::icc::{should_force_end, IccCommand};
use crate::call::state::{resolve_src_id, CallEvent, Phase};
use crate::config::Config;
use crate::net::adapter;
use crate::net::peer::{LinkControl, LowSpeedData, PeerNetwork};
use crate::proto::analog::ulaw_decode_frame;
use crate::proto::dmr;
use crate::proto::p25;
use crate::proto::OutboundFrame;
use crate::audio::AudioMutex;
use crate::types::{CallDirection, PcmFrame, TxMode, PCM_FRAME_SAMPLES};
use crate::udp::ingress;
use crate::udp::jitter::PendingUdpFrame;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::UdpSocket;
use tokio::task::JoinHandle;

pub type ShutdownToken = Arc<AtomicBool>;

pub fn new_shutdown_token() -> ShutdownToken {
    Arc::new(AtomicBool::new(false))
}

pub struct WorkerHandles {
    audio: JoinHandle<()>,
    udp_audio: Option<JoinHandle<()>>,
    net_process: JoinHandle<()>,
    call_watchdog: JoinHandle<()>,
}

impl WorkerHandles {
    pub async fn join_all(self) {
        let _ = self.audio.await;
        if let Some(h) = self.udp_audio {
            let _ = h.await;
        }
        let _ = self.net_process.await;
        let _ = self.call_watchdog.await;
    }
}

pub fn spawn_all(
    config: Arc<Config>,
    audio: Arc<AudioMutex>,
    state: Arc<NetworkMutex>,
    peer: Arc<dyn PeerNetwork>,
    shutdown: ShutdownToken,
) -> WorkerHandles {
    let audio_handle = tokio::spawn(audio_worker(
        config.clone(),
        audio.clone(),
        state.clone(),
        peer.clone(),
        shutdown.clone(),
    ));

    let udp_audio_handle = if config.udp_audio {
        Some(tokio::spawn(udp_audio_worker(
            config.clone(),
            audio.clone(),
            state.clone(),
            peer.clone(),
            shutdown.clone(),
        )))
    } else {
        None
    };

    let net_process_handle = tokio::spawn(net_process_worker(
        config.clone(),
        audio.clone(),
        state.clone(),
        peer.clone(),
        shutdown.clone(),
    ));

    let watchdog_handle = tokio::spawn(call_watchdog(config, audio, state, peer, shutdown));

    WorkerHandles {
        audio: audio_handle,
        udp_audio: udp_audio_handle,
        net_process: net_process_handle,
        call_watchdog: watchdog_handle,
    }
}

/// Mean absolute amplitude, normalized to `0.0..=1.0`, the same rough
/// measure spec §4.5's `voxSampleLevel` threshold is checked against.
fn vox_level(frame: &PcmFrame) -> f32 {
    let sum: i64 = frame.iter().map(|&s| (s as i64).abs()).sum();
    (sum as f32 / frame.len() as f32) / i16::MAX as f32
}

/// Encodes one PCM frame per the configured transmission mode and writes
/// whatever outbound frames result to the peer network (spec §4.2/§4.6).
fn encode_and_forward(st: &mut BridgeState, config: &Config, pcm: &PcmFrame, peer: &dyn PeerNetwork) {
    let src_id = resolve_src_id(
        0,
        st.src_id_override,
        config.override_src_id_from_mdc,
        st.udp_src_id,
        config.override_src_id_from_udp,
        config.src_id,
    );
    let dst_id = config.dst_id;
    let frames: Vec<OutboundFrame> = match config.tx_mode {
        TxMode::Dmr => {
            let BridgeState { tx_vocoder, dmr_asm, .. } = st;
            dmr_asm.push_frame(pcm, tx_vocoder.as_mut(), src_id, dst_id, config.grant_demand)
        }
        TxMode::P25 => {
            let BridgeState { tx_vocoder, p25_asm, crypto, .. } = st;
            let encrypted = crypto.tek_algo() != crate::crypto::p25::TekAlgo::Unencrypt;
            p25_asm.push_frame(pcm, tx_vocoder.as_mut(), crypto, encrypted)
        }
        TxMode::Analog => {
            let stream_id = st.call.call.stream_id.max(1);
            let control = if config.grant_demand { 0x80 } else { 0 };
            vec![st.analog_asm.push_frame(pcm, stream_id, control)]
        }
    };

    let lc = LinkControl {
        src_id,
        dst_id,
        emergency: false,
    };
    let lsd = LowSpeedData::default();
    for frame in frames {
        if let Err(e) = dispatch_outbound(peer, frame, &lc, &lsd) {
            tracing::error!(error = %e, "peer network write failed");
        }
    }
}

fn dispatch_outbound(
    peer: &dyn PeerNetwork,
    frame: OutboundFrame,
    lc: &LinkControl,
    lsd: &LowSpeedData,
) -> anyhow::Result<()> {
    match frame {
        OutboundFrame::DmrVoiceLcHeader { src_id, dst_id, control } => {
            peer.write_dmr_voice_lc_header(src_id, dst_id, control)
        }
        OutboundFrame::DmrVoiceFrame { payload, sync } => peer.write_dmr_voice(&payload, sync),
        OutboundFrame::DmrTerminatorWithLc { src_id, dst_id } => {
            peer.write_dmr_terminator(src_id, dst_id)
        }
        OutboundFrame::P25Ldu1 { ldu, hdu_valid } => peer.write_p25_ldu1(lc, lsd, &*ldu, hdu_valid),
        OutboundFrame::P25Ldu2 { ldu } => peer.write_p25_ldu2(lc, lsd, &*ldu),
        OutboundFrame::P25Tdu { control } => peer.write_p25_tdu(lc, lsd, control),
        frame @ (OutboundFrame::AnalogVoiceStart { .. }
        | OutboundFrame::AnalogVoice { .. }
        | OutboundFrame::AnalogTerminator) => peer.write_analog(&frame),
    }
}

/// Resets per-call assembler/crypto state and keys/unkeys the PTT line on a
/// call start/end/collision transition (spec §4.5 side effects).
fn handle_call_event(
    st: &mut BridgeState,
    config: &Config,
    ev: CallEvent,
    peer: &dyn PeerNetwork,
    audio: &AudioMutex,
) {
    match ev {
        CallEvent::Started { direction, src_id, dst_id } => {
            tracing::info!(?direction, src_id, dst_id, "call started");
            st.dmr_asm.reset();
            st.p25_asm.reset();
            st.p25_asm.note_call_start();
            st.analog_asm.reset();
            st.crypto.clear_mi();
            st.crypto.reset_keystream();
            st.ignore_call = false;
            let _ = st.ptt.key(true);

            if direction == CallDirection::Network {
                if config.preamble_leader_tone {
                    preamble::emit_preamble(&mut audio.lock().output, config.preamble_tone, config.preamble_length);
                }
            } else if config.grant_demand && config.tx_mode == TxMode::P25 {
                let encrypted = st.crypto.tek_algo() != crate::crypto::p25::TekAlgo::Unencrypt;
                let frame = st.p25_asm.terminate(true, encrypted);
                let lc = LinkControl { src_id, dst_id, emergency: false };
                if let Err(e) = dispatch_outbound(peer, frame, &lc, &LowSpeedData::default()) {
                    tracing::error!(error = %e, "grant-demand TDU write failed");
                }
            }
        }
        CallEvent::Ended { src_id, dst_id, duration } => {
            tracing::info!(src_id, dst_id, duration_ms = duration.as_millis() as u64, "call ended");
            let _ = st.ptt.key(false);
            let frames: Vec<OutboundFrame> = match config.tx_mode {
                TxMode::Dmr => st.dmr_asm.silence_hang_and_terminate(src_id, dst_id),
                TxMode::P25 => {
                    let encrypted = st.crypto.tek_algo() != crate::crypto::p25::TekAlgo::Unencrypt;
                    vec![st.p25_asm.terminate(config.grant_demand, encrypted)]
                }
                TxMode::Analog => vec![st.analog_asm.terminate()],
            };
            let lc = LinkControl { src_id, dst_id, emergency: false };
            for frame in frames {
                if let Err(e) = dispatch_outbound(peer, frame, &lc, &LowSpeedData::default()) {
                    tracing::error!(error = %e, "terminator write failed");
                }
            }
            st.src_id_override = 0;
            st.udp_src_id = 0;
            st.ignore_call = false;
            st.jitter.reset();
        }
        CallEvent::Collision { dropped_stream_id } => {
            tracing::warn!(dropped_stream_id, "call collision");
        }
        CallEvent::UdpHangSilence { .. } => {
            tracing::trace!("udp hang silence tick");
            encode_and_forward(st, config, &crate::types::SILENT_FRAME, peer);
        }
    }
}

/// Local microphone capture path: pulls 20 ms PCM frames out of the input
/// ring, drives VOX, and forwards to the peer network while a local call is
/// active (spec §4.1, §4.5 `voxAbove`/`voxBelow`).
async fn audio_worker(
    config: Arc<Config>,
    audio: Arc<AudioMutex>,
    state: Arc<NetworkMutex>,
    peer: Arc<dyn PeerNetwork>,
    shutdown: ShutdownToken,
) {
    let mut ticker = tokio::time::interval(Duration::from_millis(20));
    let vox_threshold = config.vox_sample_level / 1000.0;

    while !shutdown.load(Ordering::Relaxed) {
        ticker.tick().await;

        let mut frame: PcmFrame = [0i16; PCM_FRAME_SAMPLES];
        audio.lock().input.get(&mut frame);
        apply_gain(&mut frame, config.tx_audio_gain);

        let above = vox_level(&frame) > vox_threshold;
        let now = Instant::now();
        let mut st = state.lock();

        let event = if above {
            st.call.vox_above(now)
        } else {
            st.call.vox_below(now);
            None
        };
        if let Some(ev) = event {
            handle_call_event(&mut st, &config, ev, peer.as_ref(), audio.as_ref());
        }

        if config.detect_analog_mdc1200 {
            if let Some(pkt) = st.mdc.feed(&frame) {
                tracing::debug!(unit_id = pkt.unit_id, "mdc packet detected on local audio");
                st.src_id_override = pkt.unit_id;
            }
        }

        if st.call.phase == Phase::LocalActive {
            encode_and_forward(&mut st, &config, &frame, peer.as_ref());
        }

        if config.dump_sample_level {
            tracing::trace!(level = vox_level(&frame), "sample level");
        }
    }
}

fn frame_from_pcm_bytes(bytes: &[u8], is_ulaw: bool) -> PcmFrame {
    let mut frame = [0i16; PCM_FRAME_SAMPLES];
    if is_ulaw {
        let mut ulaw = [0u8; PCM_FRAME_SAMPLES];
        let n = bytes.len().min(PCM_FRAME_SAMPLES);
        ulaw[..n].copy_from_slice(&bytes[..n]);
        frame = ulaw_decode_frame(&ulaw);
    } else {
        for (i, chunk) in bytes.chunks(2).enumerate() {
            if i >= PCM_FRAME_SAMPLES {
                break;
            }
            frame[i] = match chunk {
                [lo, hi] => i16::from_le_bytes([*lo, *hi]),
                [lo] => *lo as i16,
                _ => 0,
            };
        }
    }
    frame
}

fn now_millis(epoch: Instant) -> u64 {
    epoch.elapsed().as_millis() as u64
}

/// External audio-over-UDP path (spec §4.4, §9 "Conditional external
/// vocoder"): receives raw/USRP/RTP framed PCM from a UDP peer in place of
/// a local sound card, schedules it through the jitter buffer, and
/// forwards decoded audio on to the call/network path exactly like the
/// local microphone does.
async fn udp_audio_worker(
    config: Arc<Config>,
    audio: Arc<AudioMutex>,
    state: Arc<NetworkMutex>,
    peer: Arc<dyn PeerNetwork>,
    shutdown: ShutdownToken,
) {
    let bind_addr = format!("{}:{}", config.udp_receive_address, config.udp_receive_port);
    let socket = match UdpSocket::bind(&bind_addr).await {
        Ok(s) => s,
        Err(e) => {
            tracing::error!(error = %e, bind_addr, "udp audio worker failed to bind");
            return;
        }
    };
    let epoch = Instant::now();
    let mut buf = [0u8; 2048];
    let mut drain_ticker = tokio::time::interval(Duration::from_millis(5));

    loop {
        if shutdown.load(Ordering::Relaxed) {
            return;
        }
        tokio::select! {
            recv = socket.recv(&mut buf) => {
                let n = match recv {
                    Ok(n) => n,
                    Err(e) => {
                        tracing::error!(error = %e, "udp audio recv error");
                        continue;
                    }
                };
                let Some(parsed) = ingress::parse_frame(&buf[..n], &config) else { continue };
                if !parsed.has_audio {
                    continue;
                }
                let mut st = state.lock();
                let new_src_id = if config.override_src_id_from_udp {
                    parsed.src_id_override.unwrap_or(config.src_id)
                } else {
                    config.src_id
                };
                // Reset-on-source-change (spec §4.5): a new UDP-metadata
                // srcId force-ends the active call before the new frame is
                // scheduled.
                if config.udp_metadata
                    && config.override_src_id_from_udp
                    && config.reset_call_for_source_id_change
                    && st.udp_src_id != 0
                    && new_src_id != st.udp_src_id
                {
                    if let Some(ev) = st.call.force_end(Instant::now()) {
                        handle_call_event(&mut st, &config, ev, peer.as_ref(), audio.as_ref());
                    }
                }
                if config.override_src_id_from_udp {
                    st.udp_src_id = new_src_id;
                }
                let now = now_millis(epoch);
                let playout_at = st.jitter.compute_playout_at(now, config.udp_inter_frame_delay);
                st.schedule.push(PendingUdpFrame {
                    pcm: parsed.pcm,
                    src_id: new_src_id,
                    dst_id: config.dst_id,
                    playout_at,
                });
            }
            _ = drain_ticker.tick() => {
                let mut st = state.lock();
                let now = now_millis(epoch);
                let Some(pending) = st.schedule.pop_ready(now) else { continue };
                let stream_id = pending.src_id.max(1);
                let event = st.call.udp_frame_arrived(Instant::now(), stream_id, pending.src_id, pending.dst_id);
                if let Some(ev) = event {
                    handle_call_event(&mut st, &config, ev, peer.as_ref(), audio.as_ref());
                }
                let frame = frame_from_pcm_bytes(&pending.pcm, config.udp_use_ulaw);
                if matches!(st.call.phase, Phase::UdpActive) {
                    encode_and_forward(&mut st, &config, &frame, peer.as_ref());
                    let mut playback = frame;
                    apply_gain(&mut playback, config.rx_audio_gain);
                    audio.lock().output.add_data(&playback);
                }
            }
        }
    }
}

fn decode_dmr_payload(state: &mut BridgeState, payload: &[u8; 33]) -> Vec<PcmFrame> {
    let ambe = dmr::unpack_payload(payload);
    let mut out = Vec::with_capacity(3);
    for chunk in ambe.chunks(crate::types::AMBE_CODEWORD_LEN) {
        if chunk.len() < crate::types::AMBE_CODEWORD_LEN {
            break;
        }
        let cw = crate::types::Codeword(chunk.to_vec());
        out.push(state.rx_vocoder.decode(&cw));
    }
    out
}

/// Decodes one LDU's IMBE codewords back to PCM. `index_base` is the
/// codeword's position within the LDU1+LDU2 superframe pair (0 for LDU1, 9
/// for LDU2), matching the keystream slice indexing in
/// [`crate::proto::p25::P25Assembler::push_codeword`].
fn decode_p25_ldu(state: &mut BridgeState, offsets: &[usize], ldu: &[u8], index_base: usize) -> Vec<PcmFrame> {
    let mut out = Vec::with_capacity(offsets.len());
    for (i, &off) in offsets.iter().enumerate() {
        if off + crate::types::IMBE_CODEWORD_LEN > ldu.len() {
            continue;
        }
        let mut imbe = [0u8; crate::types::IMBE_CODEWORD_LEN];
        imbe.copy_from_slice(&ldu[off..off + crate::types::IMBE_CODEWORD_LEN]);
        let encrypted = state.crypto.tek_algo() != crate::crypto::p25::TekAlgo::Unencrypt;
        if encrypted {
            state.crypto.crypt_imbe(&mut imbe, index_base + i);
        }
        let cw = crate::types::Codeword(imbe.to_vec());
        out.push(state.rx_vocoder.decode(&cw));
    }
    out
}

/// Compares inbound HDU/LDU2 TEK parameters against the configured TEK
/// (spec §4.3 "Call-start inbound"). On mismatch, sets `ignore_call` and
/// logs; otherwise chains the MI into the crypto engine.
fn apply_inbound_crypto_params(st: &mut BridgeState, algo: u8, key_id: u16, mi: [u8; 9]) {
    if st.crypto.tek_algo() == crate::crypto::p25::TekAlgo::Unencrypt {
        return;
    }
    if algo != st.crypto.tek_algo().algo_id() || key_id != st.crypto.tek_key_id() {
        st.ignore_call = true;
        tracing::warn!(algo, key_id, "{}", crate::error::BridgeError::CryptoMismatch);
        return;
    }
    st.ignore_call = false;
    st.crypto.set_mi(mi);
    st.crypto.generate_keystream();
}

/// Inbound FNE peer-network traffic: polls `read_dmr`/`read_p25`/
/// `read_analog`, validates frames (spec §4.6), decodes voice back to PCM,
/// and drives the network side of the call state machine.
async fn net_process_worker(
    config: Arc<Config>,
    audio: Arc<AudioMutex>,
    state: Arc<NetworkMutex>,
    peer: Arc<dyn PeerNetwork>,
    shutdown: ShutdownToken,
) {
    let mut poll = tokio::time::interval(Duration::from_millis(10));
    while !shutdown.load(Ordering::Relaxed) {
        poll.tick().await;

        match config.tx_mode {
            TxMode::Dmr => {
                if let Some(buf) = peer.read_dmr() {
                    if let Ok(hdr) = adapter::accept_dmr(&buf, config.dst_id, config.slot) {
                        let mut st = state.lock();
                        let stream_id = hdr.src_id.max(1);
                        let ev = st.call.network_call_started(Instant::now(), stream_id, hdr.src_id, hdr.dst_id);
                        if let Some(ev) = ev {
                            handle_call_event(&mut st, &config, ev, peer.as_ref(), audio.as_ref());
                        }
                        if matches!(st.call.phase, crate::call::state::Phase::NetActive) {
                            for pcm in decode_dmr_payload(&mut st, &hdr.payload) {
                                let mut playback = pcm;
                                apply_gain(&mut playback, config.rx_audio_gain);
                                audio.lock().output.add_data(&playback);
                            }
                        }
                    }
                }
            }
            TxMode::P25 => {
                if let Some(buf) = peer.read_p25() {
                    if let Ok(hdr) = adapter::accept_p25(&buf) {
                        let mut st = state.lock();
                        let stream_id = hdr.src_id.max(1);
                        let ev = st.call.network_call_started(Instant::now(), stream_id, hdr.src_id, hdr.dst_id);
                        if let Some(ev) = ev {
                            handle_call_event(&mut st, &config, ev, peer.as_ref(), audio.as_ref());
                        }

                        match hdr.duid {
                            p25::DUID_HDU => {
                                if let Some(info) = p25::parse_hdu(&hdr.frame) {
                                    apply_inbound_crypto_params(&mut st, info.algo, info.key_id, info.mi);
                                }
                            }
                            p25::DUID_LDU1 => {
                                if !st.ignore_call && matches!(st.call.phase, crate::call::state::Phase::NetActive) {
                                    for pcm in decode_p25_ldu(&mut st, &p25::LDU1_VOICE_OFFSETS, &hdr.frame, 0) {
                                        let mut playback = pcm;
                                        apply_gain(&mut playback, config.rx_audio_gain);
                                        audio.lock().output.add_data(&playback);
                                    }
                                }
                            }
                            p25::DUID_LDU2 => {
                                if !st.ignore_call && matches!(st.call.phase, crate::call::state::Phase::NetActive) {
                                    for pcm in decode_p25_ldu(
                                        &mut st,
                                        &p25::LDU2_VOICE_OFFSETS,
                                        &hdr.frame,
                                        p25::IMBE_SLOTS_PER_LDU,
                                    ) {
                                        let mut playback = pcm;
                                        apply_gain(&mut playback, config.rx_audio_gain);
                                        audio.lock().output.add_data(&playback);
                                    }
                                }
                                if let Some(info) = p25::parse_ldu2_crypto(&hdr.frame) {
                                    apply_inbound_crypto_params(&mut st, info.algo, info.key_id, info.mi);
                                }
                            }
                            p25::DUID_TDU => {
                                st.ignore_call = false;
                                if let Some(ev) = st.call.network_call_ended(Instant::now()) {
                                    handle_call_event(&mut st, &config, ev, peer.as_ref(), audio.as_ref());
                                }
                            }
                            _ => {}
                        }
                    }
                }
            }
            TxMode::Analog => {
                if let Some(buf) = peer.read_analog() {
                    let mut st = state.lock();
                    let stream_id = config.src_id.max(1);
                    let ev = st.call.network_call_started(Instant::now(), stream_id, config.src_id, config.dst_id);
                    if let Some(ev) = ev {
                        handle_call_event(&mut st, &config, ev, peer.as_ref(), audio.as_ref());
                    }
                    if matches!(st.call.phase, crate::call::state::Phase::NetActive) {
                        let frame = frame_from_pcm_bytes(&buf, true);
                        let mut playback = frame;
                        apply_gain(&mut playback, config.rx_audio_gain);
                        audio.lock().output.add_data(&playback);
                    }
                }
            }
        }
    }
}

/// Periodic tick driving hang/drop-timer expiry and In-Call-Control forced
/// ends (spec §4.5, §4.9).
async fn call_watchdog(
    config: Arc<Config>,
    audio: Arc<AudioMutex>,
    state: Arc<NetworkMutex>,
    peer: Arc<dyn PeerNetwork>,
    shutdown: ShutdownToken,
) {
    let mut ticker = tokio::time::interval(Duration::from_millis(10));
    while !shutdown.load(Ordering::Relaxed) {
        ticker.tick().await;
        let now = Instant::now();
        let mut st = state.lock();
        if let Some(ev) = st.call.tick(now) {
            handle_call_event(&mut st, &config, ev, peer.as_ref(), audio.as_ref());
        }
    }
}

/// Applies an In-Call Control command received out-of-band from the peer
/// network (spec §4.9): only `RejectTraffic` for the configured `dstId`
/// forces the active call to end.
pub fn apply_icc_command(
    st: &mut BridgeState,
    config: &Config,
    cmd: IccCommand,
    peer: &dyn PeerNetwork,
    audio: &AudioMutex,
) {
    if should_force_end(&cmd, config.dst_id) {
        if let Some(ev) = st.call.force_end(Instant::now()) {
            handle_call_event(st, config, ev, peer, audio);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::net::peer::IccCallback;
    use std::sync::Arc as StdArc;

    /// A `PeerNetwork` that records nothing and fails nothing -- enough to
    /// exercise `apply_icc_command` without a real socket.
    struct NoopPeer;

    impl PeerNetwork for NoopPeer {
        fn write_dmr_voice_lc_header(&self, _: u32, _: u32, _: u8) -> anyhow::Result<()> { Ok(()) }
        fn write_dmr_voice(&self, _: &[u8; 33], _: bool) -> anyhow::Result<()> { Ok(()) }
        fn write_dmr_terminator(&self, _: u32, _: u32) -> anyhow::Result<()> { Ok(()) }
        fn write_p25_ldu1(&self, _: &LinkControl, _: &LowSpeedData, _: &[u8; 225], _: bool) -> anyhow::Result<()> { Ok(()) }
        fn write_p25_ldu2(&self, _: &LinkControl, _: &LowSpeedData, _: &[u8; 225]) -> anyhow::Result<()> { Ok(()) }
        fn write_p25_tdu(&self, _: &LinkControl, _: &LowSpeedData, _: u8) -> anyhow::Result<()> { Ok(()) }
        fn write_analog(&self, _: &OutboundFrame) -> anyhow::Result<()> { Ok(()) }
        fn write_key_req(&self, _: u16, _: u8) -> anyhow::Result<()> { Ok(()) }
        fn reset_dmr(&self, _: u8) {}
        fn reset_p25(&self) {}
        fn reset_analog(&self) {}
        fn get_dmr_stream_id(&self) -> u32 { 0 }
        fn get_p25_stream_id(&self) -> u32 { 0 }
        fn get_analog_stream_id(&self) -> u32 { 0 }
        fn read_dmr(&self) -> Option<Vec<u8>> { None }
        fn read_p25(&self) -> Option<Vec<u8>> { None }
        fn read_analog(&self) -> Option<Vec<u8>> { None }
        fn set_key_response_callback(&self, _: StdArc<dyn Fn(u16, Vec<u8>) + Send + Sync>) {}
        fn set_dmr_icc_callback(&self, _: IccCallback) {}
        fn set_p25_icc_callback(&self, _: IccCallback) {}
        fn set_analog_icc_callback(&self, _: IccCallback) {}
    }

    fn test_config() -> Config {
        Config::load_str(
            r#"
txMode: p25
identity: t
srcId: 1
dstId: 42
"#,
        )
        .unwrap()
    }

    fn test_audio() -> AudioMutex {
        AudioMutex::new(crate::audio::AudioRings::new(4))
    }

    #[test]
    fn icc_reject_traffic_for_configured_dst_force_ends_active_call() {
        let config = test_config();
        let mut st = BridgeState::new(&config).unwrap();
        st.call.udp_frame_arrived(Instant::now(), 9, 1, 42);
        assert!(st.call.is_active());

        let peer = NoopPeer;
        let audio = test_audio();
        apply_icc_command(&mut st, &config, IccCommand::RejectTraffic { dst_id: 42 }, &peer, &audio);
        assert!(!st.call.is_active());
    }

    #[test]
    fn icc_reject_traffic_for_other_dst_leaves_call_running() {
        let config = test_config();
        let mut st = BridgeState::new(&config).unwrap();
        st.call.udp_frame_arrived(Instant::now(), 9, 1, 42);

        let peer = NoopPeer;
        let audio = test_audio();
        apply_icc_command(&mut st, &config, IccCommand::RejectTraffic { dst_id: 7 }, &peer, &audio);
        assert!(st.call.is_active());
    }

    #[test]
    fn vox_level_is_zero_for_silence() {
        let frame = [0i16; PCM_FRAME_SAMPLES];
        assert_eq!(vox_level(&frame), 0.0);
    }

    #[test]
    fn vox_level_is_nonzero_for_tone() {
        let mut frame = [0i16; PCM_FRAME_SAMPLES];
        frame[0] = 16000;
        assert!(vox_level(&frame) > 0.0);
    }

    #[test]
    fn frame_from_pcm_bytes_raw_round_trips_samples() {
        let bytes = 1000i16.to_le_bytes();
        let mut buf = Vec::new();
        for _ in 0..PCM_FRAME_SAMPLES {
            buf.extend_from_slice(&bytes);
        }
        let frame = frame_from_pcm_bytes(&buf, false);
        assert_eq!(frame[0], 1000);
    }
}
