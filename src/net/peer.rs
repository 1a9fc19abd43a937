//! The opaque FNE peer-network client (spec §1 "DELIBERATELY OUT OF
//! SCOPE", §4.6 contract surface). The bridge core only ever talks to this
//! collaborator through the [`PeerNetwork`] trait; `UdpPeerNetwork` is a
//! real (simplified) transport so the crate runs end-to-end without the
//! proprietary FNE session implementation.

use crate::call::icc::IccCommand;
use crate::proto::OutboundFrame;
use bytes::{BufMut, BytesMut};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::mpsc::{Receiver, Sender};
use std::sync::{Arc, Mutex};
use tokio::net::UdpSocket;

#[derive(Debug, Clone, Default)]
pub struct LinkControl {
    pub src_id: u32,
    pub dst_id: u32,
    pub emergency: bool,
}

#[derive(Debug, Clone, Default)]
pub struct LowSpeedData {
    pub lsd1: u8,
    pub lsd2: u8,
}

pub type IccCallback = Arc<dyn Fn(IccCommand) + Send + Sync>;

/// The collaborator contract: write*/read* per-protocol message channels
/// plus stream-id tracking and ICC callbacks (spec §4.6).
pub trait PeerNetwork: Send + Sync {
    fn write_dmr_voice_lc_header(&self, src_id: u32, dst_id: u32, control: u8) -> anyhow::Result<()>;
    fn write_dmr_voice(&self, payload: &[u8; 33], sync: bool) -> anyhow::Result<()>;
    fn write_dmr_terminator(&self, src_id: u32, dst_id: u32) -> anyhow::Result<()>;
    fn write_p25_ldu1(&self, lc: &LinkControl, lsd: &LowSpeedData, ldu: &[u8; 225], hdu_valid: bool) -> anyhow::Result<()>;
    fn write_p25_ldu2(&self, lc: &LinkControl, lsd: &LowSpeedData, ldu: &[u8; 225]) -> anyhow::Result<()>;
    fn write_p25_tdu(&self, lc: &LinkControl, lsd: &LowSpeedData, control: u8) -> anyhow::Result<()>;
    fn write_analog(&self, frame: &OutboundFrame) -> anyhow::Result<()>;
    fn write_key_req(&self, kid: u16, algo: u8) -> anyhow::Result<()>;

    fn reset_dmr(&self, slot: u8);
    fn reset_p25(&self);
    fn reset_analog(&self);

    fn get_dmr_stream_id(&self) -> u32;
    fn get_p25_stream_id(&self) -> u32;
    fn get_analog_stream_id(&self) -> u32;

    /// Non-blocking poll; `None` if nothing is queued.
    fn read_dmr(&self) -> Option<Vec<u8>>;
    fn read_p25(&self) -> Option<Vec<u8>>;
    fn read_analog(&self) -> Option<Vec<u8>>;

    fn set_key_response_callback(&self, cb: Arc<dyn Fn(u16, Vec<u8>) + Send + Sync>);
    fn set_dmr_icc_callback(&self, cb: IccCallback);
    fn set_p25_icc_callback(&self, cb: IccCallback);
    fn set_analog_icc_callback(&self, cb: IccCallback);
}

fn outbound_frame_payload(frame: &OutboundFrame) -> &[u8] {
    match frame {
        OutboundFrame::DmrVoiceFrame { payload, .. } => payload.as_slice(),
        OutboundFrame::P25Ldu1 { ldu, .. } => ldu.as_slice(),
        OutboundFrame::P25Ldu2 { ldu } => ldu.as_slice(),
        OutboundFrame::AnalogVoice { payload } | OutboundFrame::AnalogVoiceStart { payload, .. } => {
            payload.as_slice()
        }
        _ => &[],
    }
}

/// Builds the length-prefixed datagram sent on the wire: a little-endian
/// u16 byte count followed by the raw payload. The real FNE wire format is
/// specified in original_source/src/fne; since the peer client is opaque to
/// this crate, this only needs to be self-consistent for the loopback
/// transport below.
fn write_outbound_frame(frame: &OutboundFrame) -> BytesMut {
    let payload = outbound_frame_payload(frame);
    let mut out = BytesMut::with_capacity(payload.len() + 2);
    out.put_u16_le(payload.len() as u16);
    out.extend_from_slice(payload);
    out
}

struct Callbacks {
    key_response: Option<Arc<dyn Fn(u16, Vec<u8>) + Send + Sync>>,
    dmr_icc: Option<IccCallback>,
    p25_icc: Option<IccCallback>,
    analog_icc: Option<IccCallback>,
}

impl Default for Callbacks {
    fn default() -> Self {
        Callbacks {
            key_response: None,
            dmr_icc: None,
            p25_icc: None,
            analog_icc: None,
        }
    }
}

/// A simplified UDP-socket-backed peer network: outbound frames are sent to
/// `peer_addr`, inbound datagrams queue up for the three `read_*` polls.
/// This stands in for the opaque proprietary FNE session client.
pub struct UdpPeerNetwork {
    socket: Arc<UdpSocket>,
    peer_addr: SocketAddr,
    dmr_rx: Mutex<Receiver<Vec<u8>>>,
    p25_rx: Mutex<Receiver<Vec<u8>>>,
    analog_rx: Mutex<Receiver<Vec<u8>>>,
    dmr_tx: Sender<Vec<u8>>,
    p25_tx: Sender<Vec<u8>>,
    analog_tx: Sender<Vec<u8>>,
    dmr_stream_id: AtomicU32,
    p25_stream_id: AtomicU32,
    analog_stream_id: AtomicU32,
    callbacks: Mutex<Callbacks>,
}

impl UdpPeerNetwork {
    pub fn new(socket: Arc<UdpSocket>, peer_addr: SocketAddr) -> Self {
        let (dmr_tx, dmr_rx) = std::sync::mpsc::channel();
        let (p25_tx, p25_rx) = std::sync::mpsc::channel();
        let (analog_tx, analog_rx) = std::sync::mpsc::channel();
        UdpPeerNetwork {
            socket,
            peer_addr,
            dmr_rx: Mutex::new(dmr_rx),
            p25_rx: Mutex::new(p25_rx),
            analog_rx: Mutex::new(analog_rx),
            dmr_tx,
            p25_tx,
            analog_tx,
            dmr_stream_id: AtomicU32::new(1),
            p25_stream_id: AtomicU32::new(1),
            analog_stream_id: AtomicU32::new(1),
            callbacks: Mutex::new(Callbacks::default()),
        }
    }

    /// Feeds a raw datagram received off the wire into the right protocol
    /// queue (the real FNE client multiplexes all protocols over one
    /// session; here the caller demultiplexes by a leading tag byte).
    pub fn inject_inbound(&self, tag: u8, payload: Vec<u8>) {
        let _ = match tag {
            0 => self.dmr_tx.send(payload),
            1 => self.p25_tx.send(payload),
            _ => self.analog_tx.send(payload),
        };
    }

    fn send_best_effort(&self, payload: &[u8]) -> anyhow::Result<()> {
        let mut out = BytesMut::with_capacity(payload.len() + 2);
        out.put_u16_le(payload.len() as u16);
        out.extend_from_slice(payload);
        self.send_framed(out)
    }

    fn send_framed(&self, bytes: BytesMut) -> anyhow::Result<()> {
        let sock = self.socket.clone();
        let addr = self.peer_addr;
        tokio::spawn(async move {
            if let Err(e) = sock.send_to(&bytes, addr).await {
                tracing::error!(error = %e, "peer network send failed");
            }
        });
        Ok(())
    }
}

impl PeerNetwork for UdpPeerNetwork {
    fn write_dmr_voice_lc_header(&self, _src_id: u32, _dst_id: u32, _control: u8) -> anyhow::Result<()> {
        self.dmr_stream_id.fetch_add(0, Ordering::Relaxed);
        self.send_best_effort(&[])
    }

    fn write_dmr_voice(&self, payload: &[u8; 33], _sync: bool) -> anyhow::Result<()> {
        self.send_best_effort(payload.as_slice())
    }

    fn write_dmr_terminator(&self, _src_id: u32, _dst_id: u32) -> anyhow::Result<()> {
        self.dmr_stream_id.fetch_add(1, Ordering::Relaxed);
        self.send_best_effort(&[])
    }

    fn write_p25_ldu1(&self, _lc: &LinkControl, _lsd: &LowSpeedData, ldu: &[u8; 225], _hdu_valid: bool) -> anyhow::Result<()> {
        self.send_best_effort(ldu.as_slice())
    }

    fn write_p25_ldu2(&self, _lc: &LinkControl, _lsd: &LowSpeedData, ldu: &[u8; 225]) -> anyhow::Result<()> {
        self.send_best_effort(ldu.as_slice())
    }

    fn write_p25_tdu(&self, _lc: &LinkControl, _lsd: &LowSpeedData, _control: u8) -> anyhow::Result<()> {
        self.p25_stream_id.fetch_add(1, Ordering::Relaxed);
        self.send_best_effort(&[])
    }

    fn write_analog(&self, frame: &OutboundFrame) -> anyhow::Result<()> {
        if matches!(frame, OutboundFrame::AnalogTerminator) {
            self.analog_stream_id.fetch_add(1, Ordering::Relaxed);
        }
        self.send_framed(write_outbound_frame(frame))
    }

    fn write_key_req(&self, _kid: u16, _algo: u8) -> anyhow::Result<()> {
        self.send_best_effort(&[])
    }

    fn reset_dmr(&self, _slot: u8) {
        self.dmr_stream_id.store(1, Ordering::Relaxed);
    }

    fn reset_p25(&self) {
        self.p25_stream_id.store(1, Ordering::Relaxed);
    }

    fn reset_analog(&self) {
        self.analog_stream_id.store(1, Ordering::Relaxed);
    }

    fn get_dmr_stream_id(&self) -> u32 {
        self.dmr_stream_id.load(Ordering::Relaxed)
    }

    fn get_p25_stream_id(&self) -> u32 {
        self.p25_stream_id.load(Ordering::Relaxed)
    }

    fn get_analog_stream_id(&self) -> u32 {
        self.analog_stream_id.load(Ordering::Relaxed)
    }

    fn read_dmr(&self) -> Option<Vec<u8>> {
        self.dmr_rx.lock().unwrap().try_recv().ok()
    }

    fn read_p25(&self) -> Option<Vec<u8>> {
        self.p25_rx.lock().unwrap().try_recv().ok()
    }

    fn read_analog(&self) -> Option<Vec<u8>> {
        self.analog_rx.lock().unwrap().try_recv().ok()
    }

    fn set_key_response_callback(&self, cb: Arc<dyn Fn(u16, Vec<u8>) + Send + Sync>) {
        self.callbacks.lock().unwrap().key_response = Some(cb);
    }

    fn set_dmr_icc_callback(&self, cb: IccCallback) {
        self.callbacks.lock().unwrap().dmr_icc = Some(cb);
    }

    fn set_p25_icc_callback(&self, cb: IccCallback) {
        self.callbacks.lock().unwrap().p25_icc = Some(cb);
    }

    fn set_analog_icc_callback(&self, cb: IccCallback) {
        self.callbacks.lock().unwrap().analog_icc = Some(cb);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn inject_inbound_routes_by_tag() {
        let socket = Arc::new(UdpSocket::bind("127.0.0.1:0").await.unwrap());
        let addr: SocketAddr = "127.0.0.1:9".parse().unwrap();
        let peer = UdpPeerNetwork::new(socket, addr);
        peer.inject_inbound(0, vec![1, 2, 3]);
        assert_eq!(peer.read_dmr(), Some(vec![1, 2, 3]));
        assert_eq!(peer.read_p25(), None);
    }

    #[tokio::test]
    async fn terminator_increments_stream_id() {
        let socket = Arc::new(UdpSocket::bind("127.0.0.1:0").await.unwrap());
        let addr: SocketAddr = "127.0.0.1:9".parse().unwrap();
        let peer = UdpPeerNetwork::new(socket, addr);
        let before = peer.get_dmr_stream_id();
        peer.write_dmr_terminator(1, 2).unwrap();
        assert_eq!(peer.get_dmr_stream_id(), before + 1);
    }
}
