//! Call State Machine (spec §4.5): IDLE / LOCAL_ACTIVE / UDP_ACTIVE /
//! UDP_HANG / NET_ACTIVE, collision handling, and source-ID override
//! precedence.

use crate::types::{CallDirection, CallState};
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    LocalActive,
    UdpActive,
    UdpHang,
    NetActive,
}

/// Emitted when a transition has a caller-visible side effect the rest of
/// the bridge must react to (spec §4.5 "Call-start/-end side effects").
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallEvent {
    Started {
        direction: CallDirection,
        src_id: u32,
        dst_id: u32,
    },
    Ended {
        src_id: u32,
        dst_id: u32,
        duration: Duration,
    },
    Collision {
        dropped_stream_id: u32,
    },
    /// Periodic silence emission during `UDP_HANG` (spec §4.5 `udpHangTime`,
    /// grounded on `original_source/src/bridge/HostBridge.cpp:3632-3651`'s
    /// repeated `callEndSilence` calls). Does not end the call.
    UdpHangSilence {
        src_id: u32,
        dst_id: u32,
    },
}

const COLLISION_FORCE_END_SECS: u64 = 10;

pub struct CallMachine {
    pub phase: Phase,
    pub call: CallState,
    drop_time: Duration,
    udp_drop_time: Duration,
    udp_hang_time: Duration,
    udp_silence_during_hang: bool,
    local_drop_deadline: Option<Instant>,
    udp_hang_deadline: Option<Instant>,
    udp_drop_deadline: Option<Instant>,
}

impl CallMachine {
    pub fn new(drop_time_ms: u32, udp_silence_during_hang: bool) -> Self {
        let drop_time = Duration::from_millis(drop_time_ms as u64);
        CallMachine {
            phase: Phase::Idle,
            call: CallState::idle(),
            drop_time,
            udp_drop_time: drop_time.max(Duration::from_millis(180)),
            udp_hang_time: Duration::from_millis(20),
            udp_silence_during_hang,
            local_drop_deadline: None,
            udp_hang_deadline: None,
            udp_drop_deadline: None,
        }
    }

    pub fn is_active(&self) -> bool {
        self.phase != Phase::Idle
    }

    fn start(&mut self, now: Instant, direction: CallDirection, stream_id: u32, src_id: u32, dst_id: u32) -> CallEvent {
        self.call = CallState::idle();
        self.call.active = true;
        self.call.direction = direction;
        self.call.stream_id = stream_id;
        self.call.src_id = src_id;
        self.call.dst_id = dst_id;
        self.call.start_time = now;
        self.call.last_pkt_time = now;
        self.phase = match direction {
            CallDirection::LocalMic => Phase::LocalActive,
            CallDirection::Udp => Phase::UdpActive,
            CallDirection::Network => Phase::NetActive,
        };
        CallEvent::Started {
            direction,
            src_id,
            dst_id,
        }
    }

    fn end(&mut self, now: Instant) -> CallEvent {
        let duration = now.saturating_duration_since(self.call.start_time);
        let ev = CallEvent::Ended {
            src_id: self.call.src_id,
            dst_id: self.call.dst_id,
            duration,
        };
        self.call.reset();
        self.phase = Phase::Idle;
        self.local_drop_deadline = None;
        self.udp_hang_deadline = None;
        self.udp_drop_deadline = None;
        ev
    }

    /// VOX threshold crossing above `voxSampleLevel/1000` (spec §4.5).
    pub fn vox_above(&mut self, now: Instant) -> Option<CallEvent> {
        self.local_drop_deadline = None;
        if self.phase == Phase::Idle {
            Some(self.start(now, CallDirection::LocalMic, 1, 0, 0))
        } else {
            None
        }
    }

    /// VOX drops below threshold; starts (or keeps running) the drop timer.
    pub fn vox_below(&mut self, now: Instant) {
        if self.phase == Phase::LocalActive && self.local_drop_deadline.is_none() {
            self.local_drop_deadline = Some(now + self.drop_time);
        }
    }

    /// First UDP frame popped from the jitter schedule, or a subsequent one
    /// while hanging.
    pub fn udp_frame_arrived(
        &mut self,
        now: Instant,
        stream_id: u32,
        src_id: u32,
        dst_id: u32,
    ) -> Option<CallEvent> {
        match self.phase {
            Phase::Idle => Some(self.start(now, CallDirection::Udp, stream_id, src_id, dst_id)),
            Phase::UdpHang => {
                // returning from hang: no new call-start, just resume.
                self.phase = Phase::UdpActive;
                self.udp_hang_deadline = None;
                self.udp_drop_deadline = None;
                self.call.last_pkt_time = now;
                None
            }
            Phase::UdpActive => {
                self.call.last_pkt_time = now;
                None
            }
            _ => self.check_collision(now, stream_id),
        }
    }

    /// `udpCallClock` expiry: transition from UDP_ACTIVE into hang.
    pub fn udp_call_clock_expired(&mut self, now: Instant) {
        if self.phase == Phase::UdpActive {
            self.phase = Phase::UdpHang;
            self.udp_hang_deadline = Some(now + self.udp_hang_time);
            self.udp_drop_deadline = Some(now + self.udp_drop_time);
        }
    }

    /// First network header/LDU/VOICE_START from the peer.
    pub fn network_call_started(
        &mut self,
        now: Instant,
        stream_id: u32,
        src_id: u32,
        dst_id: u32,
    ) -> Option<CallEvent> {
        match self.phase {
            Phase::Idle => Some(self.start(now, CallDirection::Network, stream_id, src_id, dst_id)),
            _ => self.check_collision(now, stream_id),
        }
    }

    /// TERMINATOR_WITH_LC / TDU / analog TERMINATOR from the network.
    pub fn network_call_ended(&mut self, now: Instant) -> Option<CallEvent> {
        if self.phase == Phase::NetActive {
            Some(self.end(now))
        } else {
            None
        }
    }

    /// Collision rule (spec §4.5): a second stream with a different
    /// `streamId` while active force-ends the current call only if more
    /// than 10s have elapsed since the last packet; otherwise the new
    /// frame is dropped.
    fn check_collision(&mut self, now: Instant, new_stream_id: u32) -> Option<CallEvent> {
        if new_stream_id == self.call.stream_id {
            self.call.last_pkt_time = now;
            return None;
        }
        let elapsed = now.saturating_duration_since(self.call.last_pkt_time);
        if elapsed > Duration::from_secs(COLLISION_FORCE_END_SECS) {
            self.end(now);
            Some(CallEvent::Collision {
                dropped_stream_id: self.call.stream_id,
            })
        } else {
            Some(CallEvent::Collision {
                dropped_stream_id: new_stream_id,
            })
        }
    }

    /// Periodic 1 ms tick (spec §4.7 call-watchdog); drives hang/drop/local
    /// drop expiry. Returns a call-end (or periodic hang-silence) event if
    /// one fired.
    pub fn tick(&mut self, now: Instant) -> Option<CallEvent> {
        if let Some(deadline) = self.local_drop_deadline {
            if now >= deadline && self.phase == Phase::LocalActive {
                return Some(self.end(now));
            }
        }
        if self.phase == Phase::UdpHang {
            if let Some(deadline) = self.udp_drop_deadline {
                if now >= deadline {
                    return Some(self.end(now));
                }
            }
            if self.udp_silence_during_hang {
                if let Some(deadline) = self.udp_hang_deadline {
                    if now >= deadline {
                        self.udp_hang_deadline = Some(now + self.udp_hang_time);
                        return Some(CallEvent::UdpHangSilence {
                            src_id: self.call.src_id,
                            dst_id: self.call.dst_id,
                        });
                    }
                }
            }
        }
        None
    }

    /// Forced end from In-Call Control REJECT_TRAFFIC (spec §4.5, §4.9).
    pub fn force_end(&mut self, now: Instant) -> Option<CallEvent> {
        if self.is_active() {
            Some(self.end(now))
        } else {
            None
        }
    }
}

/// Source-ID override precedence, highest to lowest (spec §4.5). A zero
/// resolves to the configured `srcId`.
#[allow(clippy::too_many_arguments)]
pub fn resolve_src_id(
    forced_src_id: u32,
    src_id_override: u32,
    override_from_mdc: bool,
    udp_src_id: u32,
    override_from_udp: bool,
    configured_src_id: u32,
) -> u32 {
    if forced_src_id != 0 {
        return forced_src_id;
    }
    if override_from_mdc && src_id_override != 0 {
        return src_id_override;
    }
    if override_from_udp && udp_src_id != 0 {
        return udp_src_id;
    }
    configured_src_id
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vox_above_starts_local_call_from_idle() {
        let mut m = CallMachine::new(180, false);
        let now = Instant::now();
        let ev = m.vox_above(now).unwrap();
        assert_eq!(m.phase, Phase::LocalActive);
        assert!(matches!(ev, CallEvent::Started { direction: CallDirection::LocalMic, .. }));
    }

    #[test]
    fn local_call_ends_after_drop_time_of_silence() {
        let mut m = CallMachine::new(180, false);
        let t0 = Instant::now();
        m.vox_above(t0);
        m.vox_below(t0);
        assert!(m.tick(t0 + Duration::from_millis(100)).is_none());
        let ev = m.tick(t0 + Duration::from_millis(181)).unwrap();
        assert!(matches!(ev, CallEvent::Ended { .. }));
        assert_eq!(m.phase, Phase::Idle);
    }

    #[test]
    fn udp_hang_then_resume_does_not_restart_call() {
        let mut m = CallMachine::new(180, false);
        let t0 = Instant::now();
        assert!(m.udp_frame_arrived(t0, 5, 1, 2).is_some());
        m.udp_call_clock_expired(t0 + Duration::from_millis(160));
        assert_eq!(m.phase, Phase::UdpHang);
        let ev = m.udp_frame_arrived(t0 + Duration::from_millis(200), 5, 1, 2);
        assert!(ev.is_none());
        assert_eq!(m.phase, Phase::UdpActive);
    }

    #[test]
    fn udp_hang_emits_periodic_silence_when_enabled() {
        let mut m = CallMachine::new(180, true);
        let t0 = Instant::now();
        m.udp_frame_arrived(t0, 5, 1, 2);
        m.udp_call_clock_expired(t0 + Duration::from_millis(160));
        let ev = m.tick(t0 + Duration::from_millis(200));
        assert!(matches!(ev, Some(CallEvent::UdpHangSilence { src_id: 1, dst_id: 2 })));
        assert_eq!(m.phase, Phase::UdpHang, "silence tick does not end the call");
    }

    #[test]
    fn udp_hang_drops_after_drop_time() {
        let mut m = CallMachine::new(180, false);
        let t0 = Instant::now();
        m.udp_frame_arrived(t0, 5, 1, 2);
        m.udp_call_clock_expired(t0 + Duration::from_millis(160));
        let ev = m.tick(t0 + Duration::from_millis(600));
        assert!(matches!(ev, Some(CallEvent::Ended { .. })));
        assert_eq!(m.phase, Phase::Idle);
    }

    #[test]
    fn collision_before_ten_seconds_drops_new_frame() {
        let mut m = CallMachine::new(180, false);
        let t0 = Instant::now();
        m.udp_frame_arrived(t0, 1, 10, 20);
        let ev = m.udp_frame_arrived(t0 + Duration::from_secs(5), 2, 11, 20);
        assert!(matches!(ev, Some(CallEvent::Collision { dropped_stream_id: 2 })));
        assert_eq!(m.call.stream_id, 1, "original call keeps running");
    }

    #[test]
    fn collision_after_ten_seconds_force_ends_original() {
        let mut m = CallMachine::new(180, false);
        let t0 = Instant::now();
        m.udp_frame_arrived(t0, 1, 10, 20);
        let ev = m.udp_frame_arrived(t0 + Duration::from_secs(11), 2, 11, 20);
        assert!(matches!(ev, Some(CallEvent::Collision { dropped_stream_id: 1 })));
        assert_eq!(m.phase, Phase::Idle);
    }

    #[test]
    fn src_id_override_precedence_matches_spec() {
        assert_eq!(resolve_src_id(99, 1, true, 2, true, 3), 99);
        assert_eq!(resolve_src_id(0, 1, true, 2, true, 3), 1);
        assert_eq!(resolve_src_id(0, 1, false, 2, true, 3), 2);
        assert_eq!(resolve_src_id(0, 0, true, 0, true, 3), 3);
    }

    #[test]
    fn at_most_one_active_phase_at_a_time() {
        let mut m = CallMachine::new(180, false);
        let t0 = Instant::now();
        m.vox_above(t0);
        assert_eq!(m.phase, Phase::LocalActive);
        // a network header cannot also start a call while local is active;
        // it is treated as a collision candidate instead.
        let ev = m.network_call_started(t0, 99, 1, 2);
        assert!(matches!(ev, Some(CallEvent::Collision { .. })));
    }
}
