//! JitterSchedule (spec §3, §4.4): an ordered queue of pending UDP audio
//! frames keyed by a monotonically non-decreasing `playout_at`.

use std::collections::VecDeque;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingUdpFrame {
    pub pcm: Vec<u8>,
    pub src_id: u32,
    pub dst_id: u32,
    /// Scheduled playout time, milliseconds on whatever monotonic clock the
    /// caller uses.
    pub playout_at: u64,
}

#[derive(Default)]
pub struct JitterSchedule {
    queue: VecDeque<PendingUdpFrame>,
}

impl JitterSchedule {
    pub fn new() -> Self {
        JitterSchedule {
            queue: VecDeque::new(),
        }
    }

    pub fn push(&mut self, frame: PendingUdpFrame) {
        self.queue.push_back(frame);
    }

    pub fn peek(&self) -> Option<&PendingUdpFrame> {
        self.queue.front()
    }

    pub fn pop_ready(&mut self, now: u64) -> Option<PendingUdpFrame> {
        if self.queue.front().map(|f| f.playout_at <= now) == Some(true) {
            self.queue.pop_front()
        } else {
            None
        }
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}

/// Scheduler state tracked across calls to [`compute_playout_at`]
/// (spec §4.4's `lastUdpFrameTime`).
pub struct JitterScheduler {
    pub udp_jitter_ms: u64,
    pub last_udp_frame_time: u64,
}

impl JitterScheduler {
    pub fn new(udp_jitter_ms: u64) -> Self {
        JitterScheduler {
            udp_jitter_ms,
            last_udp_frame_time: 0,
        }
    }

    pub fn reset(&mut self) {
        self.last_udp_frame_time = 0;
    }

    /// Computes the next `playoutAt` per spec §4.4. `udp_inter_frame_delay`
    /// of 0 means "no pacing": schedule for `now`.
    pub fn compute_playout_at(&mut self, now: u64, udp_inter_frame_delay: u32) -> u64 {
        if udp_inter_frame_delay == 0 {
            return now;
        }
        let playout_at = if self.last_udp_frame_time == 0
            || now.saturating_sub(self.last_udp_frame_time) > self.udp_jitter_ms
        {
            now + self.udp_jitter_ms
        } else {
            self.last_udp_frame_time + 20
        };
        self.last_udp_frame_time = playout_at;
        playout_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn steady_cadence_advances_by_twenty_ms() {
        let mut sched = JitterScheduler::new(200);
        let first = sched.compute_playout_at(0, 20);
        assert_eq!(first, 200);
        let second = sched.compute_playout_at(20, 20);
        assert_eq!(second, 220);
        let third = sched.compute_playout_at(40, 20);
        assert_eq!(third, 240);
    }

    #[test]
    fn jitter_buffer_resync_after_gap_matches_spec_scenario() {
        let mut sched = JitterScheduler::new(200);
        let t0 = sched.compute_playout_at(0, 20);
        assert_eq!(t0, 200);
        // no frames until t=500
        let t1 = sched.compute_playout_at(500, 20);
        assert_eq!(t1, 700);
        let t2 = sched.compute_playout_at(520, 20);
        assert_eq!(t2, 720);
        let t3 = sched.compute_playout_at(540, 20);
        assert_eq!(t3, 740);
    }

    #[test]
    fn zero_inter_frame_delay_disables_pacing() {
        let mut sched = JitterScheduler::new(200);
        assert_eq!(sched.compute_playout_at(1000, 0), 1000);
        assert_eq!(sched.last_udp_frame_time, 0);
    }

    #[test]
    fn schedule_pops_only_when_ready() {
        let mut q = JitterSchedule::new();
        q.push(PendingUdpFrame {
            pcm: vec![],
            src_id: 1,
            dst_id: 2,
            playout_at: 100,
        });
        assert!(q.pop_ready(50).is_none());
        let popped = q.pop_ready(100).unwrap();
        assert_eq!(popped.playout_at, 100);
        assert!(q.is_empty());
    }
}
