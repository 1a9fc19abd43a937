//! RTS-line PTT control (spec supplement, grounded on
//! `original_source/src/bridge/RtsPttController.cpp`): the serial device
//! itself is an opaque collaborator -- this crate owns only the `key(bool)`
//! contract the call-state side effects drive.

pub trait PttSink: Send {
    /// Asserts (`true`) or releases (`false`) the PTT line. Errors are
    /// logged by the caller and never abort a call.
    fn key(&mut self, asserted: bool) -> anyhow::Result<()>;
}

/// No PTT line wired up -- the default when the bridge has no local
/// transmitter to key.
#[derive(Default)]
pub struct NullPttSink;

impl PttSink for NullPttSink {
    fn key(&mut self, _asserted: bool) -> anyhow::Result<()> {
        Ok(())
    }
}

/// Logs transitions instead of driving real hardware. Useful as a
/// bring-up/diagnostic stand-in for the serial RTS device.
#[derive(Default)]
pub struct TracingPttSink {
    last: Option<bool>,
}

impl PttSink for TracingPttSink {
    fn key(&mut self, asserted: bool) -> anyhow::Result<()> {
        if self.last != Some(asserted) {
            tracing::debug!(asserted, "ptt line transition");
            self.last = Some(asserted);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tracing_sink_tracks_last_state() {
        let mut sink = TracingPttSink::default();
        assert!(sink.key(true).is_ok());
        assert_eq!(sink.last, Some(true));
    }
}
