//! In-Call Control Handler (C9, spec §4.9): reacts to FNE-issued ICC
//! messages. Only `REJECT_TRAFFIC` has an effect in the core; everything
//! else is ignored.

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IccCommand {
    RejectTraffic { dst_id: u32 },
    Other,
}

/// Returns `true` if this ICC command should force-end the current call for
/// `configured_dst_id`.
pub fn should_force_end(cmd: &IccCommand, configured_dst_id: u32) -> bool {
    matches!(cmd, IccCommand::RejectTraffic { dst_id } if *dst_id == configured_dst_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reject_traffic_for_configured_dst_forces_end() {
        let cmd = IccCommand::RejectTraffic { dst_id: 42 };
        assert!(should_force_end(&cmd, 42));
        assert!(!should_force_end(&cmd, 43));
    }

    #[test]
    fn other_commands_never_force_end() {
        assert!(!should_force_end(&IccCommand::Other, 42));
    }
}
