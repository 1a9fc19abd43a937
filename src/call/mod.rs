//! Call State Machine (C5, spec §4.5) and In-Call Control Handler (C9,
//! spec §4.9).

pub mod icc;
pub mod state;
