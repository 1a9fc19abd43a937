//! Network Reader/Writer Adapters (C6, spec §4.6): per-protocol inbound
//! validation/routing and the opaque peer-network client contract.

pub mod adapter;
pub mod peer;
