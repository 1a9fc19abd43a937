//! Analog <-> digital LMR voice bridge: joins a local sound device (or a
//! UDP-attached external vocoder box) to a DMR/P25/analog FNE peer network,
//! handling frame assembly, P25 crypto, jitter-buffered UDP audio, and
//! call-state arbitration between the three traffic sources.

pub mod audio;
pub mod bridge;
pub mod call;
pub mod config;
pub mod crypto;
pub mod error;
pub mod mdc;
pub mod net;
pub mod proto;
pub mod ptt;
pub mod types;
pub mod udp;
pub mod vocoder;
pub mod workers;
