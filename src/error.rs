//! Typed error kinds for the bridge (spec §7).
//!
//! Startup failures (`ConfigError`, and the startup-only variants of
//! `AudioDeviceLost`/`NetworkUnreachable`) are fatal and bubble up through
//! `anyhow` to `main`. Everything else is logged and recovered locally by
//! the worker that observed it -- workers never unwind across their loop
//! boundary.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("config error: {0}")]
    Config(String),

    #[error("network unreachable: {0}")]
    NetworkUnreachable(String),

    #[error("audio device lost: {0}")]
    AudioDeviceLost(String),

    #[error("codec error: {0}")]
    Codec(String),

    #[error("crypto mismatch: call ignored, using different encryption parameters")]
    CryptoMismatch,

    #[error("malformed frame: {0}")]
    MalformedFrame(String),

    #[error("ring buffer overflow")]
    RingOverflow,

    #[error("call collision, dropping late stream {0}")]
    CallCollision(u32),
}
