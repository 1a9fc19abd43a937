use anyhow::{Context, Result};
use clap::Parser;
use lmr_voice_bridge::audio::device::CpalSoundDevice;
use lmr_voice_bridge::bridge::Bridge;
use lmr_voice_bridge::config::Config;
use lmr_voice_bridge::net::peer::UdpPeerNetwork;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::UdpSocket;
use tracing::{error, info};
use tracing_appender::rolling;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Debug, Parser)]
#[command(name = "lmr-bridge", about = "Analog/digital LMR voice bridge")]
struct Args {
    /// Path to the bridge's YAML configuration file.
    #[arg(short = 'c', long, default_value = "config.yml")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    let file_appender = rolling::daily("logs", "lmr-bridge.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_writer(non_blocking)
                .with_timer(fmt::time::OffsetTime::local_rfc_3339().unwrap())
                .with_ansi(false),
        )
        .with(EnvFilter::from_default_env().add_directive("info".parse()?))
        .init();

    std::panic::set_hook(Box::new(|panic_info| {
        error!("panic occurred: {}", panic_info);
    }));

    let args = Args::parse();
    let config = Config::load_file(&args.config)
        .with_context(|| format!("loading config from {}", args.config.display()))?;

    info!(identity = %config.identity, tx_mode = ?config.tx_mode, "starting bridge");

    let local_addr = format!("0.0.0.0:{}", config.peer_port);
    let socket = Arc::new(
        UdpSocket::bind(&local_addr)
            .await
            .with_context(|| format!("binding peer network socket on {local_addr}"))?,
    );
    let peer_addr: SocketAddr = format!("{}:{}", config.peer_address, config.peer_port)
        .parse()
        .with_context(|| "parsing peerAddress/peerPort")?;
    let peer: Arc<dyn lmr_voice_bridge::net::peer::PeerNetwork> =
        Arc::new(UdpPeerNetwork::new(socket, peer_addr));

    let sound_device = Box::new(CpalSoundDevice::default());
    let bridge = Bridge::new(config, peer, sound_device)?;

    tokio::select! {
        result = bridge.run() => {
            result?;
        }
        _ = tokio::signal::ctrl_c() => {
            info!("ctrl-c received, shutting down");
        }
    }

    Ok(())
}
