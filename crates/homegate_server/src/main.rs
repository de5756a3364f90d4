//! `homegated`: serves the device API over HTTP and WebSocket.

use anyhow::Context;
use clap::Parser;
use homegate_protocol::{Device, DeviceKind, DeviceState};
use homegate_server::{ApiServer, MemoryGateway, ServerConfig};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "homegated")]
#[command(about = "Authenticated smart-home device API", long_about = None)]
#[command(version)]
struct Cli {
    /// Address to bind, overriding HOMEGATE_BIND.
    #[arg(long)]
    bind: Option<SocketAddr>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();

    let mut config = ServerConfig::from_env().context("refusing to start")?;
    if let Some(bind) = cli.bind {
        config = config.with_bind_addr(bind);
    }

    let server = Arc::new(ApiServer::new(config, Arc::new(demo_fleet())));
    server.serve().await?;
    Ok(())
}

/// Stands in for a vendor gateway until one is wired up.
fn demo_fleet() -> MemoryGateway {
    MemoryGateway::new([
        Device::new("living-room-lamp", "Living room lamp", DeviceKind::Light).with_state(
            DeviceState::new()
                .with_on(true)
                .with_light_level(70)
                .with_temperature(2700.0),
        ),
        Device::new("desk-strip", "Desk light strip", DeviceKind::Light)
            .with_state(DeviceState::new().with_on(false).with_color(210.0, 0.8)),
        Device::new("kettle-plug", "Kettle plug", DeviceKind::Plug)
            .with_state(DeviceState::new().with_on(false)),
        Device::new("hall-sensor", "Hall motion sensor", DeviceKind::Sensor),
        Device::new("kitchen-speaker", "Kitchen speaker", DeviceKind::Speaker)
            .with_state(DeviceState::new().with_on(true)),
    ])
}
