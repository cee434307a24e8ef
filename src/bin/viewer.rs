//! Avatar Link reference viewer
//!
//! Subscribes to the camera and sensor feeds and shows the latest frame.

use std::path::PathBuf;

use avatar_link::display::Sdl2Display;
use avatar_link::pipeline::ShutdownToken;
use avatar_link::stream::{CameraStream, SensorBus};
use avatar_link::Config;
use clap::Parser;
use color_eyre::{eyre::eyre, Result};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Library and binary targets both log at info unless RUST_LOG says otherwise.
const DEFAULT_LOG_FILTER: &str = "avatar_link=info,avatar_viewer=info";

#[derive(Debug, Parser)]
#[command(name = "avatar-viewer", version, about)]
struct Cli {
    /// Camera feed endpoint
    camera: Option<String>,

    /// Sensor feed endpoint
    #[arg(long)]
    sensors: Option<String>,

    /// Flip frames vertically (for producers that deliver bottom-up images)
    #[arg(long)]
    flip: bool,

    #[arg(long, default_value_t = 1280)]
    width: u32,

    #[arg(long, default_value_t = 720)]
    height: u32,

    /// TOML configuration file
    #[arg(long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER)),
        )
        .with_timer(tracing_subscriber::fmt::time::uptime())
        .init();

    let cli = Cli::parse();
    let mut config = Config::load(cli.config.as_deref())?;
    if let Some(endpoint) = cli.camera {
        config.camera_stream.endpoint = endpoint;
    }
    if let Some(endpoint) = cli.sensors {
        config.sensors.endpoint = endpoint;
    }
    // SDL textures are top-down already
    config.camera_stream.flip_vertical = cli.flip;

    let mut camera = CameraStream::connect(&config.camera_stream)?;
    let mut sensors = SensorBus::connect(&config.sensors)?;

    let shutdown = ShutdownToken::new();
    shutdown.cancel_on_ctrl_c();

    let sdl_context = sdl2::init().map_err(|e| eyre!(e))?;
    let mut app = Sdl2Display::new(&sdl_context, cli.width, cli.height)?;
    tokio::task::block_in_place(|| app.run(&sdl_context, &mut camera, &mut sensors, &shutdown))?;

    camera.close();
    sensors.close();
    info!("Viewer shutting down");
    Ok(())
}
