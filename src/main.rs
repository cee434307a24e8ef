//! Avatar Link frame publisher
//!
//! Captures from a camera, JPEG-encodes, holds each frame for an artificial
//! delay and publishes it on a PUB socket, paced to the camera frame rate.

use std::ffi::OsString;
use std::path::PathBuf;
use std::process::ExitCode;

use avatar_link::capture::{open_source, BoxedSource, SourceMode};
use avatar_link::codec::JpegEncoder;
use avatar_link::pipeline::{Publisher, ShutdownToken};
use avatar_link::transport::ZmqPublisher;
use avatar_link::{CaptureConfig, Config};
use clap::Parser;
use color_eyre::Result;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// Library and binary targets both log at info unless RUST_LOG says otherwise.
const DEFAULT_LOG_FILTER: &str = "avatar_link=info,avatar_publisher=info";

/// Exit status for usage errors and unusable sources.
const EXIT_FAILURE: u8 = 1;

#[derive(Debug, Parser)]
#[command(name = "avatar-publisher", version, about)]
struct Cli {
    /// Frame source
    mode: SourceMode,

    /// Artificial delay before a captured frame is sent, in milliseconds
    delay_ms: u64,

    /// Video device index (/dev/videoN)
    device_index: Option<u32>,

    #[arg(long)]
    width: Option<u32>,

    #[arg(long)]
    height: Option<u32>,

    #[arg(long)]
    fps: Option<u32>,

    /// JPEG quality, 1-100
    #[arg(long)]
    quality: Option<u8>,

    /// PUB endpoint to bind
    #[arg(long)]
    endpoint: Option<String>,

    /// TOML configuration file
    #[arg(long)]
    config: Option<PathBuf>,
}

impl Cli {
    fn apply(&self, config: &mut Config) {
        config.publisher.delay_ms = self.delay_ms;
        if let Some(index) = self.device_index {
            config.capture.device_index = index;
        }
        if self.width.is_some() {
            config.capture.width = self.width;
        }
        if self.height.is_some() {
            config.capture.height = self.height;
        }
        if self.fps.is_some() {
            config.capture.fps = self.fps;
        }
        if let Some(quality) = self.quality {
            config.publisher.jpeg_quality = quality;
        }
        if let Some(endpoint) = &self.endpoint {
            config.publisher.endpoint = endpoint.clone();
        }
    }
}

/// Parse arguments, or the exit status to stop with.
///
/// Usage errors exit 1 like a failed device open; --help/--version print and exit 0.
fn parse_cli<I, T>(args: I) -> Result<Cli, u8>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    match Cli::try_parse_from(args) {
        Ok(cli) => Ok(cli),
        Err(e) => {
            let _ = e.print();
            Err(if e.use_stderr() { EXIT_FAILURE } else { 0 })
        }
    }
}

fn open_or_fail(mode: SourceMode, config: &CaptureConfig) -> Result<BoxedSource, u8> {
    open_source(mode, config).map_err(|e| {
        error!("Failed to open {} source: {}", mode, e);
        EXIT_FAILURE
    })
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    // Initialize error handling and logging
    color_eyre::install()?;
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER)),
        )
        .with_timer(tracing_subscriber::fmt::time::uptime())
        .init();

    let cli = match parse_cli(std::env::args_os()) {
        Ok(cli) => cli,
        Err(code) => return Ok(ExitCode::from(code)),
    };

    let mut config = Config::load(cli.config.as_deref())?;
    cli.apply(&mut config);

    let source = match open_or_fail(cli.mode, &config.capture) {
        Ok(source) => source,
        Err(code) => return Ok(ExitCode::from(code)),
    };

    let sink = ZmqPublisher::bind(&config.publisher.endpoint, config.publisher.send_queue).await?;
    info!(
        "Streaming over {} with {} ms delay",
        sink.endpoint(),
        config.publisher.delay_ms
    );

    let shutdown = ShutdownToken::new();
    shutdown.cancel_on_ctrl_c();

    let publisher = Publisher::new(
        source,
        JpegEncoder::new(config.publisher.jpeg_quality),
        sink,
        &config.publisher,
    );

    // Capture blocks on the device, so the loop gets its own thread
    let token = shutdown.clone();
    let stats = tokio::task::spawn_blocking(move || publisher.run(&token)).await?;

    info!("Publisher finished: {:?}", stats);
    Ok(ExitCode::SUCCESS)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<Cli, u8> {
        parse_cli(std::iter::once("avatar-publisher").chain(args.iter().copied()))
    }

    #[test]
    fn legacy_mode_names_are_accepted() {
        let cli = parse(&["cv", "150"]).unwrap();
        assert_eq!(cli.mode, SourceMode::Camera);
        assert_eq!(cli.delay_ms, 150);
        assert_eq!(cli.device_index, None);

        let cli = parse(&["zed", "0", "2"]).unwrap();
        assert_eq!(cli.mode, SourceMode::Stereo);
        assert_eq!(cli.device_index, Some(2));
    }

    #[test]
    fn usage_errors_exit_one() {
        assert_eq!(parse(&["webcam", "0"]).unwrap_err(), EXIT_FAILURE);
        assert_eq!(parse(&["pattern", "soon"]).unwrap_err(), EXIT_FAILURE);
        assert_eq!(parse(&["pattern"]).unwrap_err(), EXIT_FAILURE);
        assert_eq!(parse(&["pattern", "0", "--quality"]).unwrap_err(), EXIT_FAILURE);
    }

    #[test]
    fn help_exits_zero() {
        assert_eq!(parse(&["--help"]).unwrap_err(), 0);
    }

    #[test]
    fn cli_overrides_config() {
        let cli = parse(&["pattern", "80", "3", "--width", "320", "--quality", "70"]).unwrap();
        let mut config = Config::default();
        cli.apply(&mut config);

        assert_eq!(config.publisher.delay_ms, 80);
        assert_eq!(config.capture.device_index, 3);
        assert_eq!(config.capture.width, Some(320));
        assert_eq!(config.capture.height, None);
        assert_eq!(config.publisher.jpeg_quality, 70);
    }

    #[test]
    fn unopenable_source_exits_one() {
        let mut capture = Config::default().capture;
        capture.device_index = 250;
        assert_eq!(open_or_fail(SourceMode::Camera, &capture).err(), Some(EXIT_FAILURE));
    }

    #[test]
    fn pattern_source_always_opens() {
        assert!(open_or_fail(SourceMode::Pattern, &Config::default().capture).is_ok());
    }

    #[test]
    fn default_filter_covers_this_binary() {
        let target = module_path!().split("::").next().unwrap();
        assert!(DEFAULT_LOG_FILTER
            .split(',')
            .any(|directive| directive.starts_with(&format!("{}=", target))));
        assert!(EnvFilter::try_new(DEFAULT_LOG_FILTER).is_ok());
    }
}
