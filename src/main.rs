use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use rover_drive_runtime::config::DriveConfig;
use rover_drive_runtime::controller::DriveController;
use rover_drive_runtime::motor::{Board, SimBoard};

#[derive(Debug, Parser)]
#[command(about = "Differential-drive runtime for the two-wheeled rover")]
struct Args {
    /// JSON config file (pins, PWM frequency, timings)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Use the in-memory board instead of GPIO
    #[arg(long)]
    simulate: bool,

    /// Indicator blink half-cycle in milliseconds
    #[arg(long)]
    blink_interval_ms: Option<u64>,

    /// Stop the robot when no drive command arrives for this long
    #[arg(long)]
    cmd_timeout_ms: Option<u64>,
}

#[tokio::main]
async fn main() {
    // Setup logging (set RUST_LOG=info or debug)
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse().unwrap()))
        .init(); // installs the subscriber globally

    let args = Args::parse();
    if let Err(e) = run(args).await {
        eprintln!("Runtime error: {}", e);
        std::process::exit(1);
    }
}

async fn run(args: Args) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let mut config = match &args.config {
        Some(path) => DriveConfig::load(path)?,
        None => DriveConfig::default(),
    };
    if let Some(ms) = args.blink_interval_ms {
        config.blink_interval_ms = ms;
    }
    if let Some(ms) = args.cmd_timeout_ms {
        config.cmd_timeout_ms = ms;
    }

    let controller = {
        let mut board = open_board(args.simulate)?;
        Arc::new(DriveController::new(board.as_mut(), &config)?)
    };

    let result =
        rover_drive_runtime::runtime::run(Arc::clone(&controller), config.cmd_timeout()).await;

    // Always leave the motors stopped, even if the runtime failed
    controller.shutdown()?;
    info!("Stopped");
    result
}

fn open_board(simulate: bool) -> Result<Box<dyn Board>, Box<dyn std::error::Error + Send + Sync>> {
    if simulate {
        info!("Using simulated board");
        return Ok(Box::new(SimBoard::new()));
    }
    open_gpio()
}

#[cfg(feature = "rpi")]
fn open_gpio() -> Result<Box<dyn Board>, Box<dyn std::error::Error + Send + Sync>> {
    Ok(Box::new(rover_drive_runtime::motor::RpiBoard::open()?))
}

#[cfg(not(feature = "rpi"))]
fn open_gpio() -> Result<Box<dyn Board>, Box<dyn std::error::Error + Send + Sync>> {
    Err("built without the `rpi` feature; run with --simulate".into())
}

