//! line-pilot: autonomous line-follower drive server.

use std::path::PathBuf;
use std::process;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use log::info;
use tokio::sync::Mutex;

use line_pilot::actuator::Actuator;
use line_pilot::camera::{self, CameraSettings, Resolution};
use line_pilot::config::Config;
use line_pilot::session::SessionConfig;
use line_pilot::stream::server;

/// line-pilot: line-follower drive server
#[derive(Parser)]
#[command(name = "line-pilot")]
#[command(version, about = "Autonomous line-follower drive server")]
#[command(long_about = "Follows a dark floor line with a webcam, drives the motor \
    controller over a serial link, and streams annotated frames to one connected \
    viewer at a time.")]
#[command(after_help = "EXAMPLES:
    # Run with the default configuration
    line-pilot

    # Pick the camera and serial device explicitly
    line-pilot --camera 1 --serial-port /dev/ttyACM0

    # List available cameras
    line-pilot list-cameras")]
struct Cli {
    /// Path to the configuration file
    #[arg(long, short = 'c')]
    config: Option<PathBuf>,

    /// Camera device index (overrides the config file)
    #[arg(long)]
    camera: Option<u32>,

    /// Serial device the motor controller listens on (overrides the config file)
    #[arg(long)]
    serial_port: Option<String>,

    /// Address the viewer stream server binds to (overrides the config file)
    #[arg(long)]
    listen: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// List available camera devices
    ListCameras,
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();

    let result = match cli.command {
        Some(Commands::ListCameras) => list_cameras(),
        None => run(cli),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

fn list_cameras() -> Result<(), Box<dyn std::error::Error>> {
    let devices = camera::list_devices()?;
    if devices.is_empty() {
        println!("No cameras found");
    } else {
        for device in devices {
            println!("{}", device);
        }
    }
    Ok(())
}

fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = Config::load(cli.config.as_deref())?;
    if let Some(device) = cli.camera {
        config.camera.device = device;
    }
    if let Some(port) = cli.serial_port {
        config.serial.port = port;
    }
    if let Some(listen) = cli.listen {
        config.stream.listen = listen;
    }

    // Fatal if the port cannot be opened: the process must not run with a
    // dead actuator link.
    let actuator = Actuator::open(&config.serial.port, config.serial.baud)?;
    let actuator = Arc::new(Mutex::new(actuator));

    let shutdown = Arc::new(AtomicBool::new(false));
    {
        let shutdown = Arc::clone(&shutdown);
        ctrlc::set_handler(move || {
            shutdown.store(true, Ordering::SeqCst);
            eprintln!("\nReceived Ctrl+C, shutting down...");
        })?;
    }

    let camera_settings = CameraSettings {
        device_index: config.camera.device,
        resolution: Resolution {
            width: config.camera.width,
            height: config.camera.height,
        },
        fps: config.camera.fps,
    };
    let session_config = SessionConfig {
        tick_interval: Duration::from_millis(config.stream.tick_ms),
        jpeg_quality: config.stream.jpeg_quality,
    };

    info!("starting line-pilot");
    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(server::run(
        &config.stream.listen,
        actuator,
        camera_settings,
        session_config,
        shutdown,
    ))?;

    Ok(())
}
