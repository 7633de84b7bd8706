use clap::Parser;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

use roomba_odometry_runtime::config::{self, RuntimeConfig};
use roomba_odometry_runtime::roomba::{PacketGroupId, PacketSizeTable, SerialLink};
use roomba_odometry_runtime::runtime::Runtime;
use roomba_odometry_runtime::shutdown;
use roomba_odometry_runtime::telemetry::{TelemetrySink, TracingSink, ZenohSink};

/// Drive a Roomba over serial: dead-reckoned odometry plus a safety stop
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// Serial port the Roomba is connected to
    #[arg(default_value = config::ROOMBA_PORT)]
    port: String,

    /// Serial baud rate
    #[arg(long, default_value_t = config::ROOMBA_BAUDRATE)]
    baud: u32,

    /// Wait for hardware handshake (RTS/CTS) on the serial line
    #[arg(long)]
    hw_handshake: bool,

    /// Pause between sensor requests, in milliseconds
    #[arg(long, default_value_t = config::POLL_INTERVAL.as_millis() as u64)]
    pause_ms: u64,

    /// Warn when no sensor data arrives for this long, in milliseconds
    #[arg(long, default_value_t = config::SILENCE_THRESHOLD.as_millis() as u64)]
    silence_ms: u64,

    /// Sensor packet group requested every cycle
    #[arg(long, default_value_t = config::STREAM_GROUP.0)]
    group: u8,

    /// Log telemetry locally instead of publishing over zenoh
    #[arg(long)]
    no_publish: bool,

    /// Enable debug logging
    #[arg(long)]
    debug: bool,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    // Setup logging (RUST_LOG still applies on top)
    let level = if args.debug { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(level.parse().unwrap()))
        .init(); // installs the subscriber globally

    if let Err(e) = run(args).await {
        eprintln!("Runtime error: {}", e);
        std::process::exit(1);
    }
}

async fn run(args: Args) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let sizes = Arc::new(PacketSizeTable::default());
    let config = RuntimeConfig {
        poll_interval: Duration::from_millis(args.pause_ms),
        silence_threshold: Duration::from_millis(args.silence_ms),
        stream_group: PacketGroupId(args.group),
        ..RuntimeConfig::default()
    };

    let telemetry: Box<dyn TelemetrySink> = if args.no_publish {
        Box::new(TracingSink::default())
    } else {
        Box::new(ZenohSink::open().await?)
    };

    let (link, frames) =
        SerialLink::open_with(&args.port, args.baud, args.hw_handshake, Arc::clone(&sizes))?;
    let mut runtime = Runtime::new(frames, link, telemetry, config, &sizes)?;

    let (shutdown_tx, shutdown_rx) = shutdown::channel();
    shutdown::spawn_keyboard_watcher(shutdown_tx.clone())?;
    shutdown::spawn_ctrl_c(shutdown_tx);

    info!("Roomba startup. Press return to exit.");
    runtime.run(shutdown_rx).await;
    Ok(())
}
