use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand, ValueEnum};
use clap_verbosity_flag::{InfoLevel, Verbosity};
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tokio::signal;
use tokio::sync::mpsc;
use tracing::{error, info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use tc66c_lib::constants::{DEFAULT_BAUD_RATE, FIRMWARE_CHUNK_SIZE};
use tc66c_lib::{DeviceMode, Reading, SerialChannel, Tc66c};

const BOOTLOADER_INSTRUCTIONS: &str = "To enter bootloader mode:
  1. Unplug the device
  2. Press and hold the K1 button
  3. While holding K1, plug in the device
  4. Release K1";

/// Command-line toolkit for TC66/TC66C USB power meters.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Serial port device path.
    #[arg(short, long, global = true, default_value = "/dev/ttyACM0")]
    port: String,
    /// Serial port baud rate.
    #[arg(short, long, global = true, default_value_t = DEFAULT_BAUD_RATE)]
    baud: u32,
    /// Optional path to a file to write logs to, in addition to the console.
    #[arg(short, long, global = true)]
    log_file: Option<PathBuf>,
    #[command(flatten)]
    verbose: Verbosity<InfoLevel>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Get a single reading from the device
    Get {
        /// Output in JSON format
        #[arg(short, long)]
        json: bool,
    },
    /// Continuously poll readings from the device (Ctrl+C to stop)
    Poll {
        /// Polling interval, e.g. "500ms" or "2s"
        #[arg(short, long, default_value = "500ms", value_parser = humantime::parse_duration)]
        interval: Duration,
        /// Output one JSON object per line
        #[arg(short, long)]
        json: bool,
    },
    /// Retrieve recordings from the device
    Recording {
        /// Output in JSON format
        #[arg(short, long)]
        json: bool,
    },
    /// Switch the device display page
    Page {
        #[arg(value_enum)]
        direction: PageDirection,
    },
    /// Rotate the device screen
    Rotate,
    /// Update device firmware (requires bootloader mode)
    Update {
        /// Firmware image
        #[arg(short, long)]
        file: PathBuf,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum PageDirection {
    Next,
    Prev,
}

fn setup_logging(log_file_path: Option<PathBuf>, verbosity: &Verbosity<InfoLevel>) -> Result<Option<WorkerGuard>> {
    // stdout carries readings, keep logs on stderr
    let console_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time();

    let (file_layer, guard) = if let Some(ref path) = log_file_path {
        let log_file = File::create(path).with_context(|| format!("Failed to create log file at: {:?}", path))?;
        let (non_blocking_writer, guard) = tracing_appender::non_blocking(log_file);
        let layer = tracing_subscriber::fmt::layer()
            .with_writer(non_blocking_writer)
            .with_ansi(false)
            .with_target(false);
        (Some(layer), Some(guard))
    } else {
        (None, None)
    };

    let filter = EnvFilter::builder()
        .with_default_directive(verbosity.tracing_level_filter().into())
        .from_env_lossy();

    tracing_subscriber::registry()
        .with(filter)
        .with(console_layer)
        .with(file_layer)
        .init();

    if let Some(path) = log_file_path {
        info!("Logging to file: {:?}", path);
    }

    Ok(guard)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let _guard = setup_logging(cli.log_file.clone(), &cli.verbose)?;

    if let Err(e) = run(cli).await {
        error!("{:#}", e);
        process::exit(1);
    }
    Ok(())
}

async fn run(cli: Cli) -> Result<()> {
    let device = connect(&cli.port, cli.baud)?;

    match cli.command {
        Command::Get { json } => execute_get(device, json),
        Command::Poll { interval, json } => execute_poll(device, interval, json).await,
        Command::Recording { json } => execute_recording(device, json),
        Command::Page { direction } => execute_page(device, direction),
        Command::Rotate => execute_rotate(device),
        Command::Update { file } => execute_update(device, &file),
    }
}

fn connect(port: &str, baud: u32) -> Result<Tc66c<SerialChannel>> {
    info!("Connecting to TC66C on {}...", port);
    let channel =
        SerialChannel::open_with_baud(port, baud).with_context(|| format!("Failed to open serial port {}", port))?;
    let device = Tc66c::new(channel).context("Failed to query device mode")?;
    info!("Connected successfully! Device mode: {}", device.mode());
    Ok(device)
}

fn print_reading(reading: &Reading, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string(reading)?);
    } else {
        println!("{}", reading.short_summary());
    }
    Ok(())
}

fn execute_get(mut device: Tc66c<SerialChannel>, json: bool) -> Result<()> {
    let reading = device.get_reading().context("Error getting reading")?;
    if json {
        println!("{}", serde_json::to_string_pretty(&reading)?);
    } else {
        println!("{}", reading);
    }
    device.close()?;
    Ok(())
}

/// Polls on a blocking task and hands readings to the async side. Stopping
/// means: no new requests, then the session (and port) is dropped.
async fn execute_poll(device: Tc66c<SerialChannel>, interval: Duration, json: bool) -> Result<()> {
    info!("Polling readings every {:?} (press Ctrl+C to stop)...", interval);

    let running = Arc::new(AtomicBool::new(true));
    let (tx, mut rx) = mpsc::channel(16);
    let poller = tokio::task::spawn_blocking({
        let running = Arc::clone(&running);
        move || poll_loop(device, interval, running, tx)
    });

    loop {
        tokio::select! {
            msg = rx.recv() => match msg {
                Some(Ok(reading)) => print_reading(&reading, json)?,
                Some(Err(e)) => warn!("Error getting reading: {}", e),
                None => break,
            },
            _ = signal::ctrl_c() => {
                info!("Ctrl+C received, shutting down gracefully.");
                break;
            }
        }
    }

    running.store(false, Ordering::Relaxed);
    drop(rx);
    poller.await.context("Poller task failed")?
}

fn poll_loop(
    mut device: Tc66c<SerialChannel>,
    interval: Duration,
    running: Arc<AtomicBool>,
    tx: mpsc::Sender<tc66c_lib::Result<Reading>>,
) -> Result<()> {
    while running.load(Ordering::Relaxed) {
        let started = Instant::now();
        if tx.blocking_send(device.get_reading()).is_err() {
            break;
        }
        if let Some(remaining) = interval.checked_sub(started.elapsed()) {
            std::thread::sleep(remaining);
        }
    }
    device.close()?;
    Ok(())
}

fn execute_recording(mut device: Tc66c<SerialChannel>, json: bool) -> Result<()> {
    info!("Retrieving recordings...");
    let recordings = device.get_recordings().context("Error getting recordings")?;
    device.close()?;

    if json {
        println!("{}", serde_json::to_string_pretty(&recordings)?);
        return Ok(());
    }

    info!("Received {} recording entries", recordings.len());
    if recordings.is_empty() {
        println!("No recordings available");
        return Ok(());
    }

    println!("{:<6} | {:<12} | {:<12}", "Index", "Voltage (V)", "Current (A)");
    println!("-------+--------------+-------------");
    for (i, entry) in recordings.iter().enumerate() {
        println!("{:<6} | {:>10.4} V | {:>10.5} A", i, entry.voltage, entry.current);
    }
    println!("\nTotal entries: {}", recordings.len());
    Ok(())
}

fn execute_page(mut device: Tc66c<SerialChannel>, direction: PageDirection) -> Result<()> {
    match direction {
        PageDirection::Next => device.next_page(),
        PageDirection::Prev => device.previous_page(),
    }
    .context("Failed to switch page")?;
    device.close()?;
    Ok(())
}

fn execute_rotate(mut device: Tc66c<SerialChannel>) -> Result<()> {
    device.rotate_screen().context("Failed to rotate screen")?;
    device.close()?;
    Ok(())
}

fn execute_update(mut device: Tc66c<SerialChannel>, firmware_file: &Path) -> Result<()> {
    if device.mode() != DeviceMode::Bootloader {
        bail!(
            "Device must be in bootloader mode to update firmware (current mode: {})\n\n{}",
            device.mode(),
            BOOTLOADER_INSTRUCTIONS
        );
    }

    info!("Reading firmware file {:?}...", firmware_file);
    let firmware = std::fs::read(firmware_file)
        .with_context(|| format!("Error reading firmware file {:?}", firmware_file))?;

    let chunk_count = firmware.len().div_ceil(FIRMWARE_CHUNK_SIZE);
    info!(
        "Firmware file size: {} bytes ({} chunks of {} bytes)",
        firmware.len(),
        chunk_count,
        FIRMWARE_CHUNK_SIZE
    );
    warn!("Do not disconnect the device during the update!");

    let result = device.update_firmware_with_progress(&firmware, |progress| {
        eprint!(
            "\r[>] Progress: {}/{} bytes ({:.0}%) - Chunk {}/{} OK",
            progress.bytes_sent,
            progress.total_bytes,
            progress.percentage(),
            progress.chunks_sent,
            progress.total_chunks
        );
        let _ = std::io::stderr().flush();
    });
    eprintln!();

    if let Err(e) = result {
        error!("Your device may not boot normally in this state.");
        error!("Try running the update again. If it still fails, use the recovery procedure for your device.");
        return Err(e).context("Firmware update failed");
    }

    info!("Firmware update completed successfully!");
    info!("You can now unplug and replug the device to boot into the new firmware.");
    device.close()?;
    Ok(())
}
