//! Device emulator binary: opens a serial port (or pty) and serves fiscal
//! commands from it until interrupted, printing receipts to stdout.

use std::process::ExitCode;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use clap::Parser;

use hasar_fiscal::device::Device;
use hasar_fiscal::eprom::Eprom;
use hasar_fiscal::logging::LogLevel;
use hasar_fiscal::renderer::StdoutSink;

#[derive(Parser)]
#[command(name = "emulate")]
#[command(about = "Emulates a Hasar-family fiscal receipt printer over a serial port")]
struct Cli {
    /// Path to the serial port or pty the host driver connects to.
    tty: String,

    /// Baud rate to open the port at.
    #[arg(long, default_value_t = 9600)]
    baud: u32,

    /// JSON file overriding the bundled EPROM configuration.
    #[arg(long)]
    config: Option<String>,

    /// Enable debug logging, equivalent to `RUST_LOG=debug`.
    #[arg(short = 'd', long)]
    debug: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let level = if cli.debug { LogLevel::Debug } else { LogLevel::Info };
    env_logger::Builder::new()
        .filter_level(log::LevelFilter::from(level))
        .parse_default_env()
        .init();

    let eprom = match &cli.config {
        Some(path) => match Eprom::load(path) {
            Ok(eprom) => eprom,
            Err(e) => {
                log::error!("failed to load EPROM config {path}: {e}");
                return ExitCode::FAILURE;
            }
        },
        None => Eprom::bundled(),
    };

    let mut device = match Device::open(&cli.tty, cli.baud, eprom) {
        Ok(device) => device,
        Err(e) => {
            log::error!("failed to open {}: {e}", cli.tty);
            return ExitCode::FAILURE;
        }
    };

    log::info!("listening on {} at {} baud", cli.tty, cli.baud);

    let interrupted = Arc::new(AtomicBool::new(false));
    let handler_flag = interrupted.clone();
    if let Err(e) = ctrlc::set_handler(move || handler_flag.store(true, Ordering::SeqCst)) {
        log::warn!("failed to install Ctrl-C handler: {e}");
    }

    let mut sink = StdoutSink;
    while !interrupted.load(Ordering::SeqCst) {
        if let Err(e) = device.serve_one(&mut sink) {
            log::error!("device loop terminated: {e}");
            return ExitCode::FAILURE;
        }
    }

    log::info!("interrupted, shutting down");
    ExitCode::SUCCESS
}
