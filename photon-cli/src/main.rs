//! Photon Battery Monitor CLI
//!
//! Command-line front end for the photon-monitor library:
//! - Loads settings from an optional TOML file and command-line flags
//! - Connects to the Photon board over GPIO and tracks the battery voltage
//! - Sends the shutdown handshake on SIGINT/SIGTERM
//! - Prints the latest stored reading as JSON (`--report`)

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;

mod config;

use config::AppConfig;

/// Photon Battery Monitor - Track the battery voltage of a Photon UPS board
#[derive(Parser, Debug)]
#[command(name = "photon")]
#[command(about = "Track the battery voltage reported by a Photon UPS board", long_about = None)]
#[command(version)]
struct Args {
    /// Path to configuration file (photon.toml)
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// File the readings are appended to
    #[arg(short, long, value_name = "FILE")]
    storage: Option<PathBuf>,

    /// Sampling period in seconds
    #[arg(short, long, value_name = "SECONDS")]
    period: Option<u64>,

    /// How long to wait for the Photon board at startup, in seconds
    #[arg(long, value_name = "SECONDS")]
    startup_timeout: Option<u64>,

    /// Print the latest stored reading as JSON and exit
    #[arg(long)]
    report: bool,

    /// Verbosity level (can be repeated: -v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long)]
    quiet: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    init_logging(args.verbose, args.quiet);

    log::info!("Photon Battery Monitor v{}", env!("CARGO_PKG_VERSION"));
    log::debug!("Using monitor library v{}", photon_monitor::VERSION);

    let config = match &args.config {
        Some(path) => {
            log::info!("Loading configuration from: {:?}", path);
            config::load_config(path)?
        }
        None => AppConfig::default(),
    }
    .with_overrides(args.storage.clone(), args.period, args.startup_timeout);
    config.validate().context("Invalid configuration")?;

    if args.report {
        report_mode(&config)
    } else {
        track_mode(&config)
    }
}

/// Print the most recent stored reading
fn report_mode(config: &AppConfig) -> Result<()> {
    use std::io;

    let latest = photon_monitor::read_latest(&config.monitor.storage)
        .with_context(|| format!("Failed to read measurements from {:?}", config.monitor.storage))?;
    if latest.is_none() {
        log::info!("No readings recorded yet");
    }

    photon_monitor::write_current_stats(latest.as_ref(), io::stdout().lock())?;
    Ok(())
}

/// Connect to the board and record readings until something fails
#[cfg(target_os = "linux")]
fn track_mode(config: &AppConfig) -> Result<()> {
    use photon_monitor::{JsonLinesSink, Monitor, RpiPins, SystemClock};
    use std::sync::Arc;

    let sink = JsonLinesSink::open(&config.monitor.storage)
        .with_context(|| format!("Failed to open measurement storage: {:?}", config.monitor.storage))?;
    let pins = Arc::new(RpiPins::open(config.pins).context("Failed to open GPIO lines")?);

    let monitor = Monitor::init(pins, SystemClock::new(), sink, config.monitor_options())
        .context("Unable to connect to the Photon board")?;

    monitor
        .shutdown_coordinator()
        .install(|| std::process::exit(0))
        .context("Failed to install termination handler")?;

    monitor
        .track(config.period())
        .context("Battery tracking stopped")?;
    Ok(())
}

#[cfg(not(target_os = "linux"))]
fn track_mode(_config: &AppConfig) -> Result<()> {
    anyhow::bail!("GPIO access is only supported on Linux; use --report to read stored measurements")
}

/// Initialize logging based on verbosity level
fn init_logging(verbose: u8, quiet: bool) {
    use env_logger::Builder;
    use log::LevelFilter;
    use std::io::Write;

    let level = if quiet {
        LevelFilter::Error
    } else {
        match verbose {
            0 => LevelFilter::Info,
            1 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        }
    };

    Builder::new()
        .filter_level(level)
        .format(|buf, record| {
            writeln!(
                buf,
                "[{} {}] {}",
                record.level(),
                record.target(),
                record.args()
            )
        })
        .init();
}
