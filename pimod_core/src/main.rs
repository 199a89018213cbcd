//! # pimod I/O Gateway
//!
//! Runs a controller context over the piControl process image: loads the
//! piCtory topology, builds the signal registry and keeps the image
//! synchronized until shutdown.
//!
//! # Usage
//!
//! ```bash
//! # Run against the real driver with the installed topology
//! pimod_core
//!
//! # Run fully simulated with an explicit topology
//! pimod_core --config demos/config.rsc --simulate
//!
//! # Only build one device, apply a replace-I/O table, log verbosely
//! pimod_core --device DIO1 --replace-table replace.toml -s -v
//! ```

#![deny(warnings)]

use std::path::PathBuf;
use std::sync::atomic::Ordering;
use std::time::Duration;

use clap::Parser;
use pimod_common::config::{DeviceFilter, RemapTable, Topology};
use pimod_core::{ContextOptions, IoContext};
use tracing::{error, info, Level};
use tracing_subscriber::EnvFilter;

/// pimod I/O gateway over the piControl process image
#[derive(Parser, Debug)]
#[command(name = "pimod_core")]
#[command(version)]
#[command(about = "Typed, named access to the piControl process image")]
#[command(long_about = None)]
struct Args {
    /// Path to the piCtory configuration file (config.rsc).
    /// Defaults to the installed system configuration.
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Run against an in-memory image instead of the driver
    #[arg(short = 's', long)]
    simulate: bool,

    /// Path to a TOML replace-I/O table applied after construction
    #[arg(long, value_name = "FILE")]
    replace_table: Option<PathBuf>,

    /// Only build the named device (can be specified multiple times)
    #[arg(short, long = "device", action = clap::ArgAction::Append)]
    devices: Vec<String>,

    /// Only build the device at this position (can be specified multiple times)
    #[arg(short, long = "position", action = clap::ArgAction::Append)]
    positions: Vec<u16>,

    /// Refresh period in milliseconds
    #[arg(long, default_value_t = 50)]
    cycle_time_ms: u64,

    /// Path of the piControl character device
    #[arg(long, default_value = pimod_common::consts::DEFAULT_DEVICE_PATH)]
    device_path: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Output logs in JSON format
    #[arg(long)]
    json: bool,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    if let Err(e) = run() {
        error!("gateway startup failed: {e}");
        std::process::exit(1);
    }
    Ok(())
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    setup_tracing(&args);

    info!("pimod gateway v{} starting...", env!("CARGO_PKG_VERSION"));

    let config_path = match &args.config {
        Some(path) => path.clone(),
        None => Topology::find_default()?,
    };
    info!("Loading topology from {}", config_path.display());
    let topology = Topology::load(&config_path)?;
    info!(
        "Topology: {} devices, {} byte image",
        topology.devices.len(),
        topology.image_len()
    );

    let remap = match &args.replace_table {
        Some(path) => Some(RemapTable::load(path)?),
        None => None,
    };

    let options = ContextOptions {
        simulate: args.simulate,
        autorefresh: false,
        cycle_time: Duration::from_millis(args.cycle_time_ms),
        device_path: args.device_path.clone(),
        device_filter: device_filter(&args),
        remap,
    };
    let mut ctx = IoContext::new(&topology, options)?;

    // Wire SIGINT/SIGTERM into the loop's running flag.
    let running = ctx.running_flag();
    ctrlc::set_handler(move || {
        info!("Received shutdown signal");
        running.store(false, Ordering::SeqCst);
    })?;

    if let Err(e) = ctx.cycle_loop(|_| Ok(()), Duration::from_millis(args.cycle_time_ms)) {
        error!("refresh loop error: {e}");
    }
    info!(
        "Ran {} cycles, {} deadline misses, max {} us",
        ctx.stats().cycles(),
        ctx.stats().deadline_misses(),
        ctx.stats().max_cycle_us()
    );

    ctx.close()?;
    info!("pimod gateway shutdown complete");
    Ok(())
}

/// Build the device filter from CLI selectors. None when unrestricted.
fn device_filter(args: &Args) -> Option<DeviceFilter> {
    if args.devices.is_empty() && args.positions.is_empty() {
        return None;
    }
    Some(DeviceFilter {
        names: (!args.devices.is_empty()).then(|| args.devices.clone()),
        positions: (!args.positions.is_empty()).then(|| args.positions.clone()),
    })
}

/// Setup tracing subscriber based on CLI arguments.
fn setup_tracing(args: &Args) {
    let level = if args.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };

    let filter = EnvFilter::from_default_env().add_directive(level.into());

    if args.json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}
