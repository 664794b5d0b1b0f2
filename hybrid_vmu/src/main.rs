//! # Hybrid VMU
//!
//! Creates the shared state, semaphore and both module queues, then runs
//! the vehicle tick until SIGINT/SIGTERM (SIGUSR1 pauses and resumes).
//! Start it before `hybrid_ev` and `hybrid_iec`.

use clap::Parser;
use hybrid_common::config::{LogLevel, SystemConfig};
use hybrid_common::lifecycle::{LIFECYCLE, install_signal_handlers};
use hybrid_common::logging::init_tracing;
use hybrid_common::state::SystemState;
use hybrid_shared_memory::{PosixIpc, VmuIpc};
use hybrid_vmu::{Orchestrator, VmuError};
use std::path::PathBuf;
use std::process;
use tracing::{error, info};

/// Hybrid vehicle management unit
#[derive(Parser, Debug)]
#[command(name = "hybrid_vmu")]
#[command(version)]
#[command(about = "Vehicle management unit: owns shared resources and orchestrates the EV and IEC modules")]
struct Args {
    /// Path to the shared TOML configuration. Built-in defaults when absent.
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Enable verbose logging (DEBUG level).
    #[arg(short, long)]
    verbose: bool,

    /// Output logs in JSON format.
    #[arg(long)]
    json: bool,

    /// Stop after this many ticks instead of waiting for a signal.
    #[arg(long, value_name = "N")]
    ticks: Option<u64>,
}

fn main() {
    let args = Args::parse();

    let config = match SystemConfig::load_or_default(args.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            init_tracing(LogLevel::Info, args.verbose, args.json);
            error!("FATAL: {}", VmuError::from(e));
            process::exit(1);
        }
    };
    init_tracing(config.shared.log_level, args.verbose, args.json);
    info!(
        service = %config.shared.service_name,
        "hybrid VMU v{} starting",
        env!("CARGO_PKG_VERSION")
    );

    if let Err(e) = run(&args, &config) {
        error!("FATAL: {e}");
        process::exit(e.exit_code());
    }

    info!("hybrid VMU shutdown complete");
}

fn run(args: &Args, config: &SystemConfig) -> Result<(), VmuError> {
    install_signal_handlers()?;

    let mut initial = SystemState::new();
    initial.battery_level = config.vmu.initial_battery;
    initial.fuel_level = config.vmu.initial_fuel;
    let VmuIpc { state, ev, iec } = VmuIpc::initialize(&PosixIpc, &config.ipc, initial)?;

    info!(
        tick_ms = config.vmu.tick_ms,
        ticks = ?args.ticks,
        "resources created, entering VMU loop"
    );
    let mut orchestrator = Orchestrator::new(config, state, ev, iec);
    let result = orchestrator.run(&LIFECYCLE, args.ticks);
    orchestrator.shutdown();
    result
}
