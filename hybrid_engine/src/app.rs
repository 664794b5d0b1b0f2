//! Process bootstrap shared by `hybrid_ev` and `hybrid_iec`.

use crate::engine::Engine;
use crate::error::ModuleError;
use crate::runner::ModuleRunner;
use clap::Parser;
use hybrid_common::config::{LogLevel, SystemConfig};
use hybrid_common::cycle::TickBudget;
use hybrid_common::lifecycle::{LIFECYCLE, install_signal_handlers};
use hybrid_common::logging::init_tracing;
use hybrid_common::protocol::ModuleKind;
use hybrid_shared_memory::{ModuleIpc, PosixIpc, SetupMode};
use std::path::PathBuf;
use tracing::{error, info};

/// Engine module process options.
#[derive(Parser, Debug)]
#[command(version)]
#[command(about = "Hybrid vehicle drivetrain module (attaches to resources created by hybrid_vmu)")]
pub struct ModuleArgs {
    /// Path to the shared TOML configuration. Built-in defaults when absent.
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Enable verbose logging (DEBUG level).
    #[arg(short, long)]
    pub verbose: bool,

    /// Output logs in JSON format.
    #[arg(long)]
    pub json: bool,
}

/// Run a module process to completion and return its exit status.
pub fn run_module<E, F>(kind: ModuleKind, args: &ModuleArgs, build: F) -> i32
where
    E: Engine,
    F: FnOnce(&SystemConfig) -> E,
{
    let config = match SystemConfig::load_or_default(args.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            init_tracing(LogLevel::Info, args.verbose, args.json);
            error!("FATAL: {}", ModuleError::from(e));
            return 1;
        }
    };
    init_tracing(config.shared.log_level, args.verbose, args.json);
    info!(
        service = %config.shared.service_name,
        "hybrid {kind} module v{} starting",
        env!("CARGO_PKG_VERSION")
    );

    match run(kind, &config, build) {
        Ok(()) => {
            info!("hybrid {kind} module shutdown complete");
            0
        }
        Err(e) => {
            error!("FATAL: {e}");
            e.exit_code()
        }
    }
}

fn run<E, F>(kind: ModuleKind, config: &SystemConfig, build: F) -> Result<(), ModuleError>
where
    E: Engine,
    F: FnOnce(&SystemConfig) -> E,
{
    install_signal_handlers()?;

    let ModuleIpc { state, channel } =
        ModuleIpc::initialize(&PosixIpc, &config.ipc, kind, SetupMode::Attach)?;

    let poll_ms = match kind {
        ModuleKind::Ev => config.ev.poll_ms,
        ModuleKind::Iec => config.iec.poll_ms,
    };
    let mut runner = ModuleRunner::new(
        build(config),
        state,
        channel,
        &LIFECYCLE,
        TickBudget::from_millis(poll_ms),
    )?;

    let result = runner.run();
    runner.shutdown();
    result
}
