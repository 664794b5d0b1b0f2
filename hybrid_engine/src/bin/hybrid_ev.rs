//! # Hybrid EV module
//!
//! Electric drivetrain process. Attaches to the shared state and the EV
//! queue created by `hybrid_vmu`, then answers one request per VMU tick.

use clap::Parser;
use hybrid_common::protocol::ModuleKind;
use hybrid_engine::EvEngine;
use hybrid_engine::app::{ModuleArgs, run_module};

fn main() {
    let args = ModuleArgs::parse();
    let code = run_module(ModuleKind::Ev, &args, |config| EvEngine::new(config.ev.clone()));
    std::process::exit(code);
}
