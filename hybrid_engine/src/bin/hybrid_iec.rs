//! # Hybrid IEC module
//!
//! Combustion drivetrain process. Attaches to the shared state and the IEC
//! queue created by `hybrid_vmu`, then answers one request per VMU tick.

use clap::Parser;
use hybrid_common::protocol::ModuleKind;
use hybrid_engine::IecEngine;
use hybrid_engine::app::{ModuleArgs, run_module};

fn main() {
    let args = ModuleArgs::parse();
    let code = run_module(ModuleKind::Iec, &args, |config| IecEngine::new(config.iec.clone()));
    std::process::exit(code);
}
