//! # Hybrid Engine Modules
//!
//! Simulation of the two drivetrains driven by the VMU:
//!
//! - [`ev::EvEngine`] - electric motor drawing from the battery
//! - [`iec::IecEngine`] - combustion engine with fuel tank and gearbox
//!
//! Both implement [`engine::Engine`]; [`runner::ModuleRunner`] drives one
//! engine against the shared state and its command channel, and [`app`]
//! wraps that into the `hybrid_ev` / `hybrid_iec` binaries.
//!
//! ```text
//!  request ──► handle() ──► tick(dt) ──► acquire ─► publish() ─► release ──► reply()
//! ```

pub mod app;
pub mod engine;
pub mod error;
pub mod ev;
pub mod iec;
pub mod runner;

pub use engine::{DriveInputs, Engine};
pub use error::ModuleError;
pub use ev::EvEngine;
pub use iec::IecEngine;
pub use runner::{ModuleRunner, StepOutcome};
