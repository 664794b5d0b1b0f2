//! # Hybrid Vehicle Management Unit
//!
//! Owns every shared resource and drives both engine modules:
//!
//! - [`dynamics`] - speed from RPMs, drag and coasting
//! - [`driver`] - accelerator input around a cruise speed
//! - [`mode`] - drivetrain selection with hysteresis and blending
//! - [`orchestrator`] - the tick: state, commands, replies, status
//!
//! ```text
//!  ┌───────────┐  request ─►  /hybrid_ev_commands  ─► ┌───────┐
//!  │           │  ◄─ reply                            │  EV   │──┐
//!  │    VMU    │                                      └───────┘  │
//!  │ (creates) │  request ─►  /hybrid_iec_commands ─► ┌───────┐  │
//!  │           │  ◄─ reply                            │  IEC  │──┤
//!  └─────┬─────┘                                      └───────┘  │
//!        └────────── SharedState (shm + semaphore) ──────────────┘
//! ```

pub mod driver;
pub mod dynamics;
pub mod error;
pub mod mode;
pub mod orchestrator;

pub use driver::DriverModel;
pub use dynamics::VehicleDynamics;
pub use error::VmuError;
pub use mode::{ModeController, ModeDecision};
pub use orchestrator::{ModuleLink, Orchestrator, TickReport, merge_reply};
