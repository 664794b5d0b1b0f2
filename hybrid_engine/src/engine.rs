//! Engine abstraction shared by the EV and IEC modules.
//!
//! Command handling and physics are separate: [`Engine::handle`] applies a
//! freshly received request to the state machine, [`Engine::tick`]
//! advances the simulation by `dt` whether or not a request arrived.
//!
//! | State      | START              | SET_POWER    | STOP      | END      |
//! |------------|--------------------|--------------|-----------|----------|
//! | `Idle`     | `Active`¹          | no-op        | no-op     | Shutdown |
//! | `Active`   | update power       | update power | Stopping  | Shutdown |
//! | `Stopping` | `Active`¹          | no-op        | no-op     | Shutdown |
//! | `Shutdown` | no-op              | no-op        | no-op     | no-op    |
//!
//! ¹ only with energy available; otherwise the state is kept and the
//! diagnostic reports the depletion. Unknown commands are ignored entirely.

use hybrid_common::protocol::{Command, Diagnostic, EngineState, ModuleKind, Reply, Request};
use hybrid_common::state::SystemState;
use std::time::Duration;

/// Driver inputs carried on the latest request.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct DriveInputs {
    /// Vehicle speed [km/h].
    pub velocity: f64,
    pub accelerator: bool,
}

impl DriveInputs {
    pub fn from_request(request: &Request) -> Self {
        Self {
            velocity: if request.velocity.is_finite() { request.velocity.max(0.0) } else { 0.0 },
            accelerator: request.accelerator,
        }
    }
}

/// One simulated drivetrain.
pub trait Engine {
    /// Which drivetrain this is.
    fn kind(&self) -> ModuleKind;

    /// Current state machine position.
    fn engine_state(&self) -> EngineState;

    /// Take the initial energy level from the shared record.
    fn seed(&mut self, state: &SystemState);

    /// Apply a request to the state machine.
    fn handle(&mut self, request: &Request);

    /// Advance the physics by `dt`.
    fn tick(&mut self, dt: Duration);

    /// Write this module's fields into the shared record.
    fn publish(&self, state: &mut SystemState);

    /// Status reply answering `command`.
    fn reply(&self, command: Command) -> Reply;

    /// Current human-readable status.
    fn diagnostic(&self) -> &Diagnostic;
}

/// Move `current` toward `target` by at most `max_step`.
#[inline]
pub fn approach(current: f64, target: f64, max_step: f64) -> f64 {
    let step = max_step.max(0.0);
    if current < target {
        (current + step).min(target)
    } else {
        (current - step).max(target)
    }
}

/// Linear RPM decay at `rate` rpm/s, never below zero.
#[inline]
pub fn coast_down(rpm: f64, rate: f64, dt: f64) -> f64 {
    (rpm - rate * dt).max(0.0)
}

/// Commanded power as a fraction in `[0, 1]`; NaN becomes 0.
#[inline]
pub fn sanitize_power(power: f64) -> f64 {
    if power.is_nan() { 0.0 } else { power.clamp(0.0, 1.0) }
}
