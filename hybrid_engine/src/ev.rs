//! Electric drivetrain: motor RPM and battery state of charge.
//!
//! While `Active` the motor slews toward `max_rpm × power` and, when
//! drawing power, drains the battery in proportion to RPM. Otherwise the
//! battery trickle-charges, plus regeneration proportional to speed while
//! the accelerator is released. The level is clamped to `[0, 100]`; running
//! dry while `Active` starts a coast-down.

use crate::engine::{DriveInputs, Engine, approach, coast_down, sanitize_power};
use hybrid_common::config::EvConfig;
use hybrid_common::consts::{BATTERY_MAX, BATTERY_MIN};
use hybrid_common::protocol::{
    Command, Diagnostic, EngineState, ModuleKind, Reply, Request, diagnostic,
};
use hybrid_common::state::SystemState;
use std::time::Duration;
use tracing::{debug, info, warn};

#[derive(Debug, Clone)]
pub struct EvEngine {
    config: EvConfig,
    state: EngineState,
    rpm: f64,
    battery: f64,
    power: f64,
    inputs: DriveInputs,
    diagnostic: Diagnostic,
}

impl EvEngine {
    /// Idle engine with a full battery.
    pub fn new(config: EvConfig) -> Self {
        Self {
            config,
            state: EngineState::Idle,
            rpm: 0.0,
            battery: BATTERY_MAX,
            power: 0.0,
            inputs: DriveInputs::default(),
            diagnostic: diagnostic("EV idle"),
        }
    }

    pub fn with_battery(mut self, level: f64) -> Self {
        self.battery = clamp_battery(level);
        self
    }

    pub fn rpm(&self) -> f64 {
        self.rpm
    }

    pub fn battery(&self) -> f64 {
        self.battery
    }

    pub fn power(&self) -> f64 {
        self.power
    }

    fn start(&mut self, power: f64) {
        if self.battery <= BATTERY_MIN {
            warn!("EV start refused: battery depleted");
            self.diagnostic = diagnostic("EV start refused: battery depleted");
            return;
        }
        if self.state != EngineState::Active {
            info!(power, battery = self.battery, "EV started");
        }
        self.state = EngineState::Active;
        self.power = power;
        self.diagnostic = diagnostic("EV running");
    }

    fn charge(&mut self, dt: f64) {
        let mut rate = self.config.trickle_per_sec;
        if !self.inputs.accelerator {
            rate += self.config.regen_per_kmh * self.inputs.velocity;
        }
        self.battery += rate * dt;
    }
}

impl Engine for EvEngine {
    fn kind(&self) -> ModuleKind {
        ModuleKind::Ev
    }

    fn engine_state(&self) -> EngineState {
        self.state
    }

    fn seed(&mut self, state: &SystemState) {
        self.battery = clamp_battery(state.battery_level);
    }

    fn handle(&mut self, request: &Request) {
        if let Command::Unknown(tag) = request.command {
            debug!(tag, "EV ignoring unknown command");
            return;
        }
        if self.state == EngineState::Shutdown {
            return;
        }
        self.inputs = DriveInputs::from_request(request);
        let power = sanitize_power(request.power_level);

        match request.command {
            Command::Start => self.start(power),
            Command::SetPower => {
                if self.state == EngineState::Active {
                    self.power = power;
                }
            }
            Command::Stop => {
                if self.state == EngineState::Active {
                    info!(rpm = self.rpm, "EV stopping");
                    self.state = EngineState::Stopping;
                    self.power = 0.0;
                    self.diagnostic = diagnostic("EV coasting down");
                }
            }
            Command::End => {
                info!("EV shutdown");
                self.state = EngineState::Shutdown;
                self.rpm = 0.0;
                self.power = 0.0;
                self.diagnostic = diagnostic("EV shut down");
            }
            Command::Unknown(_) => {}
        }
    }

    fn tick(&mut self, dt: Duration) {
        let dt = dt.as_secs_f64();
        match self.state {
            EngineState::Active => {
                let target = self.config.max_rpm * self.power;
                self.rpm = approach(self.rpm, target, self.config.rpm_slew * dt);
                if self.power > 0.0 {
                    self.battery -= self.config.drain_per_sec * (self.rpm / self.config.max_rpm) * dt;
                } else {
                    self.charge(dt);
                }
            }
            EngineState::Stopping => {
                self.rpm = coast_down(self.rpm, self.config.coast_down, dt);
                if self.rpm == 0.0 {
                    self.state = EngineState::Idle;
                    self.diagnostic = diagnostic("EV idle");
                }
                self.charge(dt);
            }
            EngineState::Idle => {
                self.rpm = 0.0;
                self.charge(dt);
            }
            EngineState::Shutdown => {
                self.rpm = 0.0;
            }
        }

        self.battery = clamp_battery(self.battery);
        if self.state == EngineState::Active && self.battery <= BATTERY_MIN {
            warn!("EV battery depleted while running");
            self.state = EngineState::Stopping;
            self.power = 0.0;
            self.diagnostic = diagnostic("EV battery depleted");
        }
    }

    fn publish(&self, state: &mut SystemState) {
        state.rpm_ev = self.rpm;
        state.battery_level = self.battery;
        state.ev_power = self.power;
        state.set_ev_active(self.rpm > 0.0);
    }

    fn reply(&self, command: Command) -> Reply {
        Reply {
            command,
            state: self.state,
            rpm: self.rpm,
            energy_level: self.battery,
            gear: 0,
            power_level: self.power,
            diagnostic: self.diagnostic.clone(),
        }
    }

    fn diagnostic(&self) -> &Diagnostic {
        &self.diagnostic
    }
}

fn clamp_battery(level: f64) -> f64 {
    if level.is_nan() { BATTERY_MIN } else { level.clamp(BATTERY_MIN, BATTERY_MAX) }
}
