//! Combustion drivetrain: engine RPM, gearbox and fuel tank.
//!
//! Gear follows vehicle speed through the upshift table. With the
//! accelerator engaged the engine targets
//! `idle + (max − idle) × power × (0.5 + 0.5 × band)`, where `band` is the
//! speed's position within the current gear; released, it falls back to
//! idle. Fuel burns only while `Active` with the accelerator engaged, at a
//! rate proportional to RPM and gear.

use crate::engine::{DriveInputs, Engine, approach, coast_down, sanitize_power};
use hybrid_common::config::IecConfig;
use hybrid_common::protocol::{
    Command, Diagnostic, EngineState, ModuleKind, Reply, Request, diagnostic,
};
use hybrid_common::state::SystemState;
use std::time::Duration;
use tracing::{debug, info, warn};

#[derive(Debug, Clone)]
pub struct IecEngine {
    config: IecConfig,
    state: EngineState,
    rpm: f64,
    fuel: f64,
    gear: u8,
    power: f64,
    inputs: DriveInputs,
    diagnostic: Diagnostic,
}

impl IecEngine {
    /// Idle engine with a full tank.
    pub fn new(config: IecConfig) -> Self {
        let fuel = config.max_fuel;
        Self {
            config,
            state: EngineState::Idle,
            rpm: 0.0,
            fuel,
            gear: 0,
            power: 0.0,
            inputs: DriveInputs::default(),
            diagnostic: diagnostic("IEC idle"),
        }
    }

    pub fn with_fuel(mut self, litres: f64) -> Self {
        self.fuel = self.clamp_fuel(litres);
        self
    }

    pub fn rpm(&self) -> f64 {
        self.rpm
    }

    pub fn fuel(&self) -> f64 {
        self.fuel
    }

    pub fn gear(&self) -> u8 {
        self.gear
    }

    pub fn power(&self) -> f64 {
        self.power
    }

    /// Gear for `velocity`: 1 plus the number of upshift speeds reached.
    pub fn gear_for(&self, velocity: f64) -> u8 {
        let reached = self
            .config
            .upshift_speeds
            .iter()
            .take_while(|&&speed| velocity >= speed)
            .count();
        (reached + 1).min(usize::from(self.config.gear_count())) as u8
    }

    /// Position of `velocity` within `gear`'s speed band, in `[0, 1]`.
    fn band_position(&self, gear: u8, velocity: f64) -> f64 {
        let speeds = &self.config.upshift_speeds;
        let index = usize::from(gear.max(1)) - 1;
        let lower = if index == 0 { 0.0 } else { speeds[index - 1] };
        let upper = match speeds.get(index) {
            Some(&upper) => upper,
            // Top gear: reuse the width of the band below it.
            None => {
                let below = if index >= 2 { speeds[index - 2] } else { 0.0 };
                lower + (lower - below).max(1.0)
            }
        };
        ((velocity - lower) / (upper - lower)).clamp(0.0, 1.0)
    }

    fn target_rpm(&self) -> f64 {
        let idle = self.config.idle_rpm;
        if !self.inputs.accelerator {
            return idle;
        }
        let band = self.band_position(self.gear, self.inputs.velocity);
        idle + (self.config.max_rpm - idle) * self.power * (0.5 + 0.5 * band)
    }

    fn clamp_fuel(&self, litres: f64) -> f64 {
        if litres.is_nan() { 0.0 } else { litres.clamp(0.0, self.config.max_fuel) }
    }

    fn start(&mut self, power: f64) {
        if self.fuel <= 0.0 {
            warn!("IEC start refused: fuel depleted");
            self.diagnostic = diagnostic("IEC start refused: fuel depleted");
            return;
        }
        if self.state != EngineState::Active {
            info!(power, fuel = self.fuel, "IEC started");
        }
        self.state = EngineState::Active;
        self.power = power;
        self.gear = self.gear_for(self.inputs.velocity);
        self.diagnostic = diagnostic("IEC running");
    }
}

impl Engine for IecEngine {
    fn kind(&self) -> ModuleKind {
        ModuleKind::Iec
    }

    fn engine_state(&self) -> EngineState {
        self.state
    }

    fn seed(&mut self, state: &SystemState) {
        self.fuel = self.clamp_fuel(state.fuel_level);
    }

    fn handle(&mut self, request: &Request) {
        if let Command::Unknown(tag) = request.command {
            debug!(tag, "IEC ignoring unknown command");
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
                    info!(rpm = self.rpm, "IEC stopping");
                    self.state = EngineState::Stopping;
                    self.power = 0.0;
                    self.diagnostic = diagnostic("IEC coasting down");
                }
            }
            Command::End => {
                info!("IEC shutdown");
                self.state = EngineState::Shutdown;
                self.rpm = 0.0;
                self.gear = 0;
                self.power = 0.0;
                self.diagnostic = diagnostic("IEC shut down");
            }
            Command::Unknown(_) => {}
        }
    }

    fn tick(&mut self, dt: Duration) {
        let dt = dt.as_secs_f64();
        match self.state {
            EngineState::Active => {
                self.gear = self.gear_for(self.inputs.velocity);
                let target = self.target_rpm();
                self.rpm = approach(self.rpm, target, self.config.rpm_slew * dt);
                if self.inputs.accelerator {
                    let load = (self.rpm / self.config.max_rpm)
                        * (f64::from(self.gear) / f64::from(self.config.gear_count()));
                    self.fuel = self.clamp_fuel(self.fuel - self.config.fuel_per_sec * load * dt);
                }
                if self.fuel <= 0.0 {
                    warn!("IEC fuel depleted while running");
                    self.state = EngineState::Stopping;
                    self.power = 0.0;
                    self.diagnostic = diagnostic("IEC fuel depleted");
                }
            }
            EngineState::Stopping => {
                self.rpm = coast_down(self.rpm, self.config.coast_down, dt);
                if self.rpm == 0.0 {
                    self.state = EngineState::Idle;
                    self.gear = 0;
                    self.diagnostic = diagnostic("IEC idle");
                }
            }
            EngineState::Idle | EngineState::Shutdown => {
                self.rpm = 0.0;
                self.gear = 0;
            }
        }
    }

    fn publish(&self, state: &mut SystemState) {
        state.rpm_iec = self.rpm;
        state.fuel_level = self.fuel;
        state.gear = self.gear;
        state.iec_power = self.power;
        state.set_iec_active(self.rpm > 0.0);
    }

    fn reply(&self, command: Command) -> Reply {
        Reply {
            command,
            state: self.state,
            rpm: self.rpm,
            energy_level: self.fuel,
            gear: self.gear,
            power_level: self.power,
            diagnostic: self.diagnostic.clone(),
        }
    }

    fn diagnostic(&self) -> &Diagnostic {
        &self.diagnostic
    }
}
