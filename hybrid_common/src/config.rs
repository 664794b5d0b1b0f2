//! Configuration loading traits and types.
//!
//! One `SystemConfig` is shared by the VMU and both engine modules so that
//! resource names and simulation constants cannot drift apart between
//! processes. Every field has a default; a missing file section falls back to
//! the built-in values.
//!
//! # Usage
//!
//! ```rust,no_run
//! use hybrid_common::config::{ConfigLoader, ConfigError, SystemConfig};
//! use std::path::Path;
//!
//! fn main() -> Result<(), ConfigError> {
//!     let config = SystemConfig::load(Path::new("config/hybrid.toml"))?;
//!     config.validate()?;
//!     println!("VMU tick: {} ms", config.vmu.tick_ms);
//!     Ok(())
//! }
//! ```

use crate::consts::{
    BATTERY_MAX, BATTERY_MIN, DEFAULT_EV_QUEUE, DEFAULT_IEC_QUEUE, DEFAULT_MAX_FUEL,
    DEFAULT_MODULE_POLL_MS, DEFAULT_SEMAPHORE_NAME, DEFAULT_SHM_NAME, DEFAULT_TICK_MS,
};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Error type for configuration loading operations.
#[derive(Debug, Clone, Error)]
pub enum ConfigError {
    /// Configuration file not found at specified path.
    #[error("Configuration file not found")]
    FileNotFound,

    /// TOML parsing failed.
    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    /// Semantic validation failed.
    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

/// Log level for application logging.
///
/// Uses lowercase serde values for TOML compatibility.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Most verbose, detailed tracing information.
    Trace,
    /// Debug information useful during development.
    Debug,
    /// General information about application operation.
    #[default]
    Info,
    /// Warning messages for potentially problematic situations.
    Warn,
    /// Error messages for serious problems.
    Error,
}

impl LogLevel {
    /// Directive string understood by `tracing_subscriber::EnvFilter`.
    pub const fn as_directive(self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }
}

/// Fields common to every process.
///
/// ```toml
/// [shared]
/// log_level = "debug"
/// service_name = "hybrid-bench-01"
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SharedConfig {
    /// Logging verbosity level.
    pub log_level: LogLevel,

    /// Simulation instance identifier, attached to log output.
    pub service_name: String,
}

impl Default for SharedConfig {
    fn default() -> Self {
        Self {
            log_level: LogLevel::Info,
            service_name: "hybrid".to_string(),
        }
    }
}

impl SharedConfig {
    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ValidationError` if `service_name` is empty.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.service_name.is_empty() {
            return Err(invalid("service_name cannot be empty"));
        }
        Ok(())
    }
}

/// Names of the four POSIX resources shared by the processes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IpcConfig {
    /// Shared-memory segment holding `SystemState`.
    pub shm_name: String,
    /// Named semaphore guarding the segment.
    pub semaphore_name: String,
    /// VMU <-> EV message queue.
    pub ev_queue: String,
    /// VMU <-> IEC message queue.
    pub iec_queue: String,
}

impl Default for IpcConfig {
    fn default() -> Self {
        Self {
            shm_name: DEFAULT_SHM_NAME.to_string(),
            semaphore_name: DEFAULT_SEMAPHORE_NAME.to_string(),
            ev_queue: DEFAULT_EV_QUEUE.to_string(),
            iec_queue: DEFAULT_IEC_QUEUE.to_string(),
        }
    }
}

impl IpcConfig {
    /// Derive a set of names with `suffix` appended to each default.
    ///
    /// Lets several simulations (or test runs) coexist on one host.
    pub fn with_suffix(suffix: &str) -> Self {
        let d = Self::default();
        Self {
            shm_name: format!("{}_{suffix}", d.shm_name),
            semaphore_name: format!("{}_{suffix}", d.semaphore_name),
            ev_queue: format!("{}_{suffix}", d.ev_queue),
            iec_queue: format!("{}_{suffix}", d.iec_queue),
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let names = [
            ("shm_name", &self.shm_name),
            ("semaphore_name", &self.semaphore_name),
            ("ev_queue", &self.ev_queue),
            ("iec_queue", &self.iec_queue),
        ];
        for (field, name) in names {
            if !name.starts_with('/') || name.len() < 2 || name[1..].contains('/') {
                return Err(invalid(format!(
                    "ipc.{field} must be '/' followed by a non-empty name without '/', got {name:?}"
                )));
            }
            if name.len() > 255 {
                return Err(invalid(format!("ipc.{field} exceeds 255 bytes")));
            }
        }
        if self.ev_queue == self.iec_queue {
            return Err(invalid("ipc.ev_queue and ipc.iec_queue must differ"));
        }
        Ok(())
    }
}

/// Drivetrain mode policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModeConfig {
    /// Above this speed [km/h] the combustion engine is favoured.
    pub ev_speed_limit: f64,
    /// Below this battery level [%] the combustion engine is favoured.
    pub battery_low: f64,
    /// Hysteresis half-width around `ev_speed_limit` [km/h].
    pub speed_dead_zone: f64,
    /// Hysteresis half-width around `battery_low` [%].
    pub battery_dead_zone: f64,
    /// Rate at which the transition factor moves toward its target [1/s].
    pub transition_rate: f64,
}

impl Default for ModeConfig {
    fn default() -> Self {
        Self {
            ev_speed_limit: 50.0,
            battery_low: 20.0,
            speed_dead_zone: 5.0,
            battery_dead_zone: 5.0,
            transition_rate: 0.15,
        }
    }
}

/// Longitudinal vehicle model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DynamicsConfig {
    /// Speed ceiling [km/h].
    pub max_velocity: f64,
    /// Acceleration at full electric RPM [km/h per s].
    pub ev_acceleration: f64,
    /// Acceleration at full combustion RPM [km/h per s].
    pub iec_acceleration: f64,
    /// Proportional aerodynamic/rolling drag [1/s].
    pub drag: f64,
    /// Constant deceleration while the accelerator is released [km/h per s].
    pub coast_deceleration: f64,
}

impl Default for DynamicsConfig {
    fn default() -> Self {
        Self {
            max_velocity: 180.0,
            ev_acceleration: 6.0,
            iec_acceleration: 8.0,
            drag: 0.02,
            coast_deceleration: 1.5,
        }
    }
}

/// Simulated driver holding a cruise speed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DriverConfig {
    /// Speed the driver aims for [km/h].
    pub cruise_speed: f64,
    /// Half-width of the band around `cruise_speed` [km/h].
    pub band: f64,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            cruise_speed: 70.0,
            band: 15.0,
        }
    }
}

/// Vehicle Management Unit settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VmuConfig {
    /// Tick period [ms].
    pub tick_ms: u64,
    /// Delay between sending commands and polling for replies [ms].
    pub reply_grace_ms: u64,
    /// Delay between sending END and destroying shared resources [ms].
    pub shutdown_grace_ms: u64,
    /// Battery level written into a freshly created state [%].
    pub initial_battery: f64,
    /// Fuel level written into a freshly created state [l].
    pub initial_fuel: f64,
    /// Drivetrain mode policy.
    pub mode: ModeConfig,
    /// Vehicle model.
    pub dynamics: DynamicsConfig,
    /// Driver model.
    pub driver: DriverConfig,
}

impl Default for VmuConfig {
    fn default() -> Self {
        Self {
            tick_ms: DEFAULT_TICK_MS,
            reply_grace_ms: 25,
            shutdown_grace_ms: 200,
            initial_battery: BATTERY_MAX,
            initial_fuel: DEFAULT_MAX_FUEL,
            mode: ModeConfig::default(),
            dynamics: DynamicsConfig::default(),
            driver: DriverConfig::default(),
        }
    }
}

impl VmuConfig {
    /// Tick period as a `Duration`.
    pub fn tick_period(&self) -> Duration {
        Duration::from_millis(self.tick_ms)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.tick_ms == 0 {
            return Err(invalid("vmu.tick_ms must be greater than 0"));
        }
        if self.reply_grace_ms >= self.tick_ms {
            return Err(invalid("vmu.reply_grace_ms must be shorter than vmu.tick_ms"));
        }
        if !(BATTERY_MIN..=BATTERY_MAX).contains(&self.initial_battery) {
            return Err(invalid("vmu.initial_battery must be within [0, 100]"));
        }

        let m = &self.mode;
        positive("vmu.mode.ev_speed_limit", m.ev_speed_limit)?;
        positive("vmu.mode.transition_rate", m.transition_rate)?;
        if m.transition_rate * self.tick_period().as_secs_f64() >= 1.0 {
            return Err(invalid(
                "vmu.mode.transition_rate must leave more than one tick for a mode switch",
            ));
        }
        non_negative("vmu.mode.speed_dead_zone", m.speed_dead_zone)?;
        non_negative("vmu.mode.battery_dead_zone", m.battery_dead_zone)?;
        if !(m.battery_low > BATTERY_MIN && m.battery_low < BATTERY_MAX) {
            return Err(invalid("vmu.mode.battery_low must be within (0, 100)"));
        }
        if m.speed_dead_zone >= m.ev_speed_limit {
            return Err(invalid("vmu.mode.speed_dead_zone must be below ev_speed_limit"));
        }

        let d = &self.dynamics;
        positive("vmu.dynamics.max_velocity", d.max_velocity)?;
        non_negative("vmu.dynamics.ev_acceleration", d.ev_acceleration)?;
        non_negative("vmu.dynamics.iec_acceleration", d.iec_acceleration)?;
        non_negative("vmu.dynamics.drag", d.drag)?;
        non_negative("vmu.dynamics.coast_deceleration", d.coast_deceleration)?;

        positive("vmu.driver.cruise_speed", self.driver.cruise_speed)?;
        non_negative("vmu.driver.band", self.driver.band)?;
        Ok(())
    }
}

/// Electric drivetrain module settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EvConfig {
    /// Module loop period [ms].
    pub poll_ms: u64,
    /// Motor speed at full power [rpm].
    pub max_rpm: f64,
    /// Maximum RPM change toward the target [rpm/s].
    pub rpm_slew: f64,
    /// RPM decay after STOP [rpm/s].
    pub coast_down: f64,
    /// Battery drain at full RPM [%/s].
    pub drain_per_sec: f64,
    /// Battery gain while not drawing power [%/s].
    pub trickle_per_sec: f64,
    /// Regenerative gain per km/h while the accelerator is released [%/s].
    pub regen_per_kmh: f64,
}

impl Default for EvConfig {
    fn default() -> Self {
        Self {
            poll_ms: DEFAULT_MODULE_POLL_MS,
            max_rpm: 10_000.0,
            rpm_slew: 4_000.0,
            coast_down: 3_000.0,
            drain_per_sec: 0.5,
            trickle_per_sec: 0.05,
            regen_per_kmh: 0.002,
        }
    }
}

impl EvConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.poll_ms == 0 {
            return Err(invalid("ev.poll_ms must be greater than 0"));
        }
        positive("ev.max_rpm", self.max_rpm)?;
        positive("ev.rpm_slew", self.rpm_slew)?;
        positive("ev.coast_down", self.coast_down)?;
        non_negative("ev.drain_per_sec", self.drain_per_sec)?;
        non_negative("ev.trickle_per_sec", self.trickle_per_sec)?;
        non_negative("ev.regen_per_kmh", self.regen_per_kmh)?;
        Ok(())
    }
}

/// Combustion drivetrain module settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IecConfig {
    /// Module loop period [ms].
    pub poll_ms: u64,
    /// Engine speed ceiling [rpm].
    pub max_rpm: f64,
    /// Engine speed with the accelerator released [rpm].
    pub idle_rpm: f64,
    /// Maximum RPM change toward the target [rpm/s].
    pub rpm_slew: f64,
    /// RPM decay after STOP [rpm/s].
    pub coast_down: f64,
    /// Fuel burn at full RPM in top gear [l/s].
    pub fuel_per_sec: f64,
    /// Tank capacity [l].
    pub max_fuel: f64,
    /// Speeds [km/h] at which gears 2, 3, ... engage. Strictly increasing.
    pub upshift_speeds: Vec<f64>,
}

impl Default for IecConfig {
    fn default() -> Self {
        Self {
            poll_ms: DEFAULT_MODULE_POLL_MS,
            max_rpm: 6_000.0,
            idle_rpm: 800.0,
            rpm_slew: 3_000.0,
            coast_down: 2_000.0,
            fuel_per_sec: 0.02,
            max_fuel: DEFAULT_MAX_FUEL,
            upshift_speeds: vec![20.0, 40.0, 60.0, 90.0, 120.0],
        }
    }
}

impl IecConfig {
    /// Number of forward gears.
    pub fn gear_count(&self) -> u8 {
        (self.upshift_speeds.len() + 1).min(u8::MAX as usize) as u8
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.poll_ms == 0 {
            return Err(invalid("iec.poll_ms must be greater than 0"));
        }
        positive("iec.max_rpm", self.max_rpm)?;
        non_negative("iec.idle_rpm", self.idle_rpm)?;
        if self.idle_rpm >= self.max_rpm {
            return Err(invalid("iec.idle_rpm must be below iec.max_rpm"));
        }
        positive("iec.rpm_slew", self.rpm_slew)?;
        positive("iec.coast_down", self.coast_down)?;
        non_negative("iec.fuel_per_sec", self.fuel_per_sec)?;
        positive("iec.max_fuel", self.max_fuel)?;
        if self.upshift_speeds.len() >= u8::MAX as usize {
            return Err(invalid("iec.upshift_speeds has too many entries"));
        }
        let mut previous = 0.0;
        for &speed in &self.upshift_speeds {
            if !speed.is_finite() || speed <= previous {
                return Err(invalid(
                    "iec.upshift_speeds must be positive and strictly increasing",
                ));
            }
            previous = speed;
        }
        Ok(())
    }
}

/// Complete configuration shared by all three processes.
///
/// ```toml
/// [shared]
/// log_level = "info"
///
/// [ipc]
/// shm_name = "/hybrid_system_state"
///
/// [vmu]
/// tick_ms = 500
///
/// [vmu.mode]
/// battery_low = 25.0
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SystemConfig {
    /// Common fields.
    pub shared: SharedConfig,
    /// Resource names.
    pub ipc: IpcConfig,
    /// Orchestrator.
    pub vmu: VmuConfig,
    /// Electric module.
    pub ev: EvConfig,
    /// Combustion module.
    pub iec: IecConfig,
}

impl SystemConfig {
    /// Load from `path` if given, built-in defaults otherwise, then validate.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self, ConfigError> {
        let config = match path {
            Some(path) => Self::load(path)?,
            None => Self::default(),
        };
        config.validate()?;
        Ok(config)
    }

    /// Validate every section and the cross-section constraints.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ValidationError` naming the first offending field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.shared.validate()?;
        self.ipc.validate()?;
        self.vmu.validate()?;
        self.ev.validate()?;
        self.iec.validate()?;
        if !(0.0..=self.iec.max_fuel).contains(&self.vmu.initial_fuel) {
            return Err(invalid("vmu.initial_fuel must be within [0, iec.max_fuel]"));
        }
        Ok(())
    }
}

/// Trait for loading configuration from TOML files.
///
/// Blanket-implemented for every `serde::de::DeserializeOwned` type.
///
/// # Contract
///
/// - Returns `ConfigError::FileNotFound` if the file does not exist
/// - Returns `ConfigError::ParseError` if TOML syntax is invalid
pub trait ConfigLoader: Sized + serde::de::DeserializeOwned {
    /// Load configuration from a TOML file.
    fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ConfigError::FileNotFound
            } else {
                ConfigError::ParseError(e.to_string())
            }
        })?;

        toml::from_str(&content).map_err(|e| ConfigError::ParseError(e.to_string()))
    }
}

impl<T: serde::de::DeserializeOwned> ConfigLoader for T {}

fn invalid(msg: impl Into<String>) -> ConfigError {
    ConfigError::ValidationError(msg.into())
}

fn positive(field: &str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(invalid(format!("{field} must be a positive number, got {value}")))
    }
}

fn non_negative(field: &str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(invalid(format!("{field} must be a non-negative number, got {value}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_level_default() {
        assert_eq!(LogLevel::default(), LogLevel::Info);
    }

    #[test]
    fn test_log_level_deserialization() {
        #[derive(Debug, Deserialize, PartialEq)]
        struct TestWrapper {
            level: LogLevel,
        }

        for (text, level) in [
            ("trace", LogLevel::Trace),
            ("debug", LogLevel::Debug),
            ("info", LogLevel::Info),
            ("warn", LogLevel::Warn),
            ("error", LogLevel::Error),
        ] {
            let parsed: TestWrapper = toml::from_str(&format!("level = \"{text}\"")).unwrap();
            assert_eq!(parsed.level, level);
            assert_eq!(level.as_directive(), text);
        }
    }

    #[test]
    fn test_defaults_validate() {
        assert!(SystemConfig::default().validate().is_ok());
    }

    #[test]
    fn test_empty_service_name_rejected() {
        let mut config = SystemConfig::default();
        config.shared.service_name.clear();
        assert!(matches!(config.validate(), Err(ConfigError::ValidationError(_))));
    }

    #[test]
    fn test_resource_name_without_slash_rejected() {
        let mut config = SystemConfig::default();
        config.ipc.shm_name = "hybrid".to_string();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("ipc.shm_name"));
    }

    #[test]
    fn test_identical_queues_rejected() {
        let mut config = SystemConfig::default();
        config.ipc.iec_queue = config.ipc.ev_queue.clone();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_suffix_names_stay_valid() {
        let ipc = IpcConfig::with_suffix("42_7");
        assert!(ipc.validate().is_ok());
        assert!(ipc.shm_name.ends_with("_42_7"));
        assert_ne!(ipc.ev_queue, ipc.iec_queue);
    }

    #[test]
    fn test_zero_tick_rejected() {
        let mut config = SystemConfig::default();
        config.vmu.tick_ms = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_single_tick_transition_rejected() {
        let mut config = SystemConfig::default();
        config.vmu.mode.transition_rate = 0.5;
        assert!(config.validate().is_err());

        config.vmu.mode.transition_rate = 0.15;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_idle_above_max_rejected() {
        let mut config = SystemConfig::default();
        config.iec.idle_rpm = config.iec.max_rpm + 1.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_non_monotonic_upshift_rejected() {
        let mut config = SystemConfig::default();
        config.iec.upshift_speeds = vec![20.0, 15.0];
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_initial_fuel_above_tank_rejected() {
        let mut config = SystemConfig::default();
        config.vmu.initial_fuel = config.iec.max_fuel + 1.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_nan_rate_rejected() {
        let mut config = SystemConfig::default();
        config.ev.drain_per_sec = f64::NAN;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_gear_count_follows_upshift_table() {
        let config = IecConfig::default();
        assert_eq!(config.gear_count(), 6);
    }

    #[test]
    fn test_load_or_default_without_path() {
        let config = SystemConfig::load_or_default(None).unwrap();
        assert_eq!(config.vmu.tick_ms, DEFAULT_TICK_MS);
    }
}
