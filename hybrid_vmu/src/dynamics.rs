//! Longitudinal vehicle model.
//!
//! `v' = clamp(v + (drive − drag·v − coast)·dt, 0, v_max)`
//!
//! `drive` sums each engine's normalized RPM times its acceleration and
//! only applies while the accelerator is engaged; `coast` only while it is
//! released.

use hybrid_common::config::DynamicsConfig;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct VehicleDynamics {
    config: DynamicsConfig,
    ev_max_rpm: f64,
    iec_max_rpm: f64,
}

impl VehicleDynamics {
    pub fn new(config: DynamicsConfig, ev_max_rpm: f64, iec_max_rpm: f64) -> Self {
        Self {
            config,
            ev_max_rpm,
            iec_max_rpm,
        }
    }

    /// Velocity [km/h] after `dt` from `velocity`.
    pub fn step(
        &self,
        velocity: f64,
        rpm_ev: f64,
        rpm_iec: f64,
        accelerator: bool,
        dt: Duration,
    ) -> f64 {
        let v = finite_or_zero(velocity).max(0.0);
        let (drive, coast) = if accelerator {
            let drive = self.config.ev_acceleration * normalize(rpm_ev, self.ev_max_rpm)
                + self.config.iec_acceleration * normalize(rpm_iec, self.iec_max_rpm);
            (drive, 0.0)
        } else {
            (0.0, self.config.coast_deceleration)
        };
        let next = v + (drive - self.config.drag * v - coast) * dt.as_secs_f64();
        next.clamp(0.0, self.config.max_velocity)
    }
}

fn normalize(rpm: f64, max_rpm: f64) -> f64 {
    if max_rpm <= 0.0 {
        return 0.0;
    }
    (finite_or_zero(rpm) / max_rpm).clamp(0.0, 1.0)
}

#[inline]
fn finite_or_zero(value: f64) -> f64 {
    if value.is_finite() { value } else { 0.0 }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECOND: Duration = Duration::from_secs(1);

    fn dynamics() -> VehicleDynamics {
        VehicleDynamics::new(DynamicsConfig::default(), 10_000.0, 6_000.0)
    }

    #[test]
    fn full_electric_rpm_accelerates() {
        let v = dynamics().step(0.0, 10_000.0, 0.0, true, SECOND);
        assert_eq!(v, 6.0);
    }

    #[test]
    fn both_engines_add_up_less_drag() {
        // 6 × 0.5 + 8 × 0.5 − 0.02 × 50
        let v = dynamics().step(50.0, 5_000.0, 3_000.0, true, SECOND);
        assert!((v - 56.0).abs() < 1e-9, "{v}");
    }

    #[test]
    fn released_accelerator_coasts_and_never_reverses() {
        let d = dynamics();
        // 20 − 0.4 − 1.5
        assert!((d.step(20.0, 10_000.0, 6_000.0, false, SECOND) - 18.1).abs() < 1e-9);
        assert_eq!(d.step(1.0, 0.0, 0.0, false, Duration::from_secs(10)), 0.0);
    }

    #[test]
    fn speed_is_capped() {
        let v = dynamics().step(179.0, 10_000.0, 6_000.0, true, Duration::from_secs(60));
        assert_eq!(v, 180.0);
    }

    #[test]
    fn garbage_inputs_are_neutralised() {
        let d = dynamics();
        assert_eq!(d.step(f64::NAN, f64::INFINITY, -50.0, true, SECOND), 0.0);
        assert_eq!(d.step(10.0, 0.0, 0.0, true, Duration::ZERO), 10.0);
    }
}
