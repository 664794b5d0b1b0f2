//! Drivetrain mode decision.
//!
//! The controller keeps a preferred drivetrain and switches it only when
//! a threshold is crossed by more than its dead zone:
//!
//! | Preferred | Switch when                                                      |
//! |-----------|------------------------------------------------------------------|
//! | EV        | `v > ev_speed_limit + speed_dead_zone` or `battery < battery_low − battery_dead_zone` |
//! | IEC       | `v < ev_speed_limit − speed_dead_zone` and `battery > battery_low + battery_dead_zone` |
//!
//! An empty energy source overrides the preference. The transition factor
//! (0 = all electric, 1 = all combustion) then moves toward the preferred
//! end at `transition_rate` per second, so a switch blends both drivetrains
//! for a few ticks instead of flipping in one.

use hybrid_common::config::ModeConfig;
use hybrid_common::protocol::ModuleKind;
use std::time::Duration;
use tracing::info;

/// Outcome of one mode decision.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ModeDecision {
    /// 0 = all electric, 1 = all combustion.
    pub transition_factor: f64,
    pub primary: ModuleKind,
    /// Power share for the EV module in `[0, 1]`.
    pub ev_share: f64,
    /// Power share for the IEC module in `[0, 1]`.
    pub iec_share: f64,
}

impl ModeDecision {
    pub fn share(&self, kind: ModuleKind) -> f64 {
        match kind {
            ModuleKind::Ev => self.ev_share,
            ModuleKind::Iec => self.iec_share,
        }
    }

    /// Whether `kind` should be running.
    pub fn wants(&self, kind: ModuleKind) -> bool {
        self.share(kind) > 0.0
    }
}

#[derive(Debug, Clone)]
pub struct ModeController {
    config: ModeConfig,
    prefer_ev: bool,
    factor: f64,
}

impl ModeController {
    /// Controller starting fully electric.
    pub fn new(config: ModeConfig) -> Self {
        Self {
            config,
            prefer_ev: true,
            factor: 0.0,
        }
    }

    /// Controller starting at `factor` with the matching preference.
    pub fn with_factor(mut self, factor: f64) -> Self {
        self.factor = if factor.is_finite() { factor.clamp(0.0, 1.0) } else { 0.0 };
        self.prefer_ev = self.factor < 0.5;
        self
    }

    pub fn transition_factor(&self) -> f64 {
        self.factor
    }

    pub fn prefers_ev(&self) -> bool {
        self.prefer_ev
    }

    pub fn decide(&mut self, velocity: f64, battery: f64, fuel: f64, dt: Duration) -> ModeDecision {
        let c = &self.config;
        let prefer_ev = if self.prefer_ev {
            !(velocity > c.ev_speed_limit + c.speed_dead_zone
                || battery < c.battery_low - c.battery_dead_zone)
        } else {
            velocity < c.ev_speed_limit - c.speed_dead_zone
                && battery > c.battery_low + c.battery_dead_zone
        };
        if prefer_ev != self.prefer_ev {
            info!(
                velocity,
                battery,
                to = if prefer_ev { "EV" } else { "IEC" },
                "drivetrain preference changed"
            );
            self.prefer_ev = prefer_ev;
        }

        let battery_empty = battery <= 0.0;
        let fuel_empty = fuel <= 0.0;
        let target = match (battery_empty, fuel_empty) {
            (true, false) => 1.0,
            (false, true) => 0.0,
            _ if self.prefer_ev => 0.0,
            _ => 1.0,
        };
        let step = c.transition_rate * dt.as_secs_f64();
        self.factor = if self.factor < target {
            (self.factor + step).min(target)
        } else {
            (self.factor - step).max(target)
        };

        ModeDecision {
            transition_factor: self.factor,
            primary: if self.factor < 0.5 { ModuleKind::Ev } else { ModuleKind::Iec },
            ev_share: if battery_empty { 0.0 } else { 1.0 - self.factor },
            iec_share: if fuel_empty { 0.0 } else { self.factor },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TICK: Duration = Duration::from_secs(1);

    fn controller() -> ModeController {
        ModeController::new(ModeConfig::default())
    }

    #[test]
    fn low_speed_full_battery_is_all_electric() {
        let d = controller().decide(30.0, 90.0, 40.0, TICK);
        assert_eq!(d.transition_factor, 0.0);
        assert_eq!(d.primary, ModuleKind::Ev);
        assert_eq!(d.ev_share, 1.0);
        assert!(!d.wants(ModuleKind::Iec));
    }

    #[test]
    fn dead_zone_prevents_switching_at_threshold() {
        let mut mode = controller();
        for v in [50.0, 54.9, 52.0, 55.0] {
            mode.decide(v, 90.0, 40.0, TICK);
            assert!(mode.prefers_ev(), "switched at {v}");
        }
        mode.decide(55.1, 90.0, 40.0, TICK);
        assert!(!mode.prefers_ev());
        for v in [50.0, 45.0] {
            mode.decide(v, 90.0, 40.0, TICK);
            assert!(!mode.prefers_ev(), "switched back at {v}");
        }
        mode.decide(44.9, 90.0, 40.0, TICK);
        assert!(mode.prefers_ev());
    }

    #[test]
    fn switch_blends_over_several_ticks() {
        let vmu = hybrid_common::config::VmuConfig::default();
        let tick = vmu.tick_period();
        let mut mode = ModeController::new(vmu.mode);

        let first = mode.decide(80.0, 90.0, 40.0, tick);
        assert!((first.transition_factor - 0.375).abs() < 1e-9);
        assert_eq!(first.primary, ModuleKind::Ev);
        assert!(first.wants(ModuleKind::Ev) && first.wants(ModuleKind::Iec));

        let second = mode.decide(80.0, 90.0, 40.0, tick);
        assert!((second.transition_factor - 0.75).abs() < 1e-9);
        assert_eq!(second.primary, ModuleKind::Iec);
        assert!(second.ev_share > 0.0);

        let third = mode.decide(80.0, 90.0, 40.0, tick);
        assert_eq!(third.transition_factor, 1.0);
        assert_eq!(third.ev_share, 0.0);
        assert_eq!(third.iec_share, 1.0);
    }

    #[test]
    fn low_battery_hands_over_to_combustion() {
        let mut mode = controller();
        mode.decide(10.0, 16.0, 40.0, TICK);
        assert!(mode.prefers_ev());
        mode.decide(10.0, 14.9, 40.0, TICK);
        assert!(!mode.prefers_ev());
        // Needs more than 25 % to come back.
        mode.decide(10.0, 24.0, 40.0, TICK);
        assert!(!mode.prefers_ev());
        mode.decide(10.0, 25.1, 40.0, TICK);
        assert!(mode.prefers_ev());
    }

    #[test]
    fn empty_source_gets_no_share() {
        let mut mode = controller().with_factor(1.0);
        let d = mode.decide(100.0, 90.0, 0.0, Duration::from_secs(10));
        assert_eq!(d.iec_share, 0.0);
        assert_eq!(d.transition_factor, 0.0);
        assert_eq!(d.ev_share, 1.0);

        let mut mode = controller();
        let d = mode.decide(10.0, 0.0, 0.0, TICK);
        assert_eq!(d.ev_share, 0.0);
        assert_eq!(d.iec_share, 0.0);
    }

    #[test]
    fn factor_stays_in_unit_range() {
        let mut mode = controller();
        for i in 0..50 {
            let v = if i % 7 < 3 { 150.0 } else { 0.0 };
            let d = mode.decide(v, 50.0, 20.0, Duration::from_millis(300 * i));
            assert!((0.0..=1.0).contains(&d.transition_factor));
            assert!((d.ev_share + d.iec_share - 1.0).abs() < 1e-12);
        }
    }
}
