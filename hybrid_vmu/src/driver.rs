//! Simulated driver: presses the accelerator below the cruise band and
//! lifts off above it.

use hybrid_common::config::DriverConfig;

#[derive(Debug, Clone)]
pub struct DriverModel {
    config: DriverConfig,
    engaged: bool,
}

impl DriverModel {
    /// Driver starting with the accelerator pressed.
    pub fn new(config: DriverConfig) -> Self {
        Self {
            config,
            engaged: true,
        }
    }

    pub fn accelerator(&self) -> bool {
        self.engaged
    }

    /// Update the pedal for `velocity` and return it. Inside the band the
    /// previous position is kept.
    pub fn update(&mut self, velocity: f64) -> bool {
        let low = self.config.cruise_speed - self.config.band;
        let high = self.config.cruise_speed + self.config.band;
        if velocity < low {
            self.engaged = true;
        } else if velocity > high {
            self.engaged = false;
        }
        self.engaged
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pedal_follows_band_edges_with_memory() {
        let mut driver = DriverModel::new(DriverConfig::default());
        assert!(driver.update(0.0));
        assert!(driver.update(70.0));
        assert!(driver.update(85.0));
        assert!(!driver.update(85.1));
        assert!(!driver.update(70.0));
        assert!(!driver.update(55.0));
        assert!(driver.update(54.9));
        assert!(driver.accelerator());
    }
}
