//! Tick pacing with drift compensation.
//!
//! A loop measures how long its work took and sleeps only the remainder of
//! a fixed period: `sleep(max(0, period - elapsed))`. An overrun never
//! produces a negative sleep; it is counted in [`CycleStats`] instead.

use std::time::{Duration, Instant};

/// Fixed tick period.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickBudget {
    period: Duration,
}

impl TickBudget {
    pub const fn new(period: Duration) -> Self {
        Self { period }
    }

    pub const fn from_millis(ms: u64) -> Self {
        Self::new(Duration::from_millis(ms))
    }

    #[inline]
    pub const fn period(&self) -> Duration {
        self.period
    }

    /// Time left in the period after `elapsed` of work; zero on overrun.
    #[inline]
    pub fn remaining(&self, elapsed: Duration) -> Duration {
        self.period.saturating_sub(elapsed)
    }

    /// Sleep until one period after `started`. Returns the work duration.
    pub fn sleep_remainder(&self, started: Instant) -> Duration {
        let elapsed = started.elapsed();
        let remaining = self.remaining(elapsed);
        if !remaining.is_zero() {
            std::thread::sleep(remaining);
        }
        elapsed
    }
}

/// Tick timing statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CycleStats {
    /// Total ticks recorded.
    pub cycle_count: u64,
    /// Last tick work duration [ns].
    pub last_cycle_ns: u64,
    /// Minimum work duration [ns].
    pub min_cycle_ns: u64,
    /// Maximum work duration [ns].
    pub max_cycle_ns: u64,
    /// Running sum for average computation.
    pub sum_cycle_ns: u128,
    /// Ticks whose work exceeded the period.
    pub overruns: u64,
}

impl CycleStats {
    /// Create a new zeroed stats instance.
    pub const fn new() -> Self {
        Self {
            cycle_count: 0,
            last_cycle_ns: 0,
            min_cycle_ns: u64::MAX,
            max_cycle_ns: 0,
            sum_cycle_ns: 0,
            overruns: 0,
        }
    }

    /// Record one tick's work duration against `budget`.
    pub fn record(&mut self, elapsed: Duration, budget: &TickBudget) {
        let ns = u64::try_from(elapsed.as_nanos()).unwrap_or(u64::MAX);
        self.cycle_count += 1;
        self.last_cycle_ns = ns;
        self.min_cycle_ns = self.min_cycle_ns.min(ns);
        self.max_cycle_ns = self.max_cycle_ns.max(ns);
        self.sum_cycle_ns += u128::from(ns);
        if elapsed > budget.period() {
            self.overruns += 1;
        }
    }

    /// Average work time [ns] (0 if no ticks).
    pub fn avg_cycle_ns(&self) -> u64 {
        if self.cycle_count == 0 {
            0
        } else {
            (self.sum_cycle_ns / u128::from(self.cycle_count)) as u64
        }
    }
}

impl Default for CycleStats {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remaining_never_negative() {
        let budget = TickBudget::from_millis(100);
        assert_eq!(budget.remaining(Duration::from_millis(30)), Duration::from_millis(70));
        assert_eq!(budget.remaining(Duration::from_millis(100)), Duration::ZERO);
        assert_eq!(budget.remaining(Duration::from_secs(5)), Duration::ZERO);
    }

    #[test]
    fn sleep_remainder_fills_period() {
        let budget = TickBudget::from_millis(20);
        let started = Instant::now();
        budget.sleep_remainder(started);
        assert!(started.elapsed() >= Duration::from_millis(20));
    }

    #[test]
    fn overrun_returns_immediately() {
        let budget = TickBudget::from_millis(1);
        let started = Instant::now() - Duration::from_millis(50);
        let before = Instant::now();
        let elapsed = budget.sleep_remainder(started);
        assert!(elapsed >= Duration::from_millis(50));
        assert!(before.elapsed() < Duration::from_millis(50));
    }

    #[test]
    fn stats_track_min_max_avg_overruns() {
        let budget = TickBudget::from_millis(10);
        let mut stats = CycleStats::new();
        assert_eq!(stats.avg_cycle_ns(), 0);

        stats.record(Duration::from_millis(2), &budget);
        stats.record(Duration::from_millis(4), &budget);
        stats.record(Duration::from_millis(12), &budget);

        assert_eq!(stats.cycle_count, 3);
        assert_eq!(stats.min_cycle_ns, 2_000_000);
        assert_eq!(stats.max_cycle_ns, 12_000_000);
        assert_eq!(stats.avg_cycle_ns(), 6_000_000);
        assert_eq!(stats.overruns, 1);
        assert_eq!(stats.last_cycle_ns, 12_000_000);
    }
}
