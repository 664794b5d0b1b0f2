//! System-wide constants for the hybrid workspace.
//!
//! Single source of truth for bounds, default resource names and timing.
//! Everything tunable is mirrored in [`crate::config`]; these are the defaults.

/// Default POSIX shared-memory name holding `SystemState`.
pub const DEFAULT_SHM_NAME: &str = "/hybrid_system_state";

/// Default POSIX named semaphore guarding `SystemState`.
pub const DEFAULT_SEMAPHORE_NAME: &str = "/hybrid_state_lock";

/// Default message queue between VMU and the EV module.
pub const DEFAULT_EV_QUEUE: &str = "/hybrid_ev_commands";

/// Default message queue between VMU and the IEC module.
pub const DEFAULT_IEC_QUEUE: &str = "/hybrid_iec_commands";

/// Records a channel holds at once (single-slot alternation).
pub const CHANNEL_DEPTH: usize = 1;

/// Default VMU tick period in milliseconds.
pub const DEFAULT_TICK_MS: u64 = 2500;

/// Default engine-module poll period in milliseconds.
pub const DEFAULT_MODULE_POLL_MS: u64 = 20;

/// Sleep while a process is paused.
pub const PAUSE_SLEEP_MS: u64 = 1000;

/// Battery state-of-charge bounds [%].
pub const BATTERY_MIN: f64 = 0.0;
/// Upper battery bound [%].
pub const BATTERY_MAX: f64 = 100.0;

/// Default fuel tank capacity [l].
pub const DEFAULT_MAX_FUEL: f64 = 45.0;

/// Capacity of the diagnostic text carried on a reply.
pub const DIAGNOSTIC_CAPACITY: usize = 64;

/// Fixed size of one encoded command/status record on the wire.
pub const WIRE_RECORD_SIZE: usize = 128;
