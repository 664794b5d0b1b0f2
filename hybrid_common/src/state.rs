//! Shared system-state record.
//!
//! `SystemState` is the single record placed in the shared-memory segment and
//! mutated by all three processes under the state semaphore. It is
//! `#[repr(C, align(64))]` with fixed-size numeric fields only, so the same
//! layout is valid in every process mapping it. Zero bytes are a valid value
//! for every field except the header, which `SystemState::new` stamps.
//!
//! Flags are stored as `u8` (0 = false, 1 = true) and exposed through `bool`
//! accessors; a stray byte from another process can never produce an invalid
//! `bool`.

use static_assertions::const_assert_eq;

/// Magic bytes identifying an initialized state segment: `"HYBSTAT\0"`.
pub const STATE_MAGIC: [u8; 8] = *b"HYBSTAT\0";

/// Vehicle-wide physical quantities shared by VMU, EV and IEC.
#[derive(Debug, Clone, Copy, PartialEq)]
#[repr(C, align(64))]
pub struct SystemState {
    magic: [u8; 8],
    version_hash: u32,

    /// Current gear index (0 = neutral).
    pub gear: u8,
    ev_active: u8,
    iec_active: u8,
    accelerator: u8,

    /// VMU tick counter, incremented once per orchestrator tick.
    pub tick: u64,

    /// Vehicle speed [km/h].
    pub velocity: f64,
    /// Electric motor speed [rpm].
    pub rpm_ev: f64,
    /// Combustion engine speed [rpm].
    pub rpm_iec: f64,
    /// Battery state of charge [%], within `[0, 100]`.
    pub battery_level: f64,
    /// Fuel in tank [l], within `[0, max_fuel]`.
    pub fuel_level: f64,
    /// Drivetrain blend, 0 = pure electric, 1 = pure combustion.
    pub transition_factor: f64,
    /// Power fraction currently commanded to the EV module.
    pub ev_power: f64,
    /// Power fraction currently commanded to the IEC module.
    pub iec_power: f64,
}

const_assert_eq!(core::mem::size_of::<SystemState>(), 128);
const_assert_eq!(core::mem::align_of::<SystemState>(), 64);

impl SystemState {
    /// Create a fresh record: header stamped, every quantity zero.
    pub const fn new() -> Self {
        Self {
            magic: STATE_MAGIC,
            version_hash: struct_version_hash::<SystemState>(),
            gear: 0,
            ev_active: 0,
            iec_active: 0,
            accelerator: 0,
            tick: 0,
            velocity: 0.0,
            rpm_ev: 0.0,
            rpm_iec: 0.0,
            battery_level: 0.0,
            fuel_level: 0.0,
            transition_factor: 0.0,
            ev_power: 0.0,
            iec_power: 0.0,
        }
    }

    /// Validate magic bytes and layout hash.
    #[inline]
    pub const fn is_valid(&self) -> bool {
        let m = &self.magic;
        m[0] == b'H' && m[1] == b'Y' && m[2] == b'B' && m[3] == b'S'
            && m[4] == b'T' && m[5] == b'A' && m[6] == b'T' && m[7] == 0
            && self.version_hash == struct_version_hash::<SystemState>()
    }

    /// Whether the electric drivetrain reports itself running.
    #[inline]
    pub const fn ev_active(&self) -> bool {
        self.ev_active != 0
    }

    /// Set the electric drivetrain running flag.
    #[inline]
    pub fn set_ev_active(&mut self, active: bool) {
        self.ev_active = active as u8;
    }

    /// Whether the combustion drivetrain reports itself running.
    #[inline]
    pub const fn iec_active(&self) -> bool {
        self.iec_active != 0
    }

    /// Set the combustion drivetrain running flag.
    #[inline]
    pub fn set_iec_active(&mut self, active: bool) {
        self.iec_active = active as u8;
    }

    /// Driver accelerator input.
    #[inline]
    pub const fn accelerator(&self) -> bool {
        self.accelerator != 0
    }

    /// Set the driver accelerator input.
    #[inline]
    pub fn set_accelerator(&mut self, engaged: bool) {
        self.accelerator = engaged as u8;
    }
}

impl Default for SystemState {
    fn default() -> Self {
        Self::new()
    }
}

/// Compile-time version hash for layout compatibility detection.
///
/// Computed from `size_of::<T>()` and `align_of::<T>()`. A process built
/// against a different layout refuses to attach.
///
/// **Known limitation**: does not detect field reordering within the same
/// total size/alignment.
pub const fn struct_version_hash<T>() -> u32 {
    let size = core::mem::size_of::<T>() as u32;
    let align = core::mem::align_of::<T>() as u32;
    size.wrapping_mul(0x9E3779B9) ^ align.wrapping_mul(0x517CC1B7)
}
