//! Command / status records exchanged between the VMU and an engine module.
//!
//! Both directions travel over the same channel in the same fixed-size
//! record; the `to_vmu` flag tells a request from a reply. In memory the
//! two legs are a typed [`Message`], and the flag only exists on the wire.
//!
//! # Wire layout
//!
//! A [`WireRecord`] is `bincode`-encoded (fixed-width integers, little
//! endian) and zero-padded to [`WIRE_RECORD_SIZE`] bytes. Decoding rejects
//! non-finite floats and unknown engine-state tags.

use crate::consts::{DIAGNOSTIC_CAPACITY, WIRE_RECORD_SIZE};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Bounded human-readable status attached to a reply.
pub type Diagnostic = heapless::String<DIAGNOSTIC_CAPACITY>;

/// Build a [`Diagnostic`] from `text`, truncating at the capacity.
pub fn diagnostic(text: &str) -> Diagnostic {
    let mut out = Diagnostic::new();
    for ch in text.chars() {
        if out.push(ch).is_err() {
            break;
        }
    }
    out
}

/// Protocol encode/decode failures.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ProtocolError {
    /// Serialization failed.
    #[error("failed to encode record: {0}")]
    Encode(String),

    /// Encoded record does not fit the fixed wire size.
    #[error("encoded record is {len} bytes, limit is {limit}")]
    Oversize { len: usize, limit: usize },

    /// Bytes do not form a record.
    #[error("failed to decode record: {0}")]
    Decode(String),

    /// A numeric field carried NaN or infinity.
    #[error("field `{field}` is not finite")]
    NonFinite { field: &'static str },

    /// Reply carried an engine-state tag outside the known set.
    #[error("unknown engine state tag {0}")]
    UnknownState(u8),
}

/// Command carried by a request. Unknown tags survive decoding as
/// [`Command::Unknown`] and are handled as no-ops.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Ignite / engage the drivetrain.
    Start,
    /// Disengage; RPM coasts down.
    Stop,
    /// Terminate the module loop.
    End,
    /// Update the commanded power fraction.
    SetPower,
    /// Tag outside the defined set.
    Unknown(u32),
}

impl Command {
    /// Wire tag.
    pub const fn tag(self) -> u32 {
        match self {
            Self::Start => 0,
            Self::Stop => 1,
            Self::End => 2,
            Self::SetPower => 3,
            Self::Unknown(tag) => tag,
        }
    }

    /// Parse a wire tag. Never fails.
    pub const fn from_tag(tag: u32) -> Self {
        match tag {
            0 => Self::Start,
            1 => Self::Stop,
            2 => Self::End,
            3 => Self::SetPower,
            other => Self::Unknown(other),
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Start => f.write_str("START"),
            Self::Stop => f.write_str("STOP"),
            Self::End => f.write_str("END"),
            Self::SetPower => f.write_str("SET_POWER"),
            Self::Unknown(tag) => write!(f, "UNKNOWN({tag})"),
        }
    }
}

/// Engine module state machine position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum EngineState {
    /// Not running, RPM exactly 0.
    #[default]
    Idle = 0,
    /// Producing RPM and consuming energy.
    Active = 1,
    /// Coasting down toward Idle after STOP or depletion.
    Stopping = 2,
    /// END processed; terminal.
    Shutdown = 3,
}

impl EngineState {
    /// Parse a wire tag.
    pub const fn from_u8(tag: u8) -> Option<Self> {
        match tag {
            0 => Some(Self::Idle),
            1 => Some(Self::Active),
            2 => Some(Self::Stopping),
            3 => Some(Self::Shutdown),
            _ => None,
        }
    }
}

/// Which drivetrain a module simulates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModuleKind {
    /// Electric motor + battery.
    Ev,
    /// Combustion engine + fuel tank + gearbox.
    Iec,
}

impl ModuleKind {
    /// Short lowercase label used in logs.
    pub const fn label(self) -> &'static str {
        match self {
            Self::Ev => "ev",
            Self::Iec => "iec",
        }
    }
}

impl fmt::Display for ModuleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// VMU -> module leg.
///
/// Carries the driver inputs so a module never reads `SystemState` to
/// decide anything.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Request {
    pub command: Command,
    /// Commanded power fraction; meaningful for START and SET_POWER.
    pub power_level: f64,
    /// Vehicle speed at send time [km/h].
    pub velocity: f64,
    /// Driver accelerator input at send time.
    pub accelerator: bool,
}

impl Request {
    /// Request with zero power and no driver inputs.
    pub const fn new(command: Command) -> Self {
        Self {
            command,
            power_level: 0.0,
            velocity: 0.0,
            accelerator: false,
        }
    }

    /// Set the commanded power fraction.
    pub const fn with_power(mut self, power_level: f64) -> Self {
        self.power_level = power_level;
        self
    }

    /// Set the driver inputs.
    pub const fn with_inputs(mut self, velocity: f64, accelerator: bool) -> Self {
        self.velocity = velocity;
        self.accelerator = accelerator;
        self
    }
}

/// Module -> VMU leg.
#[derive(Debug, Clone, PartialEq)]
pub struct Reply {
    /// Command this reply answers.
    pub command: Command,
    pub state: EngineState,
    pub rpm: f64,
    /// Battery [%] for EV, fuel [l] for IEC.
    pub energy_level: f64,
    /// Current gear (always 0 for EV).
    pub gear: u8,
    /// Power fraction the module is applying.
    pub power_level: f64,
    pub diagnostic: Diagnostic,
}

/// One record in flight on a channel.
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    Request(Request),
    Reply(Reply),
}

impl Message {
    /// Whether this record travels toward the VMU.
    #[inline]
    pub const fn is_reply(&self) -> bool {
        matches!(self, Self::Reply(_))
    }

    /// Encode to a fixed-size zero-padded record.
    pub fn encode(&self) -> Result<[u8; WIRE_RECORD_SIZE], ProtocolError> {
        let record = WireRecord::from(self);
        let bytes = bincode::serialize(&record).map_err(|e| ProtocolError::Encode(e.to_string()))?;
        if bytes.len() > WIRE_RECORD_SIZE {
            return Err(ProtocolError::Oversize {
                len: bytes.len(),
                limit: WIRE_RECORD_SIZE,
            });
        }
        let mut out = [0u8; WIRE_RECORD_SIZE];
        out[..bytes.len()].copy_from_slice(&bytes);
        Ok(out)
    }

    /// Decode a record produced by [`Message::encode`].
    pub fn decode(bytes: &[u8]) -> Result<Self, ProtocolError> {
        let record: WireRecord =
            bincode::deserialize(bytes).map_err(|e| ProtocolError::Decode(e.to_string()))?;
        record.into_message()
    }
}

/// Flat wire shape shared by both legs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WireRecord {
    pub command: u32,
    pub to_vmu: bool,
    pub power_level: f64,
    pub velocity: f64,
    pub accelerator: bool,
    pub state: u8,
    pub rpm: f64,
    pub energy_level: f64,
    pub gear: u8,
    pub diagnostic: Diagnostic,
}

impl From<&Message> for WireRecord {
    fn from(message: &Message) -> Self {
        match message {
            Message::Request(r) => Self {
                command: r.command.tag(),
                to_vmu: false,
                power_level: r.power_level,
                velocity: r.velocity,
                accelerator: r.accelerator,
                state: 0,
                rpm: 0.0,
                energy_level: 0.0,
                gear: 0,
                diagnostic: Diagnostic::new(),
            },
            Message::Reply(r) => Self {
                command: r.command.tag(),
                to_vmu: true,
                power_level: r.power_level,
                velocity: 0.0,
                accelerator: false,
                state: r.state as u8,
                rpm: r.rpm,
                energy_level: r.energy_level,
                gear: r.gear,
                diagnostic: r.diagnostic.clone(),
            },
        }
    }
}

impl WireRecord {
    fn into_message(self) -> Result<Message, ProtocolError> {
        finite("power_level", self.power_level)?;
        let command = Command::from_tag(self.command);
        if !self.to_vmu {
            finite("velocity", self.velocity)?;
            return Ok(Message::Request(Request {
                command,
                power_level: self.power_level,
                velocity: self.velocity,
                accelerator: self.accelerator,
            }));
        }
        finite("rpm", self.rpm)?;
        finite("energy_level", self.energy_level)?;
        let state = EngineState::from_u8(self.state).ok_or(ProtocolError::UnknownState(self.state))?;
        Ok(Message::Reply(Reply {
            command,
            state,
            rpm: self.rpm,
            energy_level: self.energy_level,
            gear: self.gear,
            power_level: self.power_level,
            diagnostic: self.diagnostic,
        }))
    }
}

fn finite(field: &'static str, value: f64) -> Result<(), ProtocolError> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(ProtocolError::NonFinite { field })
    }
}
