//! Prelude module for common re-exports.
//!
//! ```rust
//! use hybrid_common::prelude::*;
//! ```

// ─── Configuration ──────────────────────────────────────────────────
pub use crate::config::{
    ConfigError, ConfigLoader, EvConfig, IecConfig, IpcConfig, LogLevel, SharedConfig,
    SystemConfig, VmuConfig,
};

// ─── Lifecycle & pacing ─────────────────────────────────────────────
pub use crate::cycle::{CycleStats, TickBudget};
pub use crate::lifecycle::{LIFECYCLE, Lifecycle, install_signal_handlers};

// ─── Protocol ───────────────────────────────────────────────────────
pub use crate::protocol::{
    Command, Diagnostic, EngineState, Message, ModuleKind, ProtocolError, Reply, Request,
    diagnostic,
};

// ─── Shared state ───────────────────────────────────────────────────
pub use crate::state::SystemState;
