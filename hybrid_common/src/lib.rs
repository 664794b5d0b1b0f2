//! Hybrid Common Library
//!
//! This crate provides the types shared by the three hybrid-vehicle processes
//! (VMU, EV module, IEC module): the shared system-state layout, the
//! command/status wire protocol, configuration loading, lifecycle flags and
//! tick pacing.
//!
//! # Module Structure
//!
//! - [`config`] - `SystemConfig` and the TOML `ConfigLoader`
//! - [`consts`] - Default resource names, bounds and timing constants
//! - [`cycle`] - Tick budget and cycle statistics
//! - [`lifecycle`] - Signal-driven `running` / `paused` flags
//! - [`logging`] - Tracing subscriber setup shared by the binaries
//! - [`protocol`] - Command / status records exchanged over the channels
//! - [`state`] - `SystemState`, the record living in shared memory
//! - [`prelude`] - Common re-exports for convenience
//!
//! # Usage
//!
//! ```rust
//! use hybrid_common::prelude::*;
//!
//! let config = SystemConfig::default();
//! assert!(config.validate().is_ok());
//! ```

pub mod config;
pub mod consts;
pub mod cycle;
pub mod lifecycle;
pub mod logging;
pub mod prelude;
pub mod protocol;
pub mod state;
