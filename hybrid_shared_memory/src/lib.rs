//! # Hybrid Shared Memory
//!
//! POSIX resources shared by the VMU and the two engine modules:
//!
//! - a shared-memory segment holding one [`SystemState`](hybrid_common::state::SystemState)
//! - a named semaphore (initial count 1) serializing every access to it
//! - one message queue per module carrying the command/status protocol
//!
//! ```text
//!            ┌──────────── /hybrid_system_state ────────────┐
//!            │ SystemState  (guarded by /hybrid_state_lock)  │
//!            └───────▲──────────────▲──────────────▲─────────┘
//!                    │              │              │
//!               ┌────┴───┐     ┌────┴───┐     ┌────┴───┐
//!               │   EV   │◄───►│  VMU   │◄───►│  IEC   │
//!               └────────┘ mq  └────────┘  mq └────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust,no_run
//! use hybrid_common::config::IpcConfig;
//! use hybrid_common::state::SystemState;
//! use hybrid_shared_memory::{PosixIpc, SharedState};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let ipc = IpcConfig::default();
//! let state = SharedState::create(&PosixIpc, &ipc, SystemState::new())?;
//! {
//!     let mut guard = state.acquire()?;
//!     guard.velocity = 42.0;
//! } // semaphore posted here
//! # Ok(())
//! # }
//! ```

pub mod channel;
pub mod error;
pub mod platform;
pub mod segment;
pub mod semaphore;
pub mod setup;
pub mod store;

pub use channel::{Channel, LocalChannel, MqChannel};
pub use error::{ChannelError, ResourceError, ResourceResult};
pub use platform::{IpcPlatform, PosixIpc};
pub use semaphore::NamedSemaphore;
pub use setup::{ModuleIpc, SetupMode, SetupStep, VmuIpc, channel_name};
pub use store::{SharedState, StateGuard};
