//! Setup sequences for the VMU and the engine modules.
//!
//! Steps run in a fixed order: shared memory, resize (create only), memory
//! map, semaphore, then channel(s). A failing step returns an error naming
//! it; everything acquired before it is released on the way out.

use crate::channel::MqChannel;
use crate::error::{ResourceError, ResourceResult};
use crate::platform::IpcPlatform;
use crate::store::SharedState;
use hybrid_common::config::IpcConfig;
use hybrid_common::protocol::ModuleKind;
use hybrid_common::state::SystemState;
use std::fmt;
use tracing::info;

/// Whether this process creates the resources or joins existing ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetupMode {
    Create,
    Attach,
}

/// Setup step, each with its own exit status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SetupStep {
    SharedMemory,
    Resize,
    MemoryMap,
    Semaphore,
    Channel,
}

impl SetupStep {
    pub const fn exit_code(self) -> i32 {
        match self {
            Self::SharedMemory => 2,
            Self::Resize => 3,
            Self::MemoryMap => 4,
            Self::Semaphore => 5,
            Self::Channel => 6,
        }
    }
}

impl fmt::Display for SetupStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::SharedMemory => "shared memory",
            Self::Resize => "shared memory resize",
            Self::MemoryMap => "memory map",
            Self::Semaphore => "semaphore",
            Self::Channel => "channel",
        })
    }
}

/// Queue name serving `kind`.
pub fn channel_name(ipc: &IpcConfig, kind: ModuleKind) -> &str {
    match kind {
        ModuleKind::Ev => &ipc.ev_queue,
        ModuleKind::Iec => &ipc.iec_queue,
    }
}

/// Resources held by an engine module.
#[derive(Debug)]
pub struct ModuleIpc {
    pub state: SharedState,
    pub channel: MqChannel,
}

impl ModuleIpc {
    pub fn initialize(
        platform: &dyn IpcPlatform,
        ipc: &IpcConfig,
        kind: ModuleKind,
        mode: SetupMode,
    ) -> ResourceResult<Self> {
        let state = match mode {
            SetupMode::Create => SharedState::create(platform, ipc, SystemState::new())?,
            SetupMode::Attach => SharedState::attach(platform, ipc)?,
        };
        let name = channel_name(ipc, kind);
        let channel = platform
            .open_channel(name, mode == SetupMode::Create)
            .map_err(|source| ResourceError::Channel { name: name.to_string(), source })?;
        info!(module = %kind, ?mode, shm = %ipc.shm_name, queue = name, "module resources ready");
        Ok(Self { state, channel })
    }
}

/// Resources held by the VMU, which creates all of them.
#[derive(Debug)]
pub struct VmuIpc {
    pub state: SharedState,
    pub ev: MqChannel,
    pub iec: MqChannel,
}

impl VmuIpc {
    pub fn initialize(
        platform: &dyn IpcPlatform,
        ipc: &IpcConfig,
        initial: SystemState,
    ) -> ResourceResult<Self> {
        let state = SharedState::create(platform, ipc, initial)?;
        let ev = platform
            .open_channel(&ipc.ev_queue, true)
            .map_err(|source| ResourceError::Channel { name: ipc.ev_queue.clone(), source })?;
        let iec = platform
            .open_channel(&ipc.iec_queue, true)
            .map_err(|source| ResourceError::Channel { name: ipc.iec_queue.clone(), source })?;
        info!(shm = %ipc.shm_name, ev = %ipc.ev_queue, iec = %ipc.iec_queue, "VMU resources ready");
        Ok(Self { state, ev, iec })
    }
}
