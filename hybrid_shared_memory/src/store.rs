//! Scoped-lock access to the shared `SystemState`.
//!
//! The record is reachable only through [`SharedState::acquire`], which
//! waits on the named semaphore and hands out a [`StateGuard`]. The guard
//! derefs to `SystemState` and posts the semaphore exactly once when
//! dropped, on every exit path.

use crate::error::{ResourceError, ResourceResult};
use crate::platform::IpcPlatform;
use crate::segment::StateSegment;
use crate::semaphore::NamedSemaphore;
use hybrid_common::config::IpcConfig;
use hybrid_common::state::SystemState;
use std::ops::{Deref, DerefMut};
use std::ptr::NonNull;
use tracing::{debug, error};

/// Handle to the cross-process state record and its lock.
#[derive(Debug)]
pub struct SharedState {
    inner: Option<Inner>,
}

#[derive(Debug)]
struct Inner {
    // Drop order: semaphore handle first, then segment.
    semaphore: NamedSemaphore,
    segment: StateSegment,
    semaphore_name: String,
}

impl SharedState {
    /// Create segment and semaphore, seeding the record with `initial`.
    ///
    /// On semaphore failure the freshly created segment is unmapped and
    /// unlinked before the error is returned.
    pub fn create(
        platform: &dyn IpcPlatform,
        ipc: &IpcConfig,
        initial: SystemState,
    ) -> ResourceResult<Self> {
        let segment = StateSegment::create(platform, &ipc.shm_name, initial)?;
        let semaphore = platform
            .open_semaphore(&ipc.semaphore_name, true)
            .map_err(|source| ResourceError::Semaphore {
                name: ipc.semaphore_name.clone(),
                source,
            })?;
        Ok(Self::from_parts(segment, semaphore, &ipc.semaphore_name))
    }

    /// Join a state created by another process.
    ///
    /// The record header is checked under the lock, so a writer holding the
    /// lock delays the attach instead of racing it.
    pub fn attach(platform: &dyn IpcPlatform, ipc: &IpcConfig) -> ResourceResult<Self> {
        let segment = StateSegment::attach(platform, &ipc.shm_name)?;
        let semaphore = platform
            .open_semaphore(&ipc.semaphore_name, false)
            .map_err(|source| ResourceError::Semaphore {
                name: ipc.semaphore_name.clone(),
                source,
            })?;
        let state = Self::from_parts(segment, semaphore, &ipc.semaphore_name);
        if !state.snapshot()?.is_valid() {
            return Err(ResourceError::LayoutMismatch { name: ipc.shm_name.clone() });
        }
        Ok(state)
    }

    fn from_parts(segment: StateSegment, semaphore: NamedSemaphore, semaphore_name: &str) -> Self {
        Self {
            inner: Some(Inner {
                semaphore,
                segment,
                semaphore_name: semaphore_name.to_string(),
            }),
        }
    }

    /// Block until the lock is held and return a guard over the record.
    ///
    /// Not re-entrant: acquiring twice on one thread without dropping the
    /// first guard blocks forever.
    pub fn acquire(&self) -> ResourceResult<StateGuard<'_>> {
        let inner = self.inner.as_ref().ok_or(ResourceError::NotInitialized)?;
        inner
            .semaphore
            .wait()
            .map_err(|source| ResourceError::Lock {
                name: inner.semaphore_name.clone(),
                source,
            })?;
        Ok(StateGuard {
            state: inner.segment.state_ptr(),
            semaphore: &inner.semaphore,
        })
    }

    /// Copy of the record, taken under the lock.
    pub fn snapshot(&self) -> ResourceResult<SystemState> {
        Ok(*self.acquire()?)
    }

    pub fn is_initialized(&self) -> bool {
        self.inner.is_some()
    }

    /// Whether this handle created (and will unlink) the resources.
    pub fn is_owner(&self) -> bool {
        self.inner.as_ref().is_some_and(|i| i.segment.is_owner())
    }

    /// Unmap and close; the creator also unlinks both names. Safe to repeat.
    pub fn destroy(&mut self) {
        if let Some(inner) = self.inner.take() {
            debug!(shm = inner.segment.name(), "shared state released");
            drop(inner);
        }
    }
}

impl Drop for SharedState {
    fn drop(&mut self) {
        self.destroy();
    }
}

/// Exclusive access to the record while the semaphore is held.
pub struct StateGuard<'a> {
    state: NonNull<SystemState>,
    semaphore: &'a NamedSemaphore,
}

impl Deref for StateGuard<'_> {
    type Target = SystemState;

    fn deref(&self) -> &SystemState {
        // SAFETY: the semaphore is held for the guard's lifetime.
        unsafe { self.state.as_ref() }
    }
}

impl DerefMut for StateGuard<'_> {
    fn deref_mut(&mut self) -> &mut SystemState {
        // SAFETY: the semaphore is held for the guard's lifetime.
        unsafe { self.state.as_mut() }
    }
}

impl Drop for StateGuard<'_> {
    fn drop(&mut self) {
        if let Err(e) = self.semaphore.post() {
            error!(error = %e, "state semaphore post failed");
        }
    }
}
