//! Shared-memory segment holding one `SystemState`.

use crate::error::{ResourceError, ResourceResult};
use crate::platform::IpcPlatform;
use hybrid_common::state::SystemState;
use memmap2::MmapMut;
use nix::errno::Errno;
use nix::sys::mman::shm_unlink;
use std::ptr::NonNull;
use tracing::{debug, warn};

/// Bytes reserved for the state record.
pub const SEGMENT_LEN: usize = core::mem::size_of::<SystemState>();

/// Shared-memory name, unlinked on drop when owned.
struct SegmentName {
    name: String,
    owner: bool,
}

impl Drop for SegmentName {
    fn drop(&mut self) {
        if !self.owner {
            return;
        }
        match shm_unlink(self.name.as_str()) {
            Ok(()) | Err(Errno::ENOENT) => debug!(name = %self.name, "segment unlinked"),
            Err(e) => warn!(name = %self.name, error = %e, "segment unlink failed"),
        }
    }
}

/// Mapped state segment.
///
/// Field order matters: the mapping is unmapped before the name is unlinked.
pub struct StateSegment {
    ptr: NonNull<SystemState>,
    _mmap: MmapMut,
    name: SegmentName,
}

// SAFETY: the pointer targets the mapping owned by this struct; callers
// serialize access through the state semaphore.
unsafe impl Send for StateSegment {}
unsafe impl Sync for StateSegment {}

impl StateSegment {
    /// Create the segment and write `initial` into it.
    ///
    /// A stale object of the same name is unlinked first. Any failure after
    /// the object exists unlinks it again, so no partial segment stays
    /// visible.
    pub fn create(
        platform: &dyn IpcPlatform,
        name: &str,
        initial: SystemState,
    ) -> ResourceResult<Self> {
        platform.unlink_shm(name);
        let file = platform
            .open_shm(name, true)
            .map_err(|source| ResourceError::SharedMemory { name: name.to_string(), source })?;
        let guard = SegmentName { name: name.to_string(), owner: true };

        platform
            .resize_shm(&file, SEGMENT_LEN)
            .map_err(|source| ResourceError::SharedMemorySize {
                name: name.to_string(),
                size: SEGMENT_LEN,
                source,
            })?;
        let mut mmap = platform
            .map_shm(&file, SEGMENT_LEN)
            .map_err(|source| ResourceError::MemoryMap { name: name.to_string(), source })?;
        let ptr = record_ptr(&mut mmap, name)?;

        // SAFETY: mapping is page aligned and SEGMENT_LEN long.
        unsafe { ptr.as_ptr().write(initial) };
        let segment = Self { ptr, _mmap: mmap, name: guard };
        debug!(name, "state segment created");
        Ok(segment)
    }

    /// Map a segment created by another process.
    ///
    /// Only the size is checked here. The header is part of the record and
    /// is validated by the caller under the state lock.
    pub fn attach(platform: &dyn IpcPlatform, name: &str) -> ResourceResult<Self> {
        let file = platform
            .open_shm(name, false)
            .map_err(|source| ResourceError::SharedMemory { name: name.to_string(), source })?;
        let len = file
            .metadata()
            .map_err(|source| ResourceError::MemoryMap { name: name.to_string(), source })?
            .len();
        if len < SEGMENT_LEN as u64 {
            return Err(ResourceError::LayoutMismatch { name: name.to_string() });
        }
        let mut mmap = platform
            .map_shm(&file, SEGMENT_LEN)
            .map_err(|source| ResourceError::MemoryMap { name: name.to_string(), source })?;
        let ptr = record_ptr(&mut mmap, name)?;
        let segment = Self {
            ptr,
            _mmap: mmap,
            name: SegmentName { name: name.to_string(), owner: false },
        };
        debug!(name, "state segment attached");
        Ok(segment)
    }

    pub fn name(&self) -> &str {
        &self.name.name
    }

    pub fn is_owner(&self) -> bool {
        self.name.owner
    }

    /// Pointer to the record. Dereference only while holding the state lock.
    pub(crate) fn state_ptr(&self) -> NonNull<SystemState> {
        self.ptr
    }
}

fn record_ptr(mmap: &mut MmapMut, name: &str) -> ResourceResult<NonNull<SystemState>> {
    let ptr = mmap.as_mut_ptr().cast::<SystemState>();
    if ptr.align_offset(core::mem::align_of::<SystemState>()) != 0 {
        return Err(ResourceError::LayoutMismatch { name: name.to_string() });
    }
    NonNull::new(ptr).ok_or_else(|| ResourceError::LayoutMismatch { name: name.to_string() })
}

impl std::fmt::Debug for StateSegment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StateSegment")
            .field("name", &self.name.name)
            .field("owner", &self.name.owner)
            .finish()
    }
}
