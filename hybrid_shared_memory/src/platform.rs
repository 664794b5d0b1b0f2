//! OS seam for every setup step.
//!
//! Production code uses [`PosixIpc`]. Tests substitute an implementation
//! that fails a chosen step, which checks that each failure is reported
//! distinctly and releases whatever was acquired before it.

use crate::channel::MqChannel;
use crate::error::ChannelError;
use crate::semaphore::NamedSemaphore;
use memmap2::{MmapMut, MmapOptions};
use nix::errno::Errno;
use nix::fcntl::OFlag;
use nix::sys::mman::{shm_open, shm_unlink};
use nix::sys::stat::Mode;
use std::fs::File;
use std::io;

/// Primitive operations behind the shared state and the channels.
pub trait IpcPlatform {
    /// Open a shared-memory object. `create` uses `O_CREAT | O_EXCL`.
    fn open_shm(&self, name: &str, create: bool) -> Result<File, Errno>;

    /// Set the object's length.
    fn resize_shm(&self, file: &File, len: usize) -> io::Result<()>;

    /// Map `len` bytes read-write.
    fn map_shm(&self, file: &File, len: usize) -> io::Result<MmapMut>;

    /// Remove a shared-memory name. Missing names are not an error.
    fn unlink_shm(&self, name: &str);

    /// Open (or create with count 1) the state semaphore.
    fn open_semaphore(&self, name: &str, create: bool) -> io::Result<NamedSemaphore>;

    /// Open (or create) a command channel.
    fn open_channel(&self, name: &str, create: bool) -> Result<MqChannel, ChannelError>;
}

/// Real POSIX implementation.
#[derive(Debug, Clone, Copy, Default)]
pub struct PosixIpc;

impl IpcPlatform for PosixIpc {
    fn open_shm(&self, name: &str, create: bool) -> Result<File, Errno> {
        let flags = if create {
            OFlag::O_CREAT | OFlag::O_EXCL | OFlag::O_RDWR
        } else {
            OFlag::O_RDWR
        };
        let fd = shm_open(name, flags, Mode::S_IRUSR | Mode::S_IWUSR)?;
        Ok(File::from(fd))
    }

    fn resize_shm(&self, file: &File, len: usize) -> io::Result<()> {
        file.set_len(len as u64)
    }

    fn map_shm(&self, file: &File, len: usize) -> io::Result<MmapMut> {
        // SAFETY: the object is only accessed through the state semaphore.
        unsafe { MmapOptions::new().len(len).map_mut(file) }
    }

    fn unlink_shm(&self, name: &str) {
        match shm_unlink(name) {
            Ok(()) | Err(Errno::ENOENT) => {}
            Err(e) => tracing::warn!(name, error = %e, "shm_unlink failed"),
        }
    }

    fn open_semaphore(&self, name: &str, create: bool) -> io::Result<NamedSemaphore> {
        if create {
            NamedSemaphore::create(name)
        } else {
            NamedSemaphore::open(name)
        }
    }

    fn open_channel(&self, name: &str, create: bool) -> Result<MqChannel, ChannelError> {
        if create {
            MqChannel::create(name)
        } else {
            MqChannel::open(name)
        }
    }
}
