//! Error types for shared resources.

use crate::setup::SetupStep;
use hybrid_common::protocol::ProtocolError;
use nix::errno::Errno;
use thiserror::Error;

/// Setup-time and access failures of the shared state.
#[derive(Error, Debug)]
pub enum ResourceError {
    /// Shared-memory object could not be created or opened.
    #[error("shared memory open failed for {name}: {source}")]
    SharedMemory {
        name: String,
        #[source]
        source: Errno,
    },

    /// Shared-memory object could not be sized.
    #[error("shared memory resize to {size} bytes failed for {name}: {source}")]
    SharedMemorySize {
        name: String,
        size: usize,
        #[source]
        source: std::io::Error,
    },

    /// Mapping the object into the address space failed.
    #[error("memory map failed for {name}: {source}")]
    MemoryMap {
        name: String,
        #[source]
        source: std::io::Error,
    },

    /// Mapped object is too small or carries a foreign header.
    #[error("shared memory {name} does not hold a compatible state record")]
    LayoutMismatch { name: String },

    /// Named semaphore could not be created or opened.
    #[error("semaphore {name} failed: {source}")]
    Semaphore {
        name: String,
        #[source]
        source: std::io::Error,
    },

    /// Waiting on the semaphore failed after setup.
    #[error("lock on {name} failed: {source}")]
    Lock {
        name: String,
        #[source]
        source: std::io::Error,
    },

    /// Command channel could not be opened.
    #[error("channel {name} failed: {source}")]
    Channel {
        name: String,
        #[source]
        source: ChannelError,
    },

    /// State used after `destroy`.
    #[error("shared state is not initialized")]
    NotInitialized,
}

impl ResourceError {
    /// Setup step this error belongs to, if any.
    pub const fn step(&self) -> Option<SetupStep> {
        match self {
            Self::SharedMemory { .. } => Some(SetupStep::SharedMemory),
            Self::SharedMemorySize { .. } => Some(SetupStep::Resize),
            Self::MemoryMap { .. } | Self::LayoutMismatch { .. } => Some(SetupStep::MemoryMap),
            Self::Semaphore { .. } => Some(SetupStep::Semaphore),
            Self::Channel { .. } => Some(SetupStep::Channel),
            Self::Lock { .. } | Self::NotInitialized => None,
        }
    }

    /// Process exit status for this error.
    pub const fn exit_code(&self) -> i32 {
        match self.step() {
            Some(step) => step.exit_code(),
            None => 1,
        }
    }
}

/// Command channel failures.
#[derive(Error, Debug)]
pub enum ChannelError {
    #[error("channel {name} already exists")]
    AlreadyExists { name: String },

    #[error("permission denied on channel {name}")]
    PermissionDenied { name: String },

    /// Queue count, message size or depth exceeds a system limit.
    #[error("system limit reached opening channel {name}: {source}")]
    ResourceLimit {
        name: String,
        #[source]
        source: Errno,
    },

    #[error("channel {name} does not exist")]
    NotFound { name: String },

    /// Channel already holds a record; the caller must not block.
    #[error("channel is full")]
    Full,

    /// Channel used after `close`.
    #[error("channel is closed")]
    Closed,

    #[error("channel system call failed: {0}")]
    Os(#[from] Errno),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}

impl ChannelError {
    /// Classify an `errno` from opening `name`.
    pub fn from_open(name: &str, errno: Errno) -> Self {
        let name = name.to_string();
        match errno {
            Errno::EEXIST => Self::AlreadyExists { name },
            Errno::EACCES | Errno::EPERM => Self::PermissionDenied { name },
            Errno::ENOENT => Self::NotFound { name },
            Errno::EMFILE | Errno::ENFILE | Errno::ENOSPC | Errno::ENOMEM | Errno::EINVAL => {
                Self::ResourceLimit { name, source: errno }
            }
            other => Self::Os(other),
        }
    }
}

/// Result type for shared-resource operations.
pub type ResourceResult<T> = Result<T, ResourceError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn each_setup_failure_has_distinct_exit_code() {
        let io = || std::io::Error::from_raw_os_error(libc::EACCES);
        let errors = [
            ResourceError::SharedMemory { name: "/a".into(), source: Errno::EACCES },
            ResourceError::SharedMemorySize { name: "/a".into(), size: 128, source: io() },
            ResourceError::MemoryMap { name: "/a".into(), source: io() },
            ResourceError::Semaphore { name: "/a".into(), source: io() },
            ResourceError::Channel { name: "/a".into(), source: ChannelError::Full },
        ];
        let mut codes: Vec<i32> = errors.iter().map(ResourceError::exit_code).collect();
        assert!(codes.iter().all(|&c| c > 1));
        codes.dedup();
        assert_eq!(codes.len(), errors.len());
    }

    #[test]
    fn layout_mismatch_counts_as_map_failure() {
        let err = ResourceError::LayoutMismatch { name: "/a".into() };
        assert_eq!(err.step(), Some(SetupStep::MemoryMap));
        assert_eq!(ResourceError::NotInitialized.exit_code(), 1);
    }

    #[test]
    fn runtime_lock_failure_is_not_a_setup_failure() {
        let io = || std::io::Error::from_raw_os_error(libc::EINVAL);
        let lock = ResourceError::Lock { name: "/s".into(), source: io() };
        assert_eq!(lock.step(), None);
        assert_eq!(lock.exit_code(), 1);

        let open = ResourceError::Semaphore { name: "/s".into(), source: io() };
        assert_eq!(open.exit_code(), SetupStep::Semaphore.exit_code());
    }

    #[test]
    fn open_errno_classification() {
        assert!(matches!(ChannelError::from_open("/q", Errno::EEXIST), ChannelError::AlreadyExists { .. }));
        assert!(matches!(ChannelError::from_open("/q", Errno::EACCES), ChannelError::PermissionDenied { .. }));
        assert!(matches!(ChannelError::from_open("/q", Errno::EMFILE), ChannelError::ResourceLimit { .. }));
        assert!(matches!(ChannelError::from_open("/q", Errno::ENOENT), ChannelError::NotFound { .. }));
        assert!(matches!(ChannelError::from_open("/q", Errno::EIO), ChannelError::Os(Errno::EIO)));
    }
}
