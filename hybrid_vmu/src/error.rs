//! VMU process errors.

use hybrid_common::config::ConfigError;
use hybrid_shared_memory::{ChannelError, ResourceError};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum VmuError {
    #[error("configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("signal handler installation failed: {0}")]
    Signal(#[from] nix::Error),

    #[error(transparent)]
    Resource(#[from] ResourceError),

    #[error("{module} channel: {source}")]
    Channel {
        module: &'static str,
        #[source]
        source: ChannelError,
    },
}

impl VmuError {
    /// Process exit status.
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::Resource(e) => e.exit_code(),
            Self::Config(_) | Self::Signal(_) | Self::Channel { .. } => 1,
        }
    }
}
