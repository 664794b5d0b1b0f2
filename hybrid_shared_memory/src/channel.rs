//! Command channels between the VMU and one engine module.
//!
//! One channel per module carries both legs of the protocol, so it must
//! never hold more than one record: the VMU sends a request only after the
//! previous reply was consumed, and a module replies exactly once per
//! request. Every operation is non-blocking; a full channel is reported as
//! [`ChannelError::Full`] and an empty one as `Ok(None)`.

use crate::error::ChannelError;
use hybrid_common::consts::{CHANNEL_DEPTH, WIRE_RECORD_SIZE};
use hybrid_common::protocol::Message;
use nix::errno::Errno;
use nix::mqueue::{
    MQ_OFlag, MqAttr, MqdT, mq_attr_member_t, mq_close, mq_open, mq_receive, mq_send, mq_unlink,
};
use nix::sys::stat::Mode;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use tracing::{debug, warn};

/// Bidirectional single-slot record channel.
pub trait Channel {
    /// Enqueue `message` without blocking.
    fn send(&self, message: &Message) -> Result<(), ChannelError>;

    /// Dequeue one record if present.
    fn receive(&self) -> Result<Option<Message>, ChannelError>;

    /// Release the channel. Safe to repeat.
    fn close(&mut self);
}

/// POSIX message queue with depth [`CHANNEL_DEPTH`] and message size
/// [`WIRE_RECORD_SIZE`].
pub struct MqChannel {
    mqd: Option<MqdT>,
    name: String,
    owner: bool,
}

impl MqChannel {
    /// Create the queue, replacing a stale queue of the same name.
    pub fn create(name: &str) -> Result<Self, ChannelError> {
        if mq_unlink(name).is_ok() {
            debug!(name, "removed stale queue");
        }
        let attr = MqAttr::new(
            0,
            CHANNEL_DEPTH as mq_attr_member_t,
            WIRE_RECORD_SIZE as mq_attr_member_t,
            0,
        );
        let flags = MQ_OFlag::O_CREAT | MQ_OFlag::O_EXCL | MQ_OFlag::O_RDWR | MQ_OFlag::O_NONBLOCK;
        let mqd = mq_open(name, flags, Mode::S_IRUSR | Mode::S_IWUSR, Some(&attr))
            .map_err(|e| ChannelError::from_open(name, e))?;
        debug!(name, "queue created");
        Ok(Self { mqd: Some(mqd), name: name.to_string(), owner: true })
    }

    /// Open a queue created by another process.
    pub fn open(name: &str) -> Result<Self, ChannelError> {
        let flags = MQ_OFlag::O_RDWR | MQ_OFlag::O_NONBLOCK;
        let mqd = mq_open(name, flags, Mode::empty(), None)
            .map_err(|e| ChannelError::from_open(name, e))?;
        debug!(name, "queue opened");
        Ok(Self { mqd: Some(mqd), name: name.to_string(), owner: false })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_open(&self) -> bool {
        self.mqd.is_some()
    }

    fn mqd(&self) -> Result<&MqdT, ChannelError> {
        self.mqd.as_ref().ok_or(ChannelError::Closed)
    }
}

impl Channel for MqChannel {
    fn send(&self, message: &Message) -> Result<(), ChannelError> {
        let bytes = message.encode()?;
        match mq_send(self.mqd()?, &bytes, 0) {
            Ok(()) => Ok(()),
            Err(Errno::EAGAIN) => Err(ChannelError::Full),
            Err(e) => Err(ChannelError::Os(e)),
        }
    }

    fn receive(&self) -> Result<Option<Message>, ChannelError> {
        let mut buf = [0u8; WIRE_RECORD_SIZE];
        let mut priority = 0u32;
        match mq_receive(self.mqd()?, &mut buf, &mut priority) {
            Ok(len) => Ok(Some(Message::decode(&buf[..len])?)),
            Err(Errno::EAGAIN) => Ok(None),
            Err(e) => Err(ChannelError::Os(e)),
        }
    }

    fn close(&mut self) {
        let Some(mqd) = self.mqd.take() else {
            return;
        };
        if let Err(e) = mq_close(mqd) {
            warn!(name = %self.name, error = %e, "mq_close failed");
        }
        if self.owner {
            match mq_unlink(self.name.as_str()) {
                Ok(()) | Err(Errno::ENOENT) => {}
                Err(e) => warn!(name = %self.name, error = %e, "mq_unlink failed"),
            }
        }
        debug!(name = %self.name, "queue closed");
    }
}

impl Drop for MqChannel {
    fn drop(&mut self) {
        self.close();
    }
}

impl std::fmt::Debug for MqChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MqChannel")
            .field("name", &self.name)
            .field("owner", &self.owner)
            .field("open", &self.is_open())
            .finish()
    }
}

/// In-process channel with the same depth, codec and error behaviour as
/// [`MqChannel`]. Clones share one queue, so one clone can serve as the
/// VMU end and another as the module end.
#[derive(Debug, Clone)]
pub struct LocalChannel {
    slots: Arc<Mutex<LocalSlots>>,
}

#[derive(Debug)]
struct LocalSlots {
    queue: VecDeque<[u8; WIRE_RECORD_SIZE]>,
    closed: bool,
}

impl LocalChannel {
    pub fn new() -> Self {
        Self {
            slots: Arc::new(Mutex::new(LocalSlots {
                queue: VecDeque::with_capacity(CHANNEL_DEPTH),
                closed: false,
            })),
        }
    }

    /// Records currently queued.
    pub fn len(&self) -> usize {
        self.slots.lock().queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for LocalChannel {
    fn default() -> Self {
        Self::new()
    }
}

impl Channel for LocalChannel {
    fn send(&self, message: &Message) -> Result<(), ChannelError> {
        let bytes = message.encode()?;
        let mut slots = self.slots.lock();
        if slots.closed {
            return Err(ChannelError::Closed);
        }
        if slots.queue.len() >= CHANNEL_DEPTH {
            return Err(ChannelError::Full);
        }
        slots.queue.push_back(bytes);
        Ok(())
    }

    fn receive(&self) -> Result<Option<Message>, ChannelError> {
        let bytes = {
            let mut slots = self.slots.lock();
            if slots.closed {
                return Err(ChannelError::Closed);
            }
            slots.queue.pop_front()
        };
        match bytes {
            Some(bytes) => Ok(Some(Message::decode(&bytes)?)),
            None => Ok(None),
        }
    }

    fn close(&mut self) {
        let mut slots = self.slots.lock();
        slots.closed = true;
        slots.queue.clear();
    }
}
