//! Process-wide `running` / `paused` flags.
//!
//! Each process owns one [`Lifecycle`] (normally the static [`LIFECYCLE`]).
//! Loops read it at the top of every iteration; the only writers are
//! [`Lifecycle::handle_signal`] and an engine processing END.
//!
//! | Signal            | Effect                 |
//! |-------------------|------------------------|
//! | `SIGUSR1`         | toggle `paused`        |
//! | `SIGINT`/`SIGTERM`| `running = false`      |

use nix::sys::signal::{SaFlags, SigAction, SigHandler, SigSet, Signal, sigaction};
use std::sync::atomic::{AtomicBool, Ordering};

/// Atomic lifecycle cell. All operations are lock-free and async-signal-safe.
#[derive(Debug)]
pub struct Lifecycle {
    running: AtomicBool,
    paused: AtomicBool,
}

impl Lifecycle {
    /// Running, not paused.
    pub const fn new() -> Self {
        Self {
            running: AtomicBool::new(true),
            paused: AtomicBool::new(false),
        }
    }

    #[inline]
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    #[inline]
    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::Acquire)
    }

    /// Mark not-running. Returns `true` only for the first request, so a
    /// second shutdown signal never triggers a second cleanup.
    pub fn request_shutdown(&self) -> bool {
        self.running.swap(false, Ordering::AcqRel)
    }

    /// Flip `paused`, returning the new value.
    pub fn toggle_pause(&self) -> bool {
        !self.paused.fetch_xor(true, Ordering::AcqRel)
    }

    /// Apply the effect of `signal`. Signals outside the table are ignored.
    pub fn handle_signal(&self, signal: Signal) {
        match signal {
            Signal::SIGUSR1 => {
                self.toggle_pause();
            }
            Signal::SIGINT | Signal::SIGTERM => {
                self.request_shutdown();
            }
            _ => {}
        }
    }
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self::new()
    }
}

/// The lifecycle cell driven by this process's signal handlers.
pub static LIFECYCLE: Lifecycle = Lifecycle::new();

extern "C" fn on_signal(signum: libc::c_int) {
    if let Ok(signal) = Signal::try_from(signum) {
        LIFECYCLE.handle_signal(signal);
    }
}

/// Route `SIGUSR1`, `SIGINT` and `SIGTERM` to [`LIFECYCLE`].
pub fn install_signal_handlers() -> nix::Result<()> {
    let action = SigAction::new(
        SigHandler::Handler(on_signal),
        SaFlags::SA_RESTART,
        SigSet::empty(),
    );
    for signal in [Signal::SIGUSR1, Signal::SIGINT, Signal::SIGTERM] {
        // SAFETY: the handler only touches atomics in a static.
        unsafe { sigaction(signal, &action) }?;
    }
    Ok(())
}
