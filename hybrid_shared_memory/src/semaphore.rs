//! POSIX named semaphore used as the cross-process state lock.

use std::ffi::CString;
use std::io;
use tracing::{debug, warn};

/// Named binary semaphore (`sem_open` family).
///
/// The creating process owns the name and unlinks it on close. Closing is
/// idempotent; `Drop` closes.
pub struct NamedSemaphore {
    sem: *mut libc::sem_t,
    name: CString,
    owner: bool,
}

// SAFETY: a named semaphore handle is process-wide; sem_wait/sem_post are
// thread-safe by POSIX.
unsafe impl Send for NamedSemaphore {}
unsafe impl Sync for NamedSemaphore {}

impl NamedSemaphore {
    /// Create `name` with count 1, replacing a stale semaphore of that name.
    pub fn create(name: &str) -> io::Result<Self> {
        let c_name = c_name(name)?;
        // SAFETY: valid NUL-terminated name.
        unsafe { libc::sem_unlink(c_name.as_ptr()) };
        // SAFETY: variadic mode/value arguments supplied for O_CREAT.
        let sem = unsafe {
            libc::sem_open(
                c_name.as_ptr(),
                libc::O_CREAT | libc::O_EXCL,
                0o600 as libc::mode_t,
                1 as libc::c_uint,
            )
        };
        Self::from_raw(sem, c_name, true)
    }

    /// Open an existing semaphore created by another process.
    pub fn open(name: &str) -> io::Result<Self> {
        let c_name = c_name(name)?;
        // SAFETY: valid NUL-terminated name, no O_CREAT.
        let sem = unsafe { libc::sem_open(c_name.as_ptr(), 0) };
        Self::from_raw(sem, c_name, false)
    }

    fn from_raw(sem: *mut libc::sem_t, name: CString, owner: bool) -> io::Result<Self> {
        if sem == libc::SEM_FAILED {
            return Err(io::Error::last_os_error());
        }
        debug!(name = ?name, owner, "semaphore opened");
        Ok(Self { sem, name, owner })
    }

    /// Block until the count is positive, then decrement. Retries on `EINTR`.
    pub fn wait(&self) -> io::Result<()> {
        let sem = self.handle()?;
        loop {
            // SAFETY: handle is open.
            if unsafe { libc::sem_wait(sem) } == 0 {
                return Ok(());
            }
            let err = io::Error::last_os_error();
            if err.raw_os_error() != Some(libc::EINTR) {
                return Err(err);
            }
        }
    }

    /// Increment the count.
    pub fn post(&self) -> io::Result<()> {
        let sem = self.handle()?;
        // SAFETY: handle is open.
        if unsafe { libc::sem_post(sem) } == 0 {
            Ok(())
        } else {
            Err(io::Error::last_os_error())
        }
    }

    /// Current count, for diagnostics.
    pub fn value(&self) -> io::Result<i32> {
        let sem = self.handle()?;
        let mut value: libc::c_int = 0;
        // SAFETY: handle is open, `value` is a valid out pointer.
        if unsafe { libc::sem_getvalue(sem, &mut value) } == 0 {
            Ok(value)
        } else {
            Err(io::Error::last_os_error())
        }
    }

    pub fn is_open(&self) -> bool {
        !self.sem.is_null()
    }

    /// Close the handle; the owner also unlinks the name. Safe to repeat.
    pub fn close(&mut self) {
        if self.sem.is_null() {
            return;
        }
        // SAFETY: handle is open and is nulled right after.
        if unsafe { libc::sem_close(self.sem) } != 0 {
            warn!(name = ?self.name, error = %io::Error::last_os_error(), "sem_close failed");
        }
        self.sem = std::ptr::null_mut();
        if self.owner {
            // SAFETY: valid NUL-terminated name.
            unsafe { libc::sem_unlink(self.name.as_ptr()) };
        }
        debug!(name = ?self.name, "semaphore closed");
    }

    fn handle(&self) -> io::Result<*mut libc::sem_t> {
        if self.sem.is_null() {
            Err(io::Error::from_raw_os_error(libc::EBADF))
        } else {
            Ok(self.sem)
        }
    }
}

impl Drop for NamedSemaphore {
    fn drop(&mut self) {
        self.close();
    }
}

impl std::fmt::Debug for NamedSemaphore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NamedSemaphore")
            .field("name", &self.name)
            .field("owner", &self.owner)
            .field("open", &self.is_open())
            .finish()
    }
}

fn c_name(name: &str) -> io::Result<CString> {
    CString::new(name).map_err(|_| io::Error::from_raw_os_error(libc::EINVAL))
}
