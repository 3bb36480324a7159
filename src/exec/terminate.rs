// src/exec/terminate.rs

//! Graceful and forced termination of a child process.
//!
//! On Unix the graceful request is `SIGINT`, the same signal a developer
//! sends with Ctrl+C. Other platforms have no portable equivalent, so
//! [`interrupt`] reports the request as undelivered and callers escalate to a
//! forced kill straight away.

use tracing::debug;

/// Two-phase termination capability.
pub trait TerminationRequest {
    /// Ask the process to exit on its own. Returns `false` when the request
    /// could not be delivered (no such process, unsupported platform).
    fn request(&self) -> bool;

    /// Kill the process unconditionally. Best-effort; never fails.
    fn force(&mut self);
}

/// Send an interrupt to `pid`. Returns whether the signal was delivered.
#[cfg(unix)]
pub fn interrupt(pid: u32) -> bool {
    let Ok(pid) = libc::pid_t::try_from(pid) else {
        return false;
    };
    // SAFETY: kill(2) has no memory-safety preconditions; a stale pid only
    // yields ESRCH.
    let rc = unsafe { libc::kill(pid, libc::SIGINT) };
    if rc != 0 {
        debug!(
            pid,
            error = %std::io::Error::last_os_error(),
            "interrupt not delivered"
        );
    }
    rc == 0
}

#[cfg(not(unix))]
pub fn interrupt(pid: u32) -> bool {
    debug!(pid, "graceful interrupt unsupported on this platform");
    false
}
