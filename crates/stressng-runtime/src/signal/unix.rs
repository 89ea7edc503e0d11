//! Unix signal handling

use nix::sys::signal::{self, SaFlags, SigAction, SigHandler, SigSet, Signal};
use nix::unistd::Pid;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use stressng_core::{ProcessControl, SignalError};

/// Set by the SIGALRM handler; process-local
static ALARM_FIRED: AtomicBool = AtomicBool::new(false);

/// Set by the SIGINT/SIGTERM handler; process-local
static INTERRUPTED: AtomicBool = AtomicBool::new(false);

static INTERRUPT_HANDLER_INSTALLED: AtomicBool = AtomicBool::new(false);

/// Stop/continue through real signals
///
/// `suspend` on the caller's own pid blocks inside `kill` until some other
/// process sends SIGCONT.
#[derive(Debug, Default, Clone, Copy)]
pub struct SignalControl;

impl SignalControl {
    pub fn new() -> Self {
        Self
    }

    fn send(pid: i32, sig: Signal) -> Result<(), SignalError> {
        signal::kill(Pid::from_raw(pid), sig).map_err(|errno| SignalError {
            pid,
            signal: sig.as_str(),
            errno: errno as i32,
        })
    }
}

impl ProcessControl for SignalControl {
    fn suspend(&self, pid: i32) -> Result<(), SignalError> {
        Self::send(pid, Signal::SIGSTOP)
    }

    fn resume(&self, pid: i32) -> Result<(), SignalError> {
        Self::send(pid, Signal::SIGCONT)
    }

    fn kill(&self, pid: i32) -> Result<(), SignalError> {
        Self::send(pid, Signal::SIGKILL)
    }

    fn is_alive(&self, pid: i32) -> bool {
        child_alive(Pid::from_raw(pid))
    }
}

/// Peek at our own child without reaping it; anyone else is checked with
/// signal 0
#[cfg(any(target_os = "linux", target_os = "android"))]
fn child_alive(pid: Pid) -> bool {
    use nix::errno::Errno;
    use nix::sys::wait::{waitid, Id, WaitPidFlag, WaitStatus};

    let flags = WaitPidFlag::WEXITED | WaitPidFlag::WNOHANG | WaitPidFlag::WNOWAIT;
    match waitid(Id::Pid(pid), flags) {
        Ok(WaitStatus::StillAlive) => true,
        Ok(_) => false,
        Err(Errno::ECHILD) => signal::kill(pid, None).is_ok(),
        Err(_) => true,
    }
}

/// Zombies answer signal 0 here, so an exited child reads as alive until
/// reaped
#[cfg(not(any(target_os = "linux", target_os = "android")))]
fn child_alive(pid: Pid) -> bool {
    signal::kill(pid, None).is_ok()
}

extern "C" fn on_alarm(_: libc::c_int) {
    ALARM_FIRED.store(true, Ordering::Relaxed);
}

extern "C" fn on_interrupt(_: libc::c_int) {
    INTERRUPTED.store(true, Ordering::Relaxed);
}

/// Install the SIGALRM handler that ends a worker's run
///
/// Must be in place before `arm_alarm`; the default SIGALRM action would
/// kill the worker and lose its counters.
pub fn install_alarm_handler() -> nix::Result<()> {
    ALARM_FIRED.store(false, Ordering::Relaxed);
    let action = SigAction::new(SigHandler::Handler(on_alarm), SaFlags::SA_RESTART, SigSet::empty());
    unsafe { signal::sigaction(Signal::SIGALRM, &action) }.map(|_| ())
}

/// Arm the worker run timeout (whole seconds, rounded up)
///
/// `None` or a zero duration leaves any pending alarm alone.
pub fn arm_alarm(timeout: Option<Duration>) {
    let Some(timeout) = timeout.filter(|t| !t.is_zero()) else {
        return;
    };
    let mut secs = timeout.as_secs();
    if timeout.subsec_nanos() > 0 {
        secs += 1;
    }
    let secs = secs.min(libc::c_uint::MAX as u64) as libc::c_uint;
    nix::unistd::alarm::set(secs);
}

/// Whether this process's run timeout has expired
#[inline]
pub fn alarm_fired() -> bool {
    ALARM_FIRED.load(Ordering::Relaxed)
}

/// Install SIGINT/SIGTERM handlers that set the interrupt flag
///
/// Forked workers inherit the handlers; a terminal interrupt reaches the
/// whole process group, so each process sees its own flag set.
pub fn install_interrupt_handler() -> nix::Result<()> {
    if INTERRUPT_HANDLER_INSTALLED.swap(true, Ordering::SeqCst) {
        return Ok(()); // Already installed
    }
    let action = SigAction::new(SigHandler::Handler(on_interrupt), SaFlags::SA_RESTART, SigSet::empty());
    unsafe {
        signal::sigaction(Signal::SIGINT, &action)?;
        signal::sigaction(Signal::SIGTERM, &action)?;
    }
    Ok(())
}

/// Whether SIGINT/SIGTERM was received
#[inline]
pub fn interrupted() -> bool {
    INTERRUPTED.load(Ordering::Relaxed)
}
