//! Signal handling for daemon shutdown.
//!
//! SIGTERM and SIGINT set a process-wide atomic flag. The control loop and
//! the diagnostics reporter poll [`ShutdownFlag::is_raised`]; nothing blocks.

use std::sync::atomic::{AtomicBool, AtomicI32, Ordering};
use std::sync::Arc;
use tracing::{debug, info};

/// Set from the signal handler; async-signal-safe.
static SIGNALED: AtomicBool = AtomicBool::new(false);
/// Number of the last signal received (0 = none).
static LAST_SIGNAL: AtomicI32 = AtomicI32::new(0);

/// Signal types that request shutdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalKind {
    /// SIGTERM - Graceful termination request.
    Terminate,
    /// SIGINT - Interrupt (Ctrl+C).
    Interrupt,
}

impl SignalKind {
    fn from_raw(signo: i32) -> Option<Self> {
        match signo {
            libc::SIGTERM => Some(Self::Terminate),
            libc::SIGINT => Some(Self::Interrupt),
            _ => None,
        }
    }
}

impl std::fmt::Display for SignalKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SignalKind::Terminate => write!(f, "SIGTERM"),
            SignalKind::Interrupt => write!(f, "SIGINT"),
        }
    }
}

/// Cloneable shutdown flag shared by the control loop, the reporter and the
/// signal handler.
#[derive(Debug, Clone, Default)]
pub struct ShutdownFlag {
    requested: Arc<AtomicBool>,
}

impl ShutdownFlag {
    /// Create a lowered flag that is not connected to any signal.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a flag and route SIGTERM/SIGINT into it.
    ///
    /// # Errors
    ///
    /// Returns an error if a handler cannot be installed.
    pub fn install() -> std::io::Result<Self> {
        #[cfg(unix)]
        register_unix_handlers()?;
        Ok(Self::new())
    }

    /// Whether shutdown was requested, by signal or by [`Self::raise`].
    #[inline]
    pub fn is_raised(&self) -> bool {
        self.requested.load(Ordering::Relaxed) || SIGNALED.load(Ordering::Relaxed)
    }

    /// Request shutdown (can be called from any thread).
    pub fn raise(&self) {
        self.requested.store(true, Ordering::Relaxed);
    }

    /// The signal that requested shutdown, if any.
    pub fn signal(&self) -> Option<SignalKind> {
        SignalKind::from_raw(LAST_SIGNAL.load(Ordering::Relaxed))
    }
}

#[cfg(unix)]
#[allow(unsafe_code)]
fn register_unix_handlers() -> std::io::Result<()> {
    use nix::sys::signal::{sigaction, SaFlags, SigAction, SigHandler, SigSet, Signal};

    extern "C" fn on_shutdown_signal(signo: libc::c_int) {
        LAST_SIGNAL.store(signo, Ordering::Relaxed);
        SIGNALED.store(true, Ordering::Relaxed);
    }

    let action = SigAction::new(
        SigHandler::Handler(on_shutdown_signal),
        SaFlags::SA_RESTART,
        SigSet::empty(),
    );

    for signal in [Signal::SIGTERM, Signal::SIGINT] {
        // SAFETY: the handler only stores to atomics, which is async-signal-safe.
        unsafe { sigaction(signal, &action) }.map_err(std::io::Error::from)?;
    }

    debug!("Unix signal handlers registered");
    Ok(())
}

/// Log the shutdown cause once the loop has stopped.
pub fn log_shutdown_cause(flag: &ShutdownFlag) {
    match flag.signal() {
        Some(kind) => info!(signal = %kind, "Shutdown requested by signal"),
        None if flag.is_raised() => info!("Shutdown requested"),
        None => debug!("Loop ended without shutdown request"),
    }
}
