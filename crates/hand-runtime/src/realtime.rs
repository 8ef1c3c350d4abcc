//! Real-time thread setup for the busy-poll control loop.
//!
//! - Memory locking (mlockall) so the control loop never takes a page fault
//! - CPU pinning of the control thread and, separately, the reporter thread
//!
//! Every step degrades to a warning unless `fail_fast` is set, in which case
//! the first failure aborts startup.

use hand_common::config::RealtimeConfig;
use hand_common::error::{HandError, HandResult};
use tracing::{debug, error, info, warn};

/// Result of real-time initialization.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RealtimeStatus {
    /// Whether memory was locked.
    pub memory_locked: bool,
    /// CPU the calling thread was pinned to.
    pub control_cpu: Option<usize>,
}

/// Apply the real-time configuration to the calling (control) thread.
///
/// # Errors
///
/// With `fail_fast`, returns [`HandError::Realtime`] if capabilities are
/// missing or any step fails. Without it, failures are logged and skipped.
pub fn init_realtime(config: &RealtimeConfig) -> HandResult<RealtimeStatus> {
    if !config.enabled {
        info!("Real-time setup disabled in configuration");
        return Ok(RealtimeStatus::default());
    }

    if config.fail_fast {
        info!("Validating real-time capabilities (fail_fast=true)");
        validate_rt_capabilities(config)?;
    }

    info!("Initializing real-time environment");

    let memory_locked = if config.lock_memory {
        degrade(lock_memory(), config.fail_fast, "memory locking")?.unwrap_or(false)
    } else {
        false
    };

    let control_cpu = match config.control_cpu {
        Some(cpu) => degrade(pin_current_thread(cpu), config.fail_fast, "control thread pinning")?
            .map(|()| cpu),
        None => {
            debug!("No control CPU configured");
            None
        }
    };

    let status = RealtimeStatus {
        memory_locked,
        control_cpu,
    };
    info!(?status, "Real-time initialization complete");
    Ok(status)
}

/// Turn a failed step into a warning unless `fail_fast` is set.
fn degrade<T>(result: HandResult<T>, fail_fast: bool, what: &str) -> HandResult<Option<T>> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(e) if fail_fast => {
            error!(error = %e, "{what} failed");
            Err(e)
        }
        Err(e) => {
            warn!(error = %e, "{what} failed, continuing without it");
            Ok(None)
        }
    }
}

/// Lock all current and future memory pages.
#[cfg(target_os = "linux")]
fn lock_memory() -> HandResult<bool> {
    use nix::sys::mman::{mlockall, MlockAllFlags};

    debug!("Locking memory pages with mlockall");

    mlockall(MlockAllFlags::MCL_CURRENT | MlockAllFlags::MCL_FUTURE)
        .map_err(|e| HandError::Realtime(format!("mlockall failed: {e}")))?;
    info!("Memory locked");
    Ok(true)
}

#[cfg(not(target_os = "linux"))]
fn lock_memory() -> HandResult<bool> {
    Err(HandError::Realtime("mlockall not available on this platform".into()))
}

/// Pin the calling thread to one CPU.
///
/// # Errors
///
/// Returns [`HandError::Realtime`] if the CPU index is invalid or the
/// affinity call fails.
#[cfg(target_os = "linux")]
pub fn pin_current_thread(cpu: usize) -> HandResult<()> {
    use nix::sched::{sched_setaffinity, CpuSet};
    use nix::unistd::Pid;

    let mut cpu_set = CpuSet::new();
    cpu_set
        .set(cpu)
        .map_err(|e| HandError::Realtime(format!("invalid CPU index {cpu}: {e}")))?;

    sched_setaffinity(Pid::from_raw(0), &cpu_set)
        .map_err(|e| HandError::Realtime(format!("sched_setaffinity({cpu}) failed: {e}")))?;

    info!(cpu, "Thread pinned");
    Ok(())
}

/// Pin the calling thread to one CPU.
///
/// # Errors
///
/// Always fails: CPU affinity is not available on this platform.
#[cfg(not(target_os = "linux"))]
pub fn pin_current_thread(cpu: usize) -> HandResult<()> {
    Err(HandError::Realtime(format!(
        "CPU affinity not available on this platform (cpu {cpu})"
    )))
}

/// Information about real-time capabilities of the process.
#[derive(Debug, Clone, Default)]
pub struct RtCapabilities {
    /// Whether running as root.
    pub is_root: bool,
    /// RLIMIT_MEMLOCK soft limit.
    pub memlock_limit: Option<u64>,
    /// Number of CPUs online.
    pub cpu_count: usize,
}

impl RtCapabilities {
    /// Check if memory locking is likely to succeed.
    #[must_use]
    pub fn can_lock_memory(&self) -> bool {
        self.is_root || self.memlock_limit == Some(libc::RLIM_INFINITY)
    }

    /// Check if `cpu` names an online CPU.
    #[must_use]
    pub fn has_cpu(&self, cpu: usize) -> bool {
        cpu < self.cpu_count
    }
}

/// Probe the process for real-time capabilities.
#[cfg(target_os = "linux")]
#[must_use]
pub fn check_rt_capabilities() -> RtCapabilities {
    use nix::sys::resource::{getrlimit, Resource};
    use nix::unistd::{sysconf, Uid, SysconfVar};

    let cpu_count = sysconf(SysconfVar::_NPROCESSORS_ONLN)
        .ok()
        .flatten()
        .and_then(|n| usize::try_from(n).ok())
        .unwrap_or(1);

    RtCapabilities {
        is_root: Uid::effective().is_root(),
        memlock_limit: getrlimit(Resource::RLIMIT_MEMLOCK).ok().map(|(soft, _)| soft),
        cpu_count,
    }
}

/// Probe the process for real-time capabilities.
#[cfg(not(target_os = "linux"))]
#[must_use]
pub fn check_rt_capabilities() -> RtCapabilities {
    RtCapabilities {
        cpu_count: 1,
        ..RtCapabilities::default()
    }
}

/// Check that every requested real-time feature is available.
///
/// # Errors
///
/// Returns [`HandError::Realtime`] listing every unmet requirement.
pub fn validate_rt_capabilities(config: &RealtimeConfig) -> HandResult<()> {
    if !config.enabled {
        return Ok(());
    }

    let caps = check_rt_capabilities();
    let mut issues = Vec::new();

    if config.lock_memory && !caps.can_lock_memory() {
        issues.push(format!(
            "cannot lock memory: RLIMIT_MEMLOCK={:?}, is_root={}",
            caps.memlock_limit, caps.is_root
        ));
    }

    for (role, cpu) in [("control", config.control_cpu), ("diagnostics", config.diagnostics_cpu)] {
        if let Some(cpu) = cpu.filter(|&cpu| !caps.has_cpu(cpu)) {
            issues.push(format!(
                "{role} CPU {cpu} not online ({} CPUs available)",
                caps.cpu_count
            ));
        }
    }

    if issues.is_empty() {
        info!("Real-time capabilities validated");
        Ok(())
    } else {
        let message = format!("real-time requirements not met:\n  - {}", issues.join("\n  - "));
        error!("{}", message);
        Err(HandError::Realtime(message))
    }
}
