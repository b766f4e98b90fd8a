//! Escalating termination: polite signal, grace period, forceful kill.
use std::time::Duration;

use tokio::{process::Child, time::timeout};
use tracing::warn;

use fanrun_core::StopSignals;

/// Upper bound for reaping the child after the forceful kill.
const REAP_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy)]
pub(crate) struct Termination {
    /// Signal the child's whole process group instead of the child alone.
    pub use_groups: bool,
    pub grace: Duration,
}

/// Stop `child` and reap it.
///
/// Unix: SIGTERM to the process group (or to the process when groups are disabled or the group cannot be
/// resolved), up to `grace` for it to exit, then SIGKILL. Windows: `CTRL_BREAK_EVENT` to the process group,
/// up to `grace`, then a forceful terminate. A forced stop cuts the grace period short.
pub(crate) async fn terminate(child: &mut Child, term: Termination, signals: &StopSignals) {
    let Some(pid) = child.id() else {
        return;
    };

    cfg_if::cfg_if! {
        if #[cfg(unix)] {
            unix_impl::terminate(child, pid, term, signals).await;
        } else if #[cfg(windows)] {
            windows_impl::terminate(child, pid, term, signals).await;
        } else {
            let _ = (term, signals);
            if let Err(e) = child.start_kill() {
                tracing::debug!(target: "fanrun.exec.terminate", pid, error = %e, "kill failed");
            }
        }
    }

    if timeout(REAP_TIMEOUT, child.wait()).await.is_err() {
        warn!(target: "fanrun.exec.terminate", pid, "process did not exit after kill");
    }
}

#[cfg(unix)]
mod unix_impl {
    use nix::{
        sys::signal::{Signal, kill, killpg},
        unistd::{Pid, getpgid, getpgrp},
    };
    use tokio::{process::Child, time::sleep};
    use tracing::{debug, trace};

    use super::Termination;
    use fanrun_core::StopSignals;

    #[derive(Debug, Clone, Copy)]
    enum Target {
        Group { pgid: Pid, pid: Pid },
        Process(Pid),
    }

    fn resolve(pid: u32, use_groups: bool) -> Target {
        let pid = Pid::from_raw(pid as i32);
        if !use_groups {
            return Target::Process(pid);
        }
        match getpgid(Some(pid)) {
            // never signal our own group
            Ok(pgid) if pgid == getpgrp() => Target::Process(pid),
            Ok(pgid) => Target::Group { pgid, pid },
            Err(e) => {
                debug!(target: "fanrun.exec.terminate", %pid, error = %e, "process group lookup failed, falling back to process");
                Target::Process(pid)
            }
        }
    }

    fn send(target: Target, signal: Signal) {
        match target {
            Target::Group { pgid, pid } => {
                trace!(target: "fanrun.exec.terminate", %pgid, ?signal, "signalling process group");
                if let Err(e) = killpg(pgid, signal) {
                    debug!(target: "fanrun.exec.terminate", %pgid, error = %e, "group signal failed, falling back to process");
                    send(Target::Process(pid), signal);
                }
            }
            Target::Process(pid) => {
                trace!(target: "fanrun.exec.terminate", %pid, ?signal, "signalling process");
                if let Err(e) = kill(pid, signal) {
                    debug!(target: "fanrun.exec.terminate", %pid, error = %e, "signal failed");
                }
            }
        }
    }

    pub(super) async fn terminate(
        child: &mut Child,
        pid: u32,
        term: Termination,
        signals: &StopSignals,
    ) {
        let target = resolve(pid, term.use_groups);

        if !signals.is_forced() {
            send(target, Signal::SIGTERM);
            tokio::select! {
                _ = child.wait() => {
                    trace!(target: "fanrun.exec.terminate", pid, "exited after SIGTERM");
                    return;
                }
                _ = sleep(term.grace) => {
                    debug!(target: "fanrun.exec.terminate", pid, "grace period elapsed, sending SIGKILL");
                }
                _ = signals.forced() => {
                    debug!(target: "fanrun.exec.terminate", pid, "forced stop, sending SIGKILL");
                }
            }
        }
        send(target, Signal::SIGKILL);
    }
}

#[cfg(windows)]
mod windows_impl {
    use tokio::{process::Child, time::sleep};
    use tracing::{debug, trace};
    use windows_sys::Win32::System::Console::{CTRL_BREAK_EVENT, GenerateConsoleCtrlEvent};

    use super::Termination;
    use fanrun_core::StopSignals;

    /// Only a child started with `CREATE_NEW_PROCESS_GROUP` owns a group id equal to its pid.
    fn send_break(pid: u32) -> bool {
        // SAFETY: plain FFI call with value arguments.
        unsafe { GenerateConsoleCtrlEvent(CTRL_BREAK_EVENT, pid) != 0 }
    }

    fn kill(child: &mut Child, pid: u32) {
        if let Err(e) = child.start_kill() {
            debug!(target: "fanrun.exec.terminate", pid, error = %e, "kill failed");
        }
    }

    pub(super) async fn terminate(
        child: &mut Child,
        pid: u32,
        term: Termination,
        signals: &StopSignals,
    ) {
        if signals.is_forced() || !term.use_groups {
            kill(child, pid);
            return;
        }
        if !send_break(pid) {
            debug!(
                target: "fanrun.exec.terminate",
                pid,
                error = %std::io::Error::last_os_error(),
                "CTRL_BREAK_EVENT failed, killing process"
            );
            kill(child, pid);
            return;
        }

        tokio::select! {
            _ = child.wait() => {
                trace!(target: "fanrun.exec.terminate", pid, "exited after CTRL_BREAK_EVENT");
                return;
            }
            _ = sleep(term.grace) => {
                debug!(target: "fanrun.exec.terminate", pid, "grace period elapsed, terminating");
            }
            _ = signals.forced() => {
                debug!(target: "fanrun.exec.terminate", pid, "forced stop, terminating");
            }
        }
        kill(child, pid);
    }
}
