//! Small process-related helpers shared across the workspace: liveness
//! probing, signal delivery with graceful escalation, and best-effort
//! discovery of processes by name/command line.
//!
//! "Process not found" is deliberately modelled as a normal outcome, not an
//! error: callers stopping an external process treat an already-exited
//! target as success.

use std::ffi::OsStr;

use sysinfo::{Pid, ProcessesToUpdate, Signal, System};

#[cfg(feature = "tokio")]
use std::time::Duration;
#[cfg(feature = "tokio")]
use tracing::debug;

#[cfg(windows)]
const CREATE_NO_WINDOW: u32 = 0x0800_0000;

/// Apply the Windows `CREATE_NO_WINDOW` flag to child processes.
///
/// On non-Windows targets this is a no-op.
pub trait NoWindowExt {
    fn no_window(&mut self);
}

impl NoWindowExt for std::process::Command {
    fn no_window(&mut self) {
        #[cfg(windows)]
        {
            use std::os::windows::process::CommandExt;
            self.creation_flags(CREATE_NO_WINDOW);
        }
    }
}

/// Create a `std::process::Command` with `CREATE_NO_WINDOW` applied on Windows.
pub fn std_command(program: impl AsRef<OsStr>) -> std::process::Command {
    let mut cmd = std::process::Command::new(program);
    cmd.no_window();
    cmd
}

#[cfg(feature = "tokio")]
impl NoWindowExt for tokio::process::Command {
    fn no_window(&mut self) {
        #[cfg(windows)]
        {
            use std::os::windows::process::CommandExt;
            self.as_std_mut().creation_flags(CREATE_NO_WINDOW);
        }
    }
}

/// Create a `tokio::process::Command` with `CREATE_NO_WINDOW` applied on Windows.
#[cfg(feature = "tokio")]
pub fn tokio_command(program: impl AsRef<OsStr>) -> tokio::process::Command {
    let mut cmd = tokio::process::Command::new(program);
    cmd.no_window();
    cmd
}

/// Signals used by the graceful stop escalation, in escalation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopSignal {
    /// Polite interrupt (SIGINT); media tools treat this like an operator "q".
    Interrupt,
    /// Termination request (SIGTERM).
    Terminate,
    /// Unconditional kill (SIGKILL).
    Kill,
}

impl StopSignal {
    fn as_sysinfo(self) -> Signal {
        match self {
            Self::Interrupt => Signal::Interrupt,
            Self::Terminate => Signal::Term,
            Self::Kill => Signal::Kill,
        }
    }
}

/// Outcome of [`stop_gracefully`]: which escalation step the process exited at.
#[cfg(feature = "tokio")]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopOutcome {
    /// The process was already gone before any signal was sent.
    AlreadyExited,
    /// The process exited after the interrupt signal.
    Interrupted,
    /// The process exited after the terminate signal.
    Terminated,
    /// The kill signal was sent as a last resort.
    Killed,
}

/// Poll windows for the stop escalation.
#[cfg(feature = "tokio")]
#[derive(Debug, Clone)]
pub struct StopTimings {
    /// How long to wait for exit after the interrupt signal.
    pub interrupt_wait: Duration,
    /// How long to wait for exit after the terminate signal.
    pub terminate_wait: Duration,
    /// Liveness poll interval within each wait window.
    pub poll_interval: Duration,
}

#[cfg(feature = "tokio")]
impl Default for StopTimings {
    fn default() -> Self {
        Self {
            interrupt_wait: Duration::from_secs(5),
            terminate_wait: Duration::from_secs(3),
            poll_interval: Duration::from_millis(500),
        }
    }
}

fn refreshed_for(pid: Pid) -> System {
    let mut system = System::new();
    system.refresh_processes(ProcessesToUpdate::Some(&[pid]), true);
    system
}

/// Whether a process with the given pid currently exists.
pub fn is_alive(pid: u32) -> bool {
    let pid = Pid::from_u32(pid);
    refreshed_for(pid).process(pid).is_some()
}

/// Send a signal to a process. Returns `false` when the process is already
/// gone or the platform cannot deliver the signal; neither is an error.
pub fn send_signal(pid: u32, signal: StopSignal) -> bool {
    let pid = Pid::from_u32(pid);
    let system = refreshed_for(pid);
    let Some(process) = system.process(pid) else {
        return false;
    };

    match process.kill_with(signal.as_sysinfo()) {
        Some(sent) => sent,
        // Signal not supported on this platform; only force-kill has a
        // portable fallback.
        None => matches!(signal, StopSignal::Kill) && process.kill(),
    }
}

/// Find pids whose process name contains `name_fragment` and, when given,
/// whose command line contains `cmd_fragment`. Best-effort; never errors.
pub fn find_processes(name_fragment: &str, cmd_fragment: Option<&str>) -> Vec<u32> {
    let mut system = System::new();
    system.refresh_processes(ProcessesToUpdate::All, true);

    system
        .processes()
        .iter()
        .filter(|(_, process)| {
            let name_matches = process.name().to_string_lossy().contains(name_fragment);
            let cmd_matches = cmd_fragment.is_none_or(|fragment| {
                process
                    .cmd()
                    .iter()
                    .any(|arg| arg.to_string_lossy().contains(fragment))
            });
            name_matches && cmd_matches
        })
        .map(|(pid, _)| pid.as_u32())
        .collect()
}

/// Poll until the process exits or the window elapses. Returns `true` once
/// the process is gone.
#[cfg(feature = "tokio")]
async fn wait_for_exit(pid: u32, window: Duration, poll_interval: Duration) -> bool {
    let deadline = tokio::time::Instant::now() + window;
    loop {
        if !is_alive(pid) {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(poll_interval).await;
    }
}

/// Stop a process with escalating signals: interrupt, then terminate, then
/// kill, polling liveness between steps. Idempotent: a process that is
/// already gone (before or between steps) is the success path and no further
/// signal is sent.
#[cfg(feature = "tokio")]
pub async fn stop_gracefully(pid: u32, timings: &StopTimings) -> StopOutcome {
    if !is_alive(pid) {
        debug!(pid, "process already exited, nothing to stop");
        return StopOutcome::AlreadyExited;
    }

    send_signal(pid, StopSignal::Interrupt);
    if wait_for_exit(pid, timings.interrupt_wait, timings.poll_interval).await {
        return StopOutcome::Interrupted;
    }

    send_signal(pid, StopSignal::Terminate);
    if wait_for_exit(pid, timings.terminate_wait, timings.poll_interval).await {
        return StopOutcome::Terminated;
    }

    send_signal(pid, StopSignal::Kill);
    // Give the kernel a moment to reap before the caller re-probes liveness.
    wait_for_exit(pid, Duration::from_secs(1), timings.poll_interval).await;
    StopOutcome::Killed
}

#[cfg(test)]
mod tests {
    use super::*;

    // A pid far above any default pid_max; guaranteed absent.
    const DEAD_PID: u32 = u32::MAX - 7;

    #[test]
    fn own_process_is_alive() {
        assert!(is_alive(std::process::id()));
    }

    #[test]
    fn absent_pid_is_not_alive() {
        assert!(!is_alive(DEAD_PID));
    }

    #[test]
    fn send_signal_to_absent_pid_is_false_not_error() {
        assert!(!send_signal(DEAD_PID, StopSignal::Interrupt));
        assert!(!send_signal(DEAD_PID, StopSignal::Kill));
    }

    #[test]
    fn find_processes_unmatched_is_empty() {
        assert!(find_processes("no-such-process-name-zzz", Some("no-such-arg")).is_empty());
    }

    #[cfg(feature = "tokio")]
    #[tokio::test]
    async fn stop_gracefully_on_exited_process_is_idempotent() {
        let outcome = stop_gracefully(DEAD_PID, &StopTimings::default()).await;
        assert_eq!(outcome, StopOutcome::AlreadyExited);
    }
}
