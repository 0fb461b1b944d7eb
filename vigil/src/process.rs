//! Media-process controller.
//!
//! The watchdog never owns the encoder's lifecycle; its supervisor relaunch
//! loop does. Stopping the current instance gracefully is all the leverage
//! the watchdog needs, and an already-gone process is success, not failure.

use async_trait::async_trait;
use process_utils::{StopOutcome, StopSignal, StopTimings};
use tracing::{info, warn};

use crate::config::SignalPaths;
use crate::signals::PidFile;

/// Process name fragment used when the pid marker is missing.
const PROCESS_NAME_FRAGMENT: &str = "ffmpeg";

/// Command-line fragment narrowing discovery to the restream instance.
const PROCESS_CMD_FRAGMENT: &str = "rtmp";

/// Seam for stopping the media process, so machine tests can count
/// invocations without signalling anything real.
#[async_trait]
pub trait ProcessController: Send + Sync {
    /// Stop the media process gracefully. Already-gone is the success path.
    async fn stop(&self) -> StopOutcome;
}

/// Controller over the externally-managed encoder process.
pub struct MediaProcessController {
    pid_file: PidFile,
    timings: StopTimings,
}

impl MediaProcessController {
    pub fn new(paths: &SignalPaths) -> Self {
        Self {
            pid_file: PidFile::new(&paths.pid_file),
            timings: StopTimings::default(),
        }
    }
}

#[async_trait]
impl ProcessController for MediaProcessController {
    async fn stop(&self) -> StopOutcome {
        match self.pid_file.read() {
            Some(pid) => {
                info!(pid, "stopping media process gracefully");
                let outcome = process_utils::stop_gracefully(pid, &self.timings).await;
                info!(pid, ?outcome, "media process stop finished");
                outcome
            }
            None => {
                warn!("no media process pid marker; falling back to discovery");
                let pids =
                    process_utils::find_processes(PROCESS_NAME_FRAGMENT, Some(PROCESS_CMD_FRAGMENT));
                if pids.is_empty() {
                    info!("no candidate media processes found");
                    return StopOutcome::AlreadyExited;
                }

                for pid in &pids {
                    process_utils::send_signal(*pid, StopSignal::Interrupt);
                }
                info!(?pids, "sent interrupt to discovered media processes");
                tokio::time::sleep(std::time::Duration::from_secs(3)).await;
                StopOutcome::Interrupted
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn missing_pid_and_no_candidates_is_already_exited() {
        let dir = TempDir::new().unwrap();
        let paths = SignalPaths {
            pid_file: dir.path().join("media.pid"),
            ..SignalPaths::default()
        };

        let controller = MediaProcessController::new(&paths);
        assert_eq!(controller.stop().await, StopOutcome::AlreadyExited);
    }

    #[tokio::test]
    async fn stale_pid_marker_is_already_exited() {
        let dir = TempDir::new().unwrap();
        let paths = SignalPaths {
            pid_file: dir.path().join("media.pid"),
            ..SignalPaths::default()
        };
        std::fs::write(&paths.pid_file, format!("{}", u32::MAX - 11)).unwrap();

        let controller = MediaProcessController::new(&paths);
        assert_eq!(controller.stop().await, StopOutcome::AlreadyExited);
    }
}
