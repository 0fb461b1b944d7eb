//! Local media-process progress probe.
//!
//! Secondary indicator only: the orchestrator observes it for logging but
//! never restarts on its word alone.

use std::time::Duration;

use tracing::warn;

use super::ProgressHealth;
use crate::config::SignalPaths;
use crate::signals::{LastFrameMarker, ProgressFile};

/// Artifact older than this means the encoder stopped writing progress.
const STALE_AGE: Duration = Duration::from_secs(60);

/// A non-advancing frame counter only counts as a stall once the artifact
/// is at least this old, so two close-together reads don't false-positive.
const STALL_AGE: Duration = Duration::from_secs(10);

/// Probe over the progress artifact and its last-observed-frame marker.
pub struct ProgressProbe {
    progress: ProgressFile,
    marker: LastFrameMarker,
    stale_age: Duration,
    stall_age: Duration,
}

impl ProgressProbe {
    pub fn new(paths: &SignalPaths) -> Self {
        Self {
            progress: ProgressFile::new(&paths.progress_file),
            marker: LastFrameMarker::new(&paths.last_frame_file),
            stale_age: STALE_AGE,
            stall_age: STALL_AGE,
        }
    }

    #[cfg(test)]
    fn with_thresholds(paths: &SignalPaths, stale_age: Duration, stall_age: Duration) -> Self {
        Self {
            progress: ProgressFile::new(&paths.progress_file),
            marker: LastFrameMarker::new(&paths.last_frame_file),
            stale_age,
            stall_age,
        }
    }

    /// Classify the media process from its progress artifact. Reads the
    /// last-frame marker and then records the current frame for the next
    /// observation (read-then-write, single consumer).
    pub fn check(&self) -> ProgressHealth {
        if !self.progress.exists() {
            return ProgressHealth::Unavailable;
        }

        let Some(age) = self.progress.age() else {
            return ProgressHealth::Unavailable;
        };

        if age > self.stale_age {
            warn!(
                age_secs = age.as_secs(),
                "progress artifact is stale, encoder may have stalled"
            );
            return ProgressHealth::Stalled;
        }

        let Some(parsed) = self.progress.read() else {
            return ProgressHealth::Unavailable;
        };

        // Artifact exists but carries no frame counter yet: encoder is
        // still warming up.
        let Some(frame) = parsed.frame else {
            return ProgressHealth::Healthy;
        };

        let last_seen = self.marker.read();
        self.marker.write(frame);

        if last_seen == Some(frame) && age > self.stall_age {
            warn!(frame, "encoder stalled: frame counter is not advancing");
            return ProgressHealth::Stalled;
        }

        ProgressHealth::Healthy
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn paths_in(dir: &TempDir) -> SignalPaths {
        SignalPaths {
            progress_file: dir.path().join("progress.txt"),
            last_frame_file: dir.path().join("last_frame"),
            ..SignalPaths::default()
        }
    }

    #[test]
    fn missing_artifact_is_unavailable() {
        let dir = TempDir::new().unwrap();
        let probe = ProgressProbe::new(&paths_in(&dir));
        assert_eq!(probe.check(), ProgressHealth::Unavailable);
    }

    #[test]
    fn fresh_artifact_with_advancing_frame_is_healthy() {
        let dir = TempDir::new().unwrap();
        let paths = paths_in(&dir);
        let probe = ProgressProbe::new(&paths);

        std::fs::write(&paths.progress_file, "frame=10\n").unwrap();
        assert_eq!(probe.check(), ProgressHealth::Healthy);

        std::fs::write(&paths.progress_file, "frame=11\n").unwrap();
        assert_eq!(probe.check(), ProgressHealth::Healthy);
    }

    #[test]
    fn frameless_artifact_is_healthy_while_fresh() {
        let dir = TempDir::new().unwrap();
        let paths = paths_in(&dir);
        let probe = ProgressProbe::new(&paths);

        std::fs::write(&paths.progress_file, "bitrate=900k\n").unwrap();
        assert_eq!(probe.check(), ProgressHealth::Healthy);
    }

    #[test]
    fn stale_artifact_is_stalled() {
        let dir = TempDir::new().unwrap();
        let paths = paths_in(&dir);
        // Zero stale threshold: any measurable age trips it.
        let probe = ProgressProbe::with_thresholds(&paths, Duration::ZERO, Duration::ZERO);

        std::fs::write(&paths.progress_file, "frame=10\n").unwrap();
        std::thread::sleep(Duration::from_millis(20));
        assert_eq!(probe.check(), ProgressHealth::Stalled);
    }

    #[test]
    fn non_advancing_frame_is_stalled_once_old_enough() {
        let dir = TempDir::new().unwrap();
        let paths = paths_in(&dir);
        let probe = ProgressProbe::with_thresholds(&paths, Duration::from_secs(3600), Duration::ZERO);

        std::fs::write(&paths.progress_file, "frame=42\n").unwrap();
        std::thread::sleep(Duration::from_millis(20));

        // First observation records the frame; counter has "advanced" from unknown.
        assert_eq!(probe.check(), ProgressHealth::Healthy);
        // Second observation sees the same frame.
        assert_eq!(probe.check(), ProgressHealth::Stalled);
    }
}
