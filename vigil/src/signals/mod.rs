//! Typed wrappers over the file-based signals shared with the media
//! supervisor.
//!
//! The on-disk contract (pid marker, progress artifact, fallback flag) is an
//! informal IPC surface owned partly by other processes. Each file gets a
//! small typed reader/writer here so the control logic only ever sees parsed
//! values; unreadable or malformed content maps to an absent/default value,
//! never to an error crossing into the recovery decisions.

use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use tracing::debug;

/// Read-only pid marker of the externally-managed media process.
pub struct PidFile {
    path: PathBuf,
}

impl PidFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Read the pid, if the marker exists and holds one.
    pub fn read(&self) -> Option<u32> {
        let raw = std::fs::read_to_string(&self.path).ok()?;
        raw.trim().parse::<u32>().ok()
    }
}

/// Parsed view of the progress artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Progress {
    /// Monotonic frame counter, when the artifact carries one.
    pub frame: Option<u64>,
}

/// Progress artifact written periodically by the media process
/// (`key=value` lines, at least `frame=<int>` once encoding has started).
pub struct ProgressFile {
    path: PathBuf,
}

impl ProgressFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Whether the artifact exists at all. Progress reporting may be
    /// legitimately disabled, so absence is not a failure signal.
    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Age of the artifact since its last modification.
    pub fn age(&self) -> Option<Duration> {
        let modified = std::fs::metadata(&self.path).ok()?.modified().ok()?;
        SystemTime::now().duration_since(modified).ok()
    }

    /// Parse the artifact. `None` when it cannot be read at all.
    pub fn read(&self) -> Option<Progress> {
        let raw = std::fs::read_to_string(&self.path).ok()?;
        Some(parse_progress(&raw))
    }

    /// Remove the artifact so post-restart health reads start clean.
    pub fn clear(&self) {
        remove_quietly(&self.path);
    }
}

fn parse_progress(raw: &str) -> Progress {
    let frame = raw
        .lines()
        .filter_map(|line| line.strip_prefix("frame="))
        .filter_map(|value| value.trim().parse::<u64>().ok())
        .next_back();
    Progress { frame }
}

/// Transient marker holding the last frame counter the watchdog observed,
/// used to detect a stalled (non-advancing) encoder between two polls.
pub struct LastFrameMarker {
    path: PathBuf,
}

impl LastFrameMarker {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn read(&self) -> Option<u64> {
        let raw = std::fs::read_to_string(&self.path).ok()?;
        raw.trim().parse::<u64>().ok()
    }

    /// Best-effort write; a failed write only costs one stall observation.
    pub fn write(&self, frame: u64) {
        if let Err(e) = std::fs::write(&self.path, frame.to_string()) {
            debug!(path = %self.path.display(), error = %e, "could not write frame marker");
        }
    }

    pub fn clear(&self) {
        remove_quietly(&self.path);
    }
}

/// Operating mode published by the media supervisor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StreamMode {
    /// Live camera feed.
    #[default]
    Normal,
    /// Placeholder feed substituted for a dead camera; the supervisor is
    /// already remediating the outage.
    Fallback,
}

/// Read-only fallback/degraded-mode flag file (single word).
pub struct FallbackFlag {
    path: PathBuf,
}

impl FallbackFlag {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Absent, unreadable, or unrecognized content all read as [`StreamMode::Normal`].
    pub fn read(&self) -> StreamMode {
        match std::fs::read_to_string(&self.path) {
            Ok(raw) if raw.trim().eq_ignore_ascii_case("fallback") => StreamMode::Fallback,
            _ => StreamMode::Normal,
        }
    }
}

fn remove_quietly(path: &Path) {
    match std::fs::remove_file(path) {
        Ok(()) => debug!(path = %path.display(), "removed signal file"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => debug!(path = %path.display(), error = %e, "could not remove signal file"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn pid_file_parses_trimmed_integer() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("media.pid");
        std::fs::write(&path, " 4242 \n").unwrap();
        assert_eq!(PidFile::new(&path).read(), Some(4242));
    }

    #[test]
    fn pid_file_absent_or_garbage_is_none() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("media.pid");
        assert_eq!(PidFile::new(&path).read(), None);
        std::fs::write(&path, "not-a-pid").unwrap();
        assert_eq!(PidFile::new(&path).read(), None);
    }

    #[test]
    fn progress_takes_last_frame_line() {
        let parsed = parse_progress("bitrate=900k\nframe=10\nfps=25\nframe=37\n");
        assert_eq!(parsed.frame, Some(37));
    }

    #[test]
    fn progress_without_frame_line_is_frameless() {
        let parsed = parse_progress("bitrate=900k\nspeed=1.0x\n");
        assert_eq!(parsed.frame, None);
    }

    #[test]
    fn progress_clear_tolerates_missing_file() {
        let dir = TempDir::new().unwrap();
        let progress = ProgressFile::new(dir.path().join("progress.txt"));
        progress.clear();
        progress.clear();
        assert!(!progress.exists());
    }

    #[test]
    fn last_frame_marker_round_trip() {
        let dir = TempDir::new().unwrap();
        let marker = LastFrameMarker::new(dir.path().join("last_frame"));
        assert_eq!(marker.read(), None);
        marker.write(99);
        assert_eq!(marker.read(), Some(99));
        marker.clear();
        assert_eq!(marker.read(), None);
    }

    #[test]
    fn fallback_flag_defaults_to_normal() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("stream_mode");
        let flag = FallbackFlag::new(&path);
        assert_eq!(flag.read(), StreamMode::Normal);

        std::fs::write(&path, "garbage").unwrap();
        assert_eq!(flag.read(), StreamMode::Normal);

        std::fs::write(&path, "fallback\n").unwrap();
        assert_eq!(flag.read(), StreamMode::Fallback);

        std::fs::write(&path, "normal\n").unwrap();
        assert_eq!(flag.read(), StreamMode::Normal);
    }
}
