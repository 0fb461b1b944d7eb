//! Persistent recovery state.
//!
//! A single small JSON document survives controller restarts so backoff
//! picks up where it left off instead of hammering the platform after a
//! crash loop. The orchestrator is the only writer.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Durable counters and timestamps for the recovery cycle.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecoveryState {
    /// Consecutive restart attempts since the last confirmed-stable recovery.
    #[serde(default)]
    pub attempt: u32,
    /// Lifetime restart counter; reporting only, never reset.
    #[serde(default)]
    pub total_restarts: u64,
    /// When stability was last (re)confirmed.
    #[serde(default)]
    pub last_healthy: Option<DateTime<Utc>>,
    /// When the last restart attempt was made.
    #[serde(default)]
    pub last_restart: Option<DateTime<Utc>>,
}

impl RecoveryState {
    /// Record one restart decision: exactly +1 on both counters.
    pub fn record_restart(&mut self) {
        self.attempt += 1;
        self.total_restarts += 1;
        self.last_restart = Some(Utc::now());
    }

    /// Clear the backoff counter after a verified-stable recovery.
    pub fn reset_backoff(&mut self) {
        self.attempt = 0;
        self.last_healthy = Some(Utc::now());
    }
}

/// File-backed store for [`RecoveryState`].
pub struct StateStore {
    path: PathBuf,
}

impl StateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Load the persisted state. A missing or corrupt document yields the
    /// zeroed default; state loss must never keep the watchdog from running.
    pub fn load(&self) -> RecoveryState {
        match std::fs::read_to_string(&self.path) {
            Ok(raw) => match serde_json::from_str(&raw) {
                Ok(state) => state,
                Err(e) => {
                    warn!(path = %self.path.display(), error = %e, "corrupt state file, starting fresh");
                    RecoveryState::default()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => RecoveryState::default(),
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "could not read state file, starting fresh");
                RecoveryState::default()
            }
        }
    }

    /// Persist the state synchronously. Failures are logged; losing a save
    /// costs at most one backoff step on the next controller restart.
    pub fn save(&self, state: &RecoveryState) {
        let serialized = match serde_json::to_string(state) {
            Ok(s) => s,
            Err(e) => {
                warn!(error = %e, "could not serialize recovery state");
                return;
            }
        };
        if let Err(e) = std::fs::write(&self.path, serialized) {
            warn!(path = %self.path.display(), error = %e, "could not save recovery state");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn missing_file_loads_defaults() {
        let dir = TempDir::new().unwrap();
        let store = StateStore::new(dir.path().join("state.json"));
        assert_eq!(store.load(), RecoveryState::default());
    }

    #[test]
    fn corrupt_file_loads_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("state.json");
        std::fs::write(&path, "{not json").unwrap();
        assert_eq!(StateStore::new(&path).load(), RecoveryState::default());
    }

    #[test]
    fn save_load_round_trip_is_exact() {
        let dir = TempDir::new().unwrap();
        let store = StateStore::new(dir.path().join("state.json"));

        let mut state = RecoveryState::default();
        state.record_restart();
        state.record_restart();
        state.reset_backoff();
        store.save(&state);

        let loaded = store.load();
        assert_eq!(loaded, state);
        assert_eq!(loaded.attempt, 0);
        assert_eq!(loaded.total_restarts, 2);
        assert!(loaded.last_healthy.is_some());
        assert!(loaded.last_restart.is_some());
    }

    #[test]
    fn record_restart_increments_both_counters_by_one() {
        let mut state = RecoveryState::default();
        state.record_restart();
        assert_eq!(state.attempt, 1);
        assert_eq!(state.total_restarts, 1);

        state.record_restart();
        assert_eq!(state.attempt, 2);
        assert_eq!(state.total_restarts, 2);

        state.reset_backoff();
        assert_eq!(state.attempt, 0);
        // Lifetime counter is never reset.
        assert_eq!(state.total_restarts, 2);
    }

    #[test]
    fn partial_document_fills_missing_fields() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("state.json");
        std::fs::write(&path, r#"{"attempt": 3}"#).unwrap();

        let loaded = StateStore::new(&path).load();
        assert_eq!(loaded.attempt, 3);
        assert_eq!(loaded.total_restarts, 0);
        assert_eq!(loaded.last_healthy, None);
    }
}
