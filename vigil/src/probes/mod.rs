//! Health probes.
//!
//! Each probe answers "is X healthy?" with a classified value. Probe
//! trouble (timeouts, malformed payloads, missing tools) surfaces as a
//! classification, never as an error crossing into the recovery decisions.

mod progress;
mod source;
mod stream;

pub use progress::ProgressProbe;
pub use source::{CameraSourceProbe, mask_credentials};
pub use stream::StatusEndpointProbe;

use async_trait::async_trait;

/// Stream status reported by the remote status endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamStatus {
    /// The outbound stream is live.
    Live { viewers: Option<u64> },
    /// The platform reports the stream offline.
    Offline,
    /// The status could not be determined: transport failure, malformed
    /// payload, or an unrecognized status value. Never counts toward
    /// offline confirmation; a flaky monitoring endpoint must not cause
    /// restarts.
    Error,
}

impl StreamStatus {
    pub fn is_live(&self) -> bool {
        matches!(self, Self::Live { .. })
    }

    pub fn is_offline(&self) -> bool {
        matches!(self, Self::Offline)
    }
}

/// Health of the upstream camera source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceHealth {
    /// Transport reachable and a decodable video stream was observed.
    Healthy,
    /// Transport-level connect failed, or the endpoint accepted the
    /// connection but served no video stream.
    Unreachable,
    /// The frame-probing utility was unavailable; only transport-level
    /// reachability is known.
    Unknown,
}

impl SourceHealth {
    /// Named fallback policy: absence of evidence is not evidence of a dead
    /// camera. `Unknown` permits the restart path, favoring availability
    /// over strict confirmation.
    pub fn permits_restart(&self) -> bool {
        !matches!(self, Self::Unreachable)
    }
}

/// Health of the local media process, judged from its progress artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressHealth {
    /// The artifact is fresh and the frame counter is advancing.
    Healthy,
    /// The artifact is stale or the frame counter stopped advancing.
    Stalled,
    /// No artifact; progress reporting may be legitimately disabled.
    /// Must never by itself trigger a restart.
    Unavailable,
}

/// Seam for the stream-status check so the orchestrator can be driven by
/// scripted statuses in tests.
#[async_trait]
pub trait StreamProbe: Send + Sync {
    async fn check(&self) -> StreamStatus;
}

/// Seam for the camera-source check.
#[async_trait]
pub trait CameraProbe: Send + Sync {
    async fn check(&self) -> SourceHealth;

    /// Source address safe for logs and alerts (credentials masked).
    fn display_address(&self) -> String;
}
