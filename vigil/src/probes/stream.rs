//! Stream-status endpoint probe.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, warn};

use super::{StreamProbe, StreamStatus};

/// Bounded timeout for one status request.
const STATUS_TIMEOUT: Duration = Duration::from_secs(10);

/// Payload served by the status endpoint.
#[derive(Debug, Deserialize)]
struct StatusPayload {
    status: String,
    #[serde(default)]
    viewers: Option<u64>,
    #[serde(default)]
    message: Option<String>,
}

/// Probe polling the configured stream-status endpoint.
pub struct StatusEndpointProbe {
    client: Client,
    url: String,
}

impl StatusEndpointProbe {
    pub fn new(url: impl Into<String>) -> Self {
        let client = Client::builder()
            .timeout(STATUS_TIMEOUT)
            .user_agent(concat!("vigil/", env!("CARGO_PKG_VERSION")))
            .build()
            .unwrap_or_default();

        Self {
            client,
            url: url.into(),
        }
    }

    async fn fetch(&self) -> crate::Result<StatusPayload> {
        let response = self.client.get(&self.url).send().await?;
        let payload = response.error_for_status()?.json::<StatusPayload>().await?;
        Ok(payload)
    }
}

fn classify(payload: StatusPayload) -> StreamStatus {
    match payload.status.as_str() {
        "live" => {
            debug!(viewers = ?payload.viewers, "stream is live");
            StreamStatus::Live {
                viewers: payload.viewers,
            }
        }
        "offline" => {
            debug!(message = ?payload.message, "stream is offline");
            StreamStatus::Offline
        }
        other => {
            warn!(status = %other, "unrecognized status value from endpoint");
            StreamStatus::Error
        }
    }
}

#[async_trait]
impl StreamProbe for StatusEndpointProbe {
    async fn check(&self) -> StreamStatus {
        match self.fetch().await {
            Ok(payload) => classify(payload),
            Err(e) => {
                warn!(error = %e, "stream status check failed");
                StreamStatus::Error
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(raw: &str) -> StatusPayload {
        serde_json::from_str(raw).unwrap()
    }

    #[test]
    fn live_payload_classifies_live_with_viewers() {
        let status = classify(parse(r#"{"status":"live","viewers":5}"#));
        assert_eq!(status, StreamStatus::Live { viewers: Some(5) });
        assert!(status.is_live());
    }

    #[test]
    fn offline_payload_classifies_offline() {
        let status = classify(parse(r#"{"status":"offline","message":"no inbound data"}"#));
        assert_eq!(status, StreamStatus::Offline);
    }

    #[test]
    fn unknown_status_value_classifies_error_not_offline() {
        let status = classify(parse(r#"{"status":"starting"}"#));
        assert_eq!(status, StreamStatus::Error);
    }

    #[test]
    fn malformed_payload_fails_to_parse() {
        assert!(serde_json::from_str::<StatusPayload>(r#"{"viewers":5}"#).is_err());
    }
}
