//! Broadcast-visibility governor.
//!
//! Best-effort maintenance layered over the recovery loop: keep the active
//! broadcast public, classify API failures, and keep every one of them away
//! from the stream-recovery decisions. Terminal credential failures alert
//! once and latch the feature off until an operator intervenes.

use tracing::{debug, error, info, warn};

use super::{PlatformClient, PlatformError};
use crate::config::PlatformCredentials;
use crate::notification::{AlertDispatcher, AlertEvent};

/// Governor for the optional visibility feature.
pub struct VisibilityGovernor {
    client: Option<PlatformClient>,
    alerts: AlertDispatcher,
    /// Set when a terminal credential failure disabled the feature.
    disabled_reason: Option<String>,
}

impl VisibilityGovernor {
    pub fn new(credentials: Option<PlatformCredentials>, alerts: AlertDispatcher) -> Self {
        Self {
            client: credentials.map(PlatformClient::new),
            alerts,
            disabled_reason: None,
        }
    }

    /// Whether reconciliation attempts are currently worth making.
    pub fn is_enabled(&self) -> bool {
        self.client.is_some() && self.disabled_reason.is_none()
    }

    /// Startup credential validation. Unconfigured is a valid state;
    /// configured-but-broken alerts and latches, and the watchdog runs on.
    pub async fn validate(&mut self) {
        let Some(client) = &self.client else {
            info!("platform API not configured, broadcast visibility disabled");
            return;
        };

        info!("platform API: validating credentials");
        match client.fetch_access_token().await {
            Ok(_) => info!("platform API: credentials validated"),
            Err(e) => {
                error!(error = %e, "platform API credential validation failed");
                self.handle_failure(e);
            }
        }
    }

    /// Reconcile the active broadcast's visibility to public. Returns
    /// whether the broadcast is known to be public afterwards. Never
    /// raises; every failure is classified, alerted, and absorbed here.
    pub async fn ensure_public(&mut self) -> bool {
        let Some(client) = &self.client else {
            return false;
        };
        if let Some(reason) = &self.disabled_reason {
            debug!(%reason, "visibility feature latched off, skipping reconciliation");
            return false;
        }

        let token = match client.fetch_access_token().await {
            Ok(token) => token,
            Err(e) => {
                self.handle_failure(e);
                return false;
            }
        };

        let broadcast = match client.active_broadcast(&token).await {
            Ok(Some(broadcast)) => broadcast,
            Ok(None) => {
                warn!("no active broadcast found");
                return false;
            }
            Err(e) => {
                self.handle_failure(e);
                return false;
            }
        };

        info!(
            title = %broadcast.title,
            privacy = %broadcast.privacy,
            "active broadcast"
        );

        if broadcast.privacy == "public" {
            debug!("broadcast is already public");
            return true;
        }

        info!(from = %broadcast.privacy, "changing broadcast visibility to public");
        match client.set_broadcast_public(&token, &broadcast.id).await {
            Ok(privacy) if privacy == "public" => {
                self.alerts.dispatch(AlertEvent::VisibilityChanged {
                    title: broadcast.title,
                    previous: broadcast.privacy,
                });
                true
            }
            Ok(privacy) => {
                warn!(%privacy, "platform accepted the update but visibility is not public");
                false
            }
            Err(e) => {
                self.handle_failure(e);
                false
            }
        }
    }

    /// Classify one failure into logging, an alert, and (for terminal
    /// classes) the feature latch.
    fn handle_failure(&mut self, e: PlatformError) {
        let event = match &e {
            PlatformError::CredentialExpired(details) => AlertEvent::CredentialExpired {
                details: details.clone(),
            },
            PlatformError::CredentialInvalid(details) => AlertEvent::CredentialInvalid {
                details: details.clone(),
            },
            PlatformError::InsufficientScope(details) => AlertEvent::InsufficientScope {
                details: details.clone(),
            },
            PlatformError::Api(details) => AlertEvent::ApiError {
                details: details.clone(),
            },
        };

        if e.is_terminal() {
            error!(error = %e, "terminal platform failure, disabling broadcast visibility until fixed");
            self.disabled_reason = Some(e.to_string());
        } else {
            warn!(error = %e, "platform API failure, will retry on the next reconciliation");
        }

        self.alerts.dispatch(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notification::AlertSink;
    use async_trait::async_trait;
    use std::sync::{Arc, Mutex};

    struct RecordingSink(Mutex<Vec<AlertEvent>>);

    #[async_trait]
    impl AlertSink for RecordingSink {
        fn is_enabled(&self) -> bool {
            true
        }

        async fn send(&self, event: &AlertEvent) -> crate::Result<()> {
            self.0.lock().unwrap().push(event.clone());
            Ok(())
        }
    }

    fn governor_with_sink() -> (VisibilityGovernor, Arc<RecordingSink>) {
        let sink = Arc::new(RecordingSink(Mutex::new(Vec::new())));
        let governor = VisibilityGovernor::new(
            Some(PlatformCredentials {
                client_id: "id".into(),
                client_secret: "secret".into(),
                refresh_token: "token".into(),
            }),
            AlertDispatcher::new(sink.clone()),
        );
        (governor, sink)
    }

    #[tokio::test]
    async fn unconfigured_governor_is_disabled_and_quiet() {
        let sink = Arc::new(RecordingSink(Mutex::new(Vec::new())));
        let mut governor = VisibilityGovernor::new(None, AlertDispatcher::new(sink.clone()));

        assert!(!governor.is_enabled());
        governor.validate().await;
        assert!(!governor.ensure_public().await);
        tokio::task::yield_now().await;
        assert!(sink.0.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn terminal_failure_latches_the_feature_off_after_one_alert() {
        let (mut governor, sink) = governor_with_sink();
        assert!(governor.is_enabled());

        governor.handle_failure(PlatformError::CredentialExpired("expired".into()));
        assert!(!governor.is_enabled());

        // A latched governor skips reconciliation without another alert.
        assert!(!governor.ensure_public().await);
        tokio::task::yield_now().await;

        let events = sink.0.lock().unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind(), "credential_expired");
    }

    #[tokio::test]
    async fn generic_failure_keeps_the_feature_enabled() {
        let (mut governor, sink) = governor_with_sink();

        governor.handle_failure(PlatformError::Api("HTTP 503: backend".into()));
        assert!(governor.is_enabled());
        tokio::task::yield_now().await;

        let events = sink.0.lock().unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind(), "api_error");
    }
}
