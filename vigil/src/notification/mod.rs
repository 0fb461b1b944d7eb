//! Best-effort operator alerting.
//!
//! Alerts are a side effect of state transitions, never part of them: the
//! dispatcher hands each event to a spawned task and discards the result, so
//! a dead webhook can never stall or reorder a recovery decision.

mod discord;
mod events;

pub use discord::DiscordNotifier;
pub use events::{AlertEvent, AlertSeverity};

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::Result;

/// Trait for alert delivery channels.
#[async_trait]
pub trait AlertSink: Send + Sync {
    /// Whether the channel is configured to deliver anything.
    fn is_enabled(&self) -> bool;

    /// Deliver one event.
    async fn send(&self, event: &AlertEvent) -> Result<()>;
}

/// Fire-and-forget front end over an [`AlertSink`].
#[derive(Clone)]
pub struct AlertDispatcher {
    sink: Arc<dyn AlertSink>,
}

impl AlertDispatcher {
    pub fn new(sink: Arc<dyn AlertSink>) -> Self {
        Self { sink }
    }

    pub fn is_enabled(&self) -> bool {
        self.sink.is_enabled()
    }

    /// Dispatch an event without awaiting delivery. Failures are logged by
    /// the delivery task and go no further.
    pub fn dispatch(&self, event: AlertEvent) {
        if !self.sink.is_enabled() {
            debug!(kind = event.kind(), "alerting not configured, dropping event");
            return;
        }

        let sink = self.sink.clone();
        tokio::spawn(async move {
            if let Err(e) = sink.send(&event).await {
                warn!(kind = event.kind(), error = %e, "alert delivery failed");
            }
        });
    }

    /// Deliver one event synchronously. Used at startup to validate the
    /// channel; returns whether delivery succeeded.
    pub async fn send_now(&self, event: AlertEvent) -> bool {
        if !self.sink.is_enabled() {
            return false;
        }
        match self.sink.send(&event).await {
            Ok(()) => true,
            Err(e) => {
                warn!(kind = event.kind(), error = %e, "alert delivery failed");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct RecordingSink {
        enabled: bool,
        events: Mutex<Vec<AlertEvent>>,
    }

    #[async_trait]
    impl AlertSink for RecordingSink {
        fn is_enabled(&self) -> bool {
            self.enabled
        }

        async fn send(&self, event: &AlertEvent) -> Result<()> {
            self.events.lock().unwrap().push(event.clone());
            Ok(())
        }
    }

    #[tokio::test]
    async fn dispatch_delivers_through_the_sink() {
        let sink = Arc::new(RecordingSink {
            enabled: true,
            events: Mutex::new(Vec::new()),
        });
        let dispatcher = AlertDispatcher::new(sink.clone());

        dispatcher.dispatch(AlertEvent::WatchdogStarted);
        tokio::task::yield_now().await;

        let events = sink.events.lock().unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind(), "watchdog_started");
    }

    #[tokio::test]
    async fn disabled_sink_drops_events() {
        let sink = Arc::new(RecordingSink {
            enabled: false,
            events: Mutex::new(Vec::new()),
        });
        let dispatcher = AlertDispatcher::new(sink.clone());

        dispatcher.dispatch(AlertEvent::WatchdogStarted);
        assert!(!dispatcher.send_now(AlertEvent::WatchdogStarted).await);
        tokio::task::yield_now().await;

        assert!(sink.events.lock().unwrap().is_empty());
    }
}
