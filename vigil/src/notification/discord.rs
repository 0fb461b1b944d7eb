//! Discord webhook alert sink.

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use serde_json::json;

use super::{AlertEvent, AlertSink};
use crate::Result;
use crate::config::WebhookSettings;

/// Bounded timeout for one webhook delivery.
const WEBHOOK_TIMEOUT: Duration = Duration::from_secs(10);

/// Discord acknowledges webhook posts with 204 No Content.
const WEBHOOK_SUCCESS: u16 = 204;

/// Alert sink delivering to a Discord webhook.
pub struct DiscordNotifier {
    settings: WebhookSettings,
    client: Client,
}

impl DiscordNotifier {
    pub fn new(settings: WebhookSettings) -> Self {
        let client = Client::builder()
            .timeout(WEBHOOK_TIMEOUT)
            .user_agent(concat!("vigil/", env!("CARGO_PKG_VERSION")))
            .build()
            .unwrap_or_default();

        Self { settings, client }
    }

    fn build_payload(&self, event: &AlertEvent) -> serde_json::Value {
        let mention = match (&self.settings.mention_user_id, event.mentions_operator()) {
            (Some(user_id), true) => format!("<@{user_id}>"),
            _ => String::new(),
        };

        json!({
            "content": mention,
            "embeds": [{
                "title": event.title(),
                "description": event.description(),
                "color": event.severity().color(),
                "timestamp": Utc::now().to_rfc3339(),
                "footer": { "text": "vigil watchdog" }
            }]
        })
    }
}

#[async_trait]
impl AlertSink for DiscordNotifier {
    fn is_enabled(&self) -> bool {
        self.settings.is_configured()
    }

    async fn send(&self, event: &AlertEvent) -> Result<()> {
        let Some(url) = self.settings.url.as_deref() else {
            return Ok(());
        };

        let payload = self.build_payload(event);
        let response = self.client.post(url).json(&payload).send().await?;

        let status = response.status();
        if status.as_u16() != WEBHOOK_SUCCESS {
            let body = response.text().await.unwrap_or_default();
            return Err(crate::Error::other(format!(
                "webhook delivery failed: {} - {}",
                status, body
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(mention: Option<&str>) -> WebhookSettings {
        WebhookSettings {
            url: Some("https://discord.example/webhook".into()),
            mention_user_id: mention.map(str::to_string),
        }
    }

    #[test]
    fn unconfigured_sink_is_disabled() {
        let sink = DiscordNotifier::new(WebhookSettings::default());
        assert!(!sink.is_enabled());
        assert!(DiscordNotifier::new(settings(None)).is_enabled());
    }

    #[test]
    fn payload_mentions_operator_on_failures_only() {
        let sink = DiscordNotifier::new(settings(Some("1234")));

        let offline = sink.build_payload(&AlertEvent::StreamOffline { attempt: 1 });
        assert_eq!(offline["content"], "<@1234>");

        let started = sink.build_payload(&AlertEvent::WatchdogStarted);
        assert_eq!(started["content"], "");
    }

    #[test]
    fn payload_embed_carries_template_fields() {
        let sink = DiscordNotifier::new(settings(None));
        let payload = sink.build_payload(&AlertEvent::StreamRecovered {
            offline_checks: 3,
            total_restarts: 7,
        });

        let embed = &payload["embeds"][0];
        assert!(embed["title"].as_str().unwrap().contains("Recovered"));
        assert!(embed["description"].as_str().unwrap().contains("7"));
        assert_eq!(embed["color"], 0x00ff00);
        assert_eq!(embed["footer"]["text"], "vigil watchdog");
    }
}
