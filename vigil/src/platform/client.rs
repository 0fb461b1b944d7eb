//! Broadcast-visibility API client.
//!
//! OAuth2 refresh-token flow against the remote streaming platform: trade
//! the long-lived refresh token for a short-lived access token, read the
//! active broadcast's privacy status, and flip it to public. Every failure
//! comes back as a classified [`PlatformError`], never a panic or a raw
//! transport error.

use std::time::Duration;

use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use super::PlatformError;
use crate::config::PlatformCredentials;

/// OAuth2 token endpoint.
const TOKEN_URL: &str = "https://oauth2.googleapis.com/token";

/// Live-broadcast resource endpoint.
const BROADCASTS_URL: &str = "https://www.googleapis.com/youtube/v3/liveBroadcasts";

/// Bounded timeout for each API call.
const API_TIMEOUT: Duration = Duration::from_secs(10);

/// The active broadcast, as much of it as visibility management needs.
#[derive(Debug, Clone)]
pub struct Broadcast {
    pub id: String,
    pub title: String,
    pub privacy: String,
}

#[derive(Debug, Deserialize)]
struct TokenPayload {
    #[serde(default)]
    access_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct BroadcastList {
    #[serde(default)]
    items: Vec<BroadcastItem>,
}

#[derive(Debug, Deserialize)]
struct BroadcastItem {
    id: String,
    #[serde(default)]
    snippet: Snippet,
    #[serde(default)]
    status: BroadcastStatus,
}

#[derive(Debug, Default, Deserialize)]
struct Snippet {
    #[serde(default)]
    title: String,
}

#[derive(Debug, Default, Deserialize)]
struct BroadcastStatus {
    #[serde(default, rename = "privacyStatus")]
    privacy_status: String,
}

/// Client for the platform's credential-refresh and broadcast endpoints.
pub struct PlatformClient {
    client: Client,
    credentials: PlatformCredentials,
}

impl PlatformClient {
    pub fn new(credentials: PlatformCredentials) -> Self {
        let client = Client::builder()
            .timeout(API_TIMEOUT)
            .user_agent(concat!("vigil/", env!("CARGO_PKG_VERSION")))
            .build()
            .unwrap_or_default();

        Self {
            client,
            credentials,
        }
    }

    /// Exchange the refresh token for a fresh access token.
    pub async fn fetch_access_token(&self) -> Result<String, PlatformError> {
        let response = self
            .client
            .post(TOKEN_URL)
            .form(&[
                ("client_id", self.credentials.client_id.as_str()),
                ("client_secret", self.credentials.client_secret.as_str()),
                ("refresh_token", self.credentials.refresh_token.as_str()),
                ("grant_type", "refresh_token"),
            ])
            .send()
            .await
            .map_err(PlatformError::transport)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(PlatformError::classify(status.as_u16(), &body));
        }

        let payload = response
            .json::<TokenPayload>()
            .await
            .map_err(PlatformError::transport)?;
        payload
            .access_token
            .ok_or_else(|| PlatformError::Api("token response without access_token".into()))
    }

    /// The currently active broadcast, if any.
    pub async fn active_broadcast(
        &self,
        access_token: &str,
    ) -> Result<Option<Broadcast>, PlatformError> {
        let response = self
            .client
            .get(BROADCASTS_URL)
            .query(&[
                ("part", "id,status,snippet"),
                ("broadcastStatus", "active"),
                ("broadcastType", "all"),
            ])
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(PlatformError::transport)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(PlatformError::classify(status.as_u16(), &body));
        }

        let list = response
            .json::<BroadcastList>()
            .await
            .map_err(PlatformError::transport)?;

        Ok(list.items.into_iter().next().map(|item| Broadcast {
            id: item.id,
            title: item.snippet.title,
            privacy: item.status.privacy_status,
        }))
    }

    /// Set a broadcast's visibility to public. Returns the privacy status
    /// the platform reports after the update.
    ///
    /// Only the status part is updated; touching snippet fields on an
    /// active broadcast gets rejected.
    pub async fn set_broadcast_public(
        &self,
        access_token: &str,
        broadcast_id: &str,
    ) -> Result<String, PlatformError> {
        let body = json!({
            "id": broadcast_id,
            "status": { "privacyStatus": "public" }
        });

        let response = self
            .client
            .put(BROADCASTS_URL)
            .query(&[("part", "status")])
            .bearer_auth(access_token)
            .json(&body)
            .send()
            .await
            .map_err(PlatformError::transport)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(PlatformError::classify(status.as_u16(), &body));
        }

        let updated = response
            .json::<BroadcastItem>()
            .await
            .map_err(PlatformError::transport)?;
        debug!(privacy = %updated.status.privacy_status, "broadcast visibility updated");
        Ok(updated.status.privacy_status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn broadcast_list_parses_platform_shape() {
        let raw = r#"{
            "items": [{
                "id": "bcast-1",
                "snippet": { "title": "Harbor cam" },
                "status": { "privacyStatus": "unlisted" }
            }]
        }"#;
        let list: BroadcastList = serde_json::from_str(raw).unwrap();
        assert_eq!(list.items.len(), 1);
        assert_eq!(list.items[0].id, "bcast-1");
        assert_eq!(list.items[0].snippet.title, "Harbor cam");
        assert_eq!(list.items[0].status.privacy_status, "unlisted");
    }

    #[test]
    fn empty_broadcast_list_parses() {
        let list: BroadcastList = serde_json::from_str("{}").unwrap();
        assert!(list.items.is_empty());
    }

    #[test]
    fn token_payload_tolerates_missing_token() {
        let payload: TokenPayload = serde_json::from_str(r#"{"scope":"x"}"#).unwrap();
        assert!(payload.access_token.is_none());
    }
}
