//! Alert events and their webhook presentation.
//!
//! Each event kind carries a fixed title/body template and a severity-derived
//! embed color. Events have no identity beyond their kind; duplicate
//! suppression is the orchestrator's episode latch, not the sink's job.

/// Severity of an alert, mapped onto an embed color.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertSeverity {
    /// Informational (blue).
    Info,
    /// Something needs attention soon (orange).
    Warning,
    /// Operator action required (red).
    Critical,
    /// A previous problem cleared (green).
    Recovery,
}

impl AlertSeverity {
    /// Embed color for this severity.
    pub fn color(self) -> u32 {
        match self {
            Self::Info => 0x3498db,
            Self::Warning => 0xffff00,
            Self::Critical => 0xff0000,
            Self::Recovery => 0x00ff00,
        }
    }
}

/// Events that can trigger alerts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AlertEvent {
    /// The platform refresh token has expired or been revoked.
    CredentialExpired { details: String },
    /// Client credentials were rejected outright.
    CredentialInvalid { details: String },
    /// The refresh token lacks the scope needed to manage broadcasts.
    InsufficientScope { details: String },
    /// Any other platform API failure.
    ApiError { details: String },
    /// The outbound stream was confirmed offline; recovery is starting.
    StreamOffline { attempt: u32 },
    /// The outbound stream is back online.
    StreamRecovered {
        offline_checks: u32,
        total_restarts: u64,
    },
    /// The upstream camera source stopped answering.
    SourceUnreachable { source: String },
    /// The upstream camera source is answering again.
    SourceRecovered { source: String },
    /// The watchdog started monitoring (startup webhook validation).
    WatchdogStarted,
    /// Broadcast visibility was flipped to public.
    VisibilityChanged { title: String, previous: String },
}

impl AlertEvent {
    /// Stable kind name for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::CredentialExpired { .. } => "credential_expired",
            Self::CredentialInvalid { .. } => "credential_invalid",
            Self::InsufficientScope { .. } => "insufficient_scope",
            Self::ApiError { .. } => "api_error",
            Self::StreamOffline { .. } => "stream_offline",
            Self::StreamRecovered { .. } => "stream_recovered",
            Self::SourceUnreachable { .. } => "source_unreachable",
            Self::SourceRecovered { .. } => "source_recovered",
            Self::WatchdogStarted => "watchdog_started",
            Self::VisibilityChanged { .. } => "visibility_changed",
        }
    }

    /// Severity of this event.
    pub fn severity(&self) -> AlertSeverity {
        match self {
            Self::CredentialExpired { .. } | Self::CredentialInvalid { .. } => {
                AlertSeverity::Critical
            }
            Self::InsufficientScope { .. } => AlertSeverity::Warning,
            Self::ApiError { .. } => AlertSeverity::Critical,
            Self::StreamOffline { .. } | Self::SourceUnreachable { .. } => AlertSeverity::Warning,
            Self::StreamRecovered { .. }
            | Self::SourceRecovered { .. }
            | Self::VisibilityChanged { .. }
            | Self::WatchdogStarted => AlertSeverity::Recovery,
        }
    }

    /// Whether the configured operator should be @mentioned.
    pub fn mentions_operator(&self) -> bool {
        !matches!(self, Self::WatchdogStarted | Self::VisibilityChanged { .. })
    }

    /// Embed title.
    pub fn title(&self) -> String {
        match self {
            Self::CredentialExpired { .. } => "🔑 Platform API Token Expired".to_string(),
            Self::CredentialInvalid { .. } => "🔑 Platform API Credentials Invalid".to_string(),
            Self::InsufficientScope { .. } => "🔑 Platform API Scope Error".to_string(),
            Self::ApiError { .. } => "⚠️ Platform API Error".to_string(),
            Self::StreamOffline { .. } => "🔴 Stream Went Offline".to_string(),
            Self::StreamRecovered { .. } => "🟢 Stream Recovered".to_string(),
            Self::SourceUnreachable { .. } => "📷 Camera Source Unreachable".to_string(),
            Self::SourceRecovered { .. } => "📷 Camera Source Recovered".to_string(),
            Self::WatchdogStarted => "Watchdog Started".to_string(),
            Self::VisibilityChanged { .. } => "Broadcast Set to PUBLIC".to_string(),
        }
    }

    /// Embed body (markdown).
    pub fn description(&self) -> String {
        match self {
            Self::CredentialExpired { details } => format!(
                "**The refresh token has expired.**\n\n\
                 Broadcast visibility cannot be managed until it is regenerated.\n\n\
                 **To fix:** re-authorize with the full broadcast scope and update \
                 `YOUTUBE_REFRESH_TOKEN`.\n\n```{details}```"
            ),
            Self::CredentialInvalid { details } => format!(
                "**The platform API credentials were rejected.**\n\n\
                 Check `YOUTUBE_CLIENT_ID` and `YOUTUBE_CLIENT_SECRET`.\n\n```{details}```"
            ),
            Self::InsufficientScope { details } => format!(
                "**The refresh token has insufficient permissions.**\n\n\
                 It was likely generated with a read-only scope. Regenerate it \
                 with the full broadcast-management scope.\n\n```{details}```"
            ),
            Self::ApiError { details } => {
                format!("**A platform API call failed:**\n\n```{details}```")
            }
            Self::StreamOffline { attempt } => format!(
                "**The outbound stream went offline.**\n\n\
                 The watchdog is attempting recovery (attempt #{attempt})."
            ),
            Self::StreamRecovered {
                offline_checks,
                total_restarts,
            } => format!(
                "**The stream is back online** after {offline_checks} offline checks.\n\
                 Total restarts on record: {total_restarts}."
            ),
            Self::SourceUnreachable { source } => format!(
                "**The camera source is not answering.**\n\n\
                 Restarts are paused until `{source}` serves video again."
            ),
            Self::SourceRecovered { source } => {
                format!("`{source}` is serving video again; resuming recovery.")
            }
            Self::WatchdogStarted => {
                "The self-healing watchdog is now monitoring the stream.".to_string()
            }
            Self::VisibilityChanged { title, previous } => format!(
                "**{title}**\n\nVisibility changed from `{previous}` to `public`."
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn severity_maps_to_expected_colors() {
        assert_eq!(
            AlertEvent::CredentialExpired {
                details: "x".into()
            }
            .severity()
            .color(),
            0xff0000
        );
        assert_eq!(
            AlertEvent::StreamOffline { attempt: 1 }.severity().color(),
            0xffff00
        );
        assert_eq!(
            AlertEvent::StreamRecovered {
                offline_checks: 2,
                total_restarts: 3
            }
            .severity()
            .color(),
            0x00ff00
        );
    }

    #[test]
    fn startup_and_visibility_do_not_mention_operator() {
        assert!(!AlertEvent::WatchdogStarted.mentions_operator());
        assert!(
            !AlertEvent::VisibilityChanged {
                title: "t".into(),
                previous: "unlisted".into()
            }
            .mentions_operator()
        );
        assert!(AlertEvent::StreamOffline { attempt: 1 }.mentions_operator());
    }

    #[test]
    fn descriptions_carry_the_failure_details() {
        let event = AlertEvent::InsufficientScope {
            details: "ACCESS_TOKEN_SCOPE_INSUFFICIENT".into(),
        };
        assert!(event.description().contains("ACCESS_TOKEN_SCOPE_INSUFFICIENT"));
        assert_eq!(event.kind(), "insufficient_scope");
    }
}
