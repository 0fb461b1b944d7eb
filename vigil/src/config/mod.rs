//! Watchdog configuration.
//!
//! One immutable [`WatchdogConfig`] is constructed from the environment at
//! startup (after `dotenvy` has loaded any `.env` file) and passed by
//! reference into every component. Component logic never reads ambient
//! environment variables itself.
//!
//! Every optional feature (broadcast visibility, webhook alerts, camera
//! health gating) is disabled by leaving its variables unset; absence is a
//! valid configuration, never a startup failure.

use std::path::PathBuf;
use std::time::Duration;

use tracing::warn;

/// Default poll interval between stream status checks.
pub const DEFAULT_CHECK_INTERVAL: Duration = Duration::from_secs(30);

/// Default base delay for the restart backoff.
pub const DEFAULT_INITIAL_DELAY: Duration = Duration::from_secs(10);

/// Default floor applied after jitter.
pub const DEFAULT_MIN_DELAY: Duration = Duration::from_secs(5);

/// Default backoff ceiling (15 minutes).
pub const DEFAULT_MAX_DELAY: Duration = Duration::from_secs(900);

/// Default contiguous-live duration required to declare recovery.
pub const DEFAULT_STABILITY_THRESHOLD: Duration = Duration::from_secs(30);

/// Default post-restart verification window.
pub const DEFAULT_VERIFICATION_WINDOW: Duration = Duration::from_secs(60);

/// Default startup grace before the first status check.
pub const DEFAULT_STARTUP_GRACE: Duration = Duration::from_secs(60);

/// Default consecutive offline readings required to confirm an outage.
pub const DEFAULT_OFFLINE_CONFIRMATIONS: u32 = 2;

/// Default ceiling on waiting for the camera source to come back.
pub const DEFAULT_SOURCE_RECOVERY_WAIT: Duration = Duration::from_secs(300);

/// Credentials for the remote platform's broadcast-visibility API.
///
/// All three values are required for the feature; a partial triple is
/// treated as unconfigured.
#[derive(Debug, Clone)]
pub struct PlatformCredentials {
    pub client_id: String,
    pub client_secret: String,
    pub refresh_token: String,
}

/// Webhook alerting settings.
#[derive(Debug, Clone, Default)]
pub struct WebhookSettings {
    /// Webhook URL; unset disables alerting.
    pub url: Option<String>,
    /// Optional user id to @mention on operator-attention alerts.
    pub mention_user_id: Option<String>,
}

impl WebhookSettings {
    pub fn is_configured(&self) -> bool {
        self.url.as_deref().is_some_and(|u| !u.is_empty())
    }
}

/// Upstream camera source settings.
#[derive(Debug, Clone)]
pub struct SourceSettings {
    /// Camera source address (`scheme://[user:pass@]host[:port][/path]`).
    /// Unset disables the source-recovery gate.
    pub url: Option<String>,
    /// Whether the two-stage camera health check runs at all.
    pub check_enabled: bool,
    /// How long to wait for an unreachable source before giving up for this
    /// episode.
    pub recovery_wait: Duration,
}

impl Default for SourceSettings {
    fn default() -> Self {
        Self {
            url: None,
            check_enabled: true,
            recovery_wait: DEFAULT_SOURCE_RECOVERY_WAIT,
        }
    }
}

/// On-disk contact points shared with the media supervisor.
#[derive(Debug, Clone)]
pub struct SignalPaths {
    /// Pid marker of the externally-managed media process (read-only here).
    pub pid_file: PathBuf,
    /// Progress artifact written by the media process.
    pub progress_file: PathBuf,
    /// Transient last-observed-frame marker owned by the watchdog.
    pub last_frame_file: PathBuf,
    /// Persisted recovery state document.
    pub state_file: PathBuf,
    /// Fallback/degraded-mode flag written by the media supervisor.
    pub fallback_flag_file: PathBuf,
    /// Directory for rotated log files.
    pub log_dir: PathBuf,
}

impl Default for SignalPaths {
    fn default() -> Self {
        Self {
            pid_file: PathBuf::from("/config/youtube_restreamer.pid"),
            progress_file: PathBuf::from("/config/ffmpeg_progress.txt"),
            last_frame_file: PathBuf::from("/tmp/watchdog_last_frame"),
            state_file: PathBuf::from("/config/watchdog_state.json"),
            fallback_flag_file: PathBuf::from("/config/stream_mode"),
            log_dir: PathBuf::from("/config/logs"),
        }
    }
}

/// Immutable watchdog configuration.
#[derive(Debug, Clone)]
pub struct WatchdogConfig {
    /// Master enable flag.
    pub enabled: bool,
    /// Stream-status endpoint URL. Required for the watchdog to run.
    pub status_url: String,
    /// Poll interval between status checks while monitoring.
    pub check_interval: Duration,
    /// Base delay for the restart backoff.
    pub initial_delay: Duration,
    /// Floor applied to the jittered delay.
    pub min_delay: Duration,
    /// Backoff ceiling.
    pub max_delay: Duration,
    /// Contiguous-live duration required to declare a recovery stable.
    pub stability_threshold: Duration,
    /// Total post-restart verification window.
    pub verification_window: Duration,
    /// Grace period before the first status check.
    pub startup_grace: Duration,
    /// Consecutive offline readings required before recovery starts.
    pub offline_confirmations: u32,
    /// Camera source settings.
    pub source: SourceSettings,
    /// Broadcast-visibility credentials; `None` disables the feature.
    pub credentials: Option<PlatformCredentials>,
    /// Webhook alerting settings.
    pub webhook: WebhookSettings,
    /// File contact points.
    pub paths: SignalPaths,
    /// Verbose (debug-level) logging.
    pub verbose: bool,
}

impl Default for WatchdogConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            status_url: String::new(),
            check_interval: DEFAULT_CHECK_INTERVAL,
            initial_delay: DEFAULT_INITIAL_DELAY,
            min_delay: DEFAULT_MIN_DELAY,
            max_delay: DEFAULT_MAX_DELAY,
            stability_threshold: DEFAULT_STABILITY_THRESHOLD,
            verification_window: DEFAULT_VERIFICATION_WINDOW,
            startup_grace: DEFAULT_STARTUP_GRACE,
            offline_confirmations: DEFAULT_OFFLINE_CONFIRMATIONS,
            source: SourceSettings::default(),
            credentials: None,
            webhook: WebhookSettings::default(),
            paths: SignalPaths::default(),
            verbose: false,
        }
    }
}

impl WatchdogConfig {
    /// Build the configuration from the process environment.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let credentials = match (
            non_empty_var("YOUTUBE_CLIENT_ID"),
            non_empty_var("YOUTUBE_CLIENT_SECRET"),
            non_empty_var("YOUTUBE_REFRESH_TOKEN"),
        ) {
            (Some(client_id), Some(client_secret), Some(refresh_token)) => {
                Some(PlatformCredentials {
                    client_id,
                    client_secret,
                    refresh_token,
                })
            }
            (None, None, None) => None,
            _ => {
                warn!("partial platform credential triple; broadcast visibility disabled");
                None
            }
        };

        Self {
            enabled: bool_var("WATCHDOG_ENABLED", defaults.enabled),
            status_url: non_empty_var("WATCHDOG_STATUS_URL").unwrap_or_default(),
            check_interval: secs_var("WATCHDOG_CHECK_INTERVAL", defaults.check_interval),
            initial_delay: secs_var("WATCHDOG_INITIAL_DELAY", defaults.initial_delay),
            min_delay: secs_var("WATCHDOG_MIN_DELAY", defaults.min_delay),
            max_delay: secs_var("WATCHDOG_MAX_DELAY", defaults.max_delay),
            stability_threshold: secs_var(
                "WATCHDOG_STABILITY_THRESHOLD",
                defaults.stability_threshold,
            ),
            verification_window: secs_var(
                "WATCHDOG_VERIFICATION_WINDOW",
                defaults.verification_window,
            ),
            startup_grace: secs_var("WATCHDOG_STARTUP_GRACE", defaults.startup_grace),
            offline_confirmations: u32_var(
                "WATCHDOG_OFFLINE_CONFIRMATIONS",
                defaults.offline_confirmations,
            ),
            source: SourceSettings {
                url: non_empty_var("CAMERA_SOURCE_URL"),
                check_enabled: bool_var("CAMERA_HEALTH_CHECK", true),
                recovery_wait: secs_var("CAMERA_RECOVERY_WAIT", DEFAULT_SOURCE_RECOVERY_WAIT),
            },
            credentials,
            webhook: WebhookSettings {
                url: non_empty_var("DISCORD_WEBHOOK_URL"),
                mention_user_id: non_empty_var("DISCORD_USER_ID"),
            },
            paths: SignalPaths {
                pid_file: path_var("WATCHDOG_PID_FILE", defaults.paths.pid_file),
                progress_file: path_var("WATCHDOG_PROGRESS_FILE", defaults.paths.progress_file),
                last_frame_file: path_var(
                    "WATCHDOG_LAST_FRAME_FILE",
                    defaults.paths.last_frame_file,
                ),
                state_file: path_var("WATCHDOG_STATE_FILE", defaults.paths.state_file),
                fallback_flag_file: path_var(
                    "WATCHDOG_FALLBACK_FLAG_FILE",
                    defaults.paths.fallback_flag_file,
                ),
                log_dir: path_var("WATCHDOG_LOG_DIR", defaults.paths.log_dir),
            },
            verbose: bool_var("WATCHDOG_VERBOSE", false),
        }
    }

    /// Whether the broadcast-visibility feature is configured.
    pub fn visibility_configured(&self) -> bool {
        self.credentials.is_some()
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn bool_var(name: &str, default: bool) -> bool {
    match non_empty_var(name) {
        Some(raw) => matches!(raw.to_ascii_lowercase().as_str(), "true" | "1" | "yes" | "on"),
        None => default,
    }
}

fn secs_var(name: &str, default: Duration) -> Duration {
    match non_empty_var(name) {
        Some(raw) => match raw.parse::<u64>() {
            Ok(secs) => Duration::from_secs(secs),
            Err(_) => {
                warn!(%name, value = %raw, "invalid duration value, using default");
                default
            }
        },
        None => default,
    }
}

fn u32_var(name: &str, default: u32) -> u32 {
    match non_empty_var(name) {
        Some(raw) => match raw.parse::<u32>() {
            Ok(value) => value,
            Err(_) => {
                warn!(%name, value = %raw, "invalid integer value, using default");
                default
            }
        },
        None => default,
    }
}

fn path_var(name: &str, default: PathBuf) -> PathBuf {
    non_empty_var(name).map(PathBuf::from).unwrap_or(default)
}
