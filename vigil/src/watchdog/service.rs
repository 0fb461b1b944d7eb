//! Recovery orchestrator.
//!
//! A polling state machine over the health probes:
//!
//! ```text
//! Monitoring -> ConfirmingFailure -> AwaitingSourceRecovery
//!     ^                                      |
//!     |                                      v
//!     +---- VerifyingRecovery <---------- Restarting
//! ```
//!
//! One pass of [`Watchdog::poll_cycle`] advances the machine until it is
//! back to idle monitoring; the outer loop paces passes by the configured
//! check interval. All waiting is explicit, bounded sleeping that races the
//! cancellation token, so an interrupt lands between (or inside) sleeps and
//! exits cleanly.

use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::backoff::BackoffPolicy;
use crate::config::WatchdogConfig;
use crate::notification::{AlertDispatcher, AlertEvent};
use crate::platform::VisibilityGovernor;
use crate::probes::{
    CameraProbe, ProgressHealth, ProgressProbe, SourceHealth, StreamProbe, StreamStatus,
};
use crate::process::ProcessController;
use crate::signals::{FallbackFlag, LastFrameMarker, ProgressFile, StreamMode};
use crate::state::{RecoveryState, StateStore};

/// Poll interval while waiting for an unreachable camera source.
const SOURCE_POLL_INTERVAL: Duration = Duration::from_secs(10);

/// How often to reconcile broadcast visibility while the stream is live.
const VISIBILITY_RECONCILE_INTERVAL: Duration = Duration::from_secs(300);

/// Settle time between a restart and the first verification poll.
const VERIFY_SETTLE: Duration = Duration::from_secs(20);

/// Poll interval inside the verification window.
const VERIFY_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Short pause before the post-recovery visibility check; the platform
/// needs a moment to see the re-established ingest.
const RECOVERY_VISIBILITY_SETTLE: Duration = Duration::from_secs(10);

/// Named states of the recovery machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Poll stream status on the fixed interval.
    Monitoring,
    /// Offline confirmed by the counter; decide whether recovery is ours.
    ConfirmingFailure,
    /// Hold restarts while the camera source is down.
    AwaitingSourceRecovery,
    /// Stop the encoder and wait out the backoff delay.
    Restarting,
    /// Watch the stream for contiguous liveness before declaring success.
    VerifyingRecovery,
}

/// Where the machine goes after a phase handler runs.
enum Transition {
    To(Phase),
    /// Back to idle; the outer loop waits one check interval.
    Idle,
}

/// The recovery orchestrator.
pub struct Watchdog {
    config: WatchdogConfig,
    stream_probe: Arc<dyn StreamProbe>,
    camera_probe: Option<Arc<dyn CameraProbe>>,
    progress_probe: ProgressProbe,
    controller: Arc<dyn ProcessController>,
    alerts: AlertDispatcher,
    governor: VisibilityGovernor,
    fallback_flag: FallbackFlag,
    store: StateStore,
    state: RecoveryState,
    backoff: BackoffPolicy,
    cancel: CancellationToken,

    /// Consecutive offline readings; reset by any live reading.
    consecutive_offline: u32,
    /// Episode latch: an offline alert fired and no recovered alert yet.
    alerted_offline: bool,
    /// Episode latch for the camera-source down alert.
    alerted_source: bool,
    /// Monotonic timestamp of the last restart this process made.
    last_restart_at: Option<Instant>,
    /// Monotonic timestamp of the last visibility reconciliation.
    last_visibility_check: Option<Instant>,
}

impl Watchdog {
    pub fn new(
        config: WatchdogConfig,
        stream_probe: Arc<dyn StreamProbe>,
        camera_probe: Option<Arc<dyn CameraProbe>>,
        controller: Arc<dyn ProcessController>,
        alerts: AlertDispatcher,
        governor: VisibilityGovernor,
        cancel: CancellationToken,
    ) -> Self {
        let store = StateStore::new(&config.paths.state_file);
        let state = store.load();
        let backoff = BackoffPolicy::new(config.initial_delay, config.max_delay, config.min_delay);
        let progress_probe = ProgressProbe::new(&config.paths);
        let fallback_flag = FallbackFlag::new(&config.paths.fallback_flag_file);

        Self {
            config,
            stream_probe,
            camera_probe,
            progress_probe,
            controller,
            alerts,
            governor,
            fallback_flag,
            store,
            state,
            backoff,
            cancel,
            consecutive_offline: 0,
            alerted_offline: false,
            alerted_source: false,
            last_restart_at: None,
            last_visibility_check: None,
        }
    }

    /// Current durable recovery state.
    pub fn recovery_state(&self) -> &RecoveryState {
        &self.state
    }

    /// Current consecutive-offline reading count.
    pub fn offline_checks(&self) -> u32 {
        self.consecutive_offline
    }

    /// Run until cancelled.
    pub async fn run(&mut self) {
        if !self.config.enabled {
            info!("watchdog is disabled");
            return;
        }
        if self.config.status_url.is_empty() {
            error!("no status endpoint configured, watchdog cannot run");
            return;
        }

        self.startup().await;

        while !self.cancel.is_cancelled() {
            // A panicking iteration must not take the controller down; log
            // it and keep polling.
            if let Err(panic) = std::panic::AssertUnwindSafe(self.poll_cycle())
                .catch_unwind()
                .await
            {
                let detail = panic
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| panic.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "non-string panic payload".into());
                error!(%detail, "watchdog iteration panicked, continuing");
            }

            if !self.pause(self.config.check_interval).await {
                break;
            }
        }
        info!("watchdog stopped");
    }

    /// One pass of the machine: a monitoring poll plus whatever recovery
    /// sequence it triggers, run to completion or cancellation.
    pub async fn poll_cycle(&mut self) {
        let mut phase = Phase::Monitoring;
        loop {
            if self.cancel.is_cancelled() {
                return;
            }
            debug!(?phase, "entering phase");
            let transition = match phase {
                Phase::Monitoring => self.monitor_tick().await,
                Phase::ConfirmingFailure => self.confirm_failure(),
                Phase::AwaitingSourceRecovery => self.await_source_recovery().await,
                Phase::Restarting => self.restart().await,
                Phase::VerifyingRecovery => self.verify_recovery().await,
            };
            match transition {
                Transition::To(next) => phase = next,
                Transition::Idle => return,
            }
        }
    }

    /// Startup validation and grace period.
    async fn startup(&mut self) {
        info!("==================================================");
        info!("self-healing watchdog starting");
        info!(status_url = %self.config.status_url, "status endpoint");
        info!(
            check_interval_secs = self.config.check_interval.as_secs(),
            initial_delay_secs = self.config.initial_delay.as_secs(),
            max_delay_secs = self.config.max_delay.as_secs(),
            stability_secs = self.config.stability_threshold.as_secs(),
            "timing configuration"
        );
        info!("==================================================");

        // Webhook first, so credential validation below can alert.
        if self.alerts.is_enabled() {
            if self.alerts.send_now(AlertEvent::WatchdogStarted).await {
                info!("alert webhook validated");
            } else {
                warn!("alert webhook test delivery failed, check the webhook URL");
            }
        } else {
            info!("alerting not configured");
        }

        self.governor.validate().await;

        info!(
            grace_secs = self.config.startup_grace.as_secs(),
            "waiting out startup grace period"
        );
        self.pause(self.config.startup_grace).await;
    }

    /// `Monitoring`: classify one status poll.
    async fn monitor_tick(&mut self) -> Transition {
        match self.stream_probe.check().await {
            StreamStatus::Live { viewers } => {
                self.on_live(viewers).await;
                Transition::Idle
            }
            StreamStatus::Offline => {
                self.consecutive_offline += 1;
                warn!(
                    consecutive = self.consecutive_offline,
                    threshold = self.config.offline_confirmations,
                    "stream is offline"
                );
                if self.consecutive_offline >= self.config.offline_confirmations {
                    Transition::To(Phase::ConfirmingFailure)
                } else {
                    Transition::Idle
                }
            }
            // A flaky status endpoint is not an offline stream; leave the
            // counter untouched and try again next tick.
            StreamStatus::Error => {
                warn!("status check failed, retrying next tick");
                Transition::Idle
            }
        }
    }

    /// Live handling: episode closure, backoff reset, advisory progress
    /// observation, periodic visibility reconciliation.
    async fn on_live(&mut self, viewers: Option<u64>) {
        if self.consecutive_offline > 0 {
            let offline_checks = self.consecutive_offline;
            info!(offline_checks, "stream recovered on its own");
            self.consecutive_offline = 0;
            if self.alerted_offline {
                self.alerts.dispatch(AlertEvent::StreamRecovered {
                    offline_checks,
                    total_restarts: self.state.total_restarts,
                });
                self.alerted_offline = false;
            }
        }

        debug!(?viewers, "stream is live");

        if self.state.attempt > 0 && self.stable_since_restart() {
            self.state.reset_backoff();
            self.store.save(&self.state);
            info!("backoff counter reset after stable connection");
        } else if self.state.last_healthy.is_none() {
            self.state.reset_backoff();
            self.store.save(&self.state);
        }

        // Secondary indicator only: a stalled encoder despite a live status
        // is logged and watched, never restarted on directly.
        match self.progress_probe.check() {
            ProgressHealth::Stalled => {
                warn!("encoder progress check failed despite live status, monitoring");
            }
            ProgressHealth::Healthy | ProgressHealth::Unavailable => {}
        }

        if self.visibility_due() {
            self.governor.ensure_public().await;
            self.last_visibility_check = Some(Instant::now());
        }
    }

    fn stable_since_restart(&self) -> bool {
        match self.last_restart_at {
            Some(at) => at.elapsed() >= self.config.stability_threshold,
            None => true,
        }
    }

    fn visibility_due(&self) -> bool {
        self.governor.is_enabled()
            && self
                .last_visibility_check
                .is_none_or(|at| at.elapsed() >= VISIBILITY_RECONCILE_INTERVAL)
    }

    /// `ConfirmingFailure`: stand down if an external supervisor is already
    /// remediating, otherwise open the failure episode.
    fn confirm_failure(&mut self) -> Transition {
        if self.fallback_flag.read() == StreamMode::Fallback {
            info!("supervisor is serving fallback content, standing down");
            self.consecutive_offline = 0;
            return Transition::Idle;
        }

        warn!("stream confirmed offline, initiating recovery");
        if !self.alerted_offline {
            self.alerts.dispatch(AlertEvent::StreamOffline {
                attempt: self.state.attempt + 1,
            });
            self.alerted_offline = true;
        }
        Transition::To(Phase::AwaitingSourceRecovery)
    }

    /// `AwaitingSourceRecovery`: restarting the encoder is pointless while
    /// the camera is down; hold here up to the wait ceiling.
    async fn await_source_recovery(&mut self) -> Transition {
        let Some(probe) = self.camera_probe.clone() else {
            return Transition::To(Phase::Restarting);
        };

        let deadline = Instant::now() + self.config.source.recovery_wait;
        loop {
            let health = probe.check().await;
            if health.permits_restart() {
                if health == SourceHealth::Unknown {
                    debug!("camera health unknown, proceeding on the availability policy");
                }
                if self.alerted_source {
                    self.alerts.dispatch(AlertEvent::SourceRecovered {
                        source: probe.display_address(),
                    });
                    self.alerted_source = false;
                }
                return Transition::To(Phase::Restarting);
            }

            if !self.alerted_source {
                warn!(source = %probe.display_address(), "camera source unreachable, holding restarts");
                self.alerts.dispatch(AlertEvent::SourceUnreachable {
                    source: probe.display_address(),
                });
                self.alerted_source = true;
            }

            if Instant::now() >= deadline {
                warn!(
                    waited_secs = self.config.source.recovery_wait.as_secs(),
                    "camera source still unreachable, retrying the whole sequence next cycle"
                );
                // Offline counter stays put so the next tick re-confirms.
                return Transition::Idle;
            }

            if !self.pause(SOURCE_POLL_INTERVAL).await {
                return Transition::Idle;
            }
        }
    }

    /// `Restarting`: backoff bookkeeping, graceful stop, then a clean slate
    /// for the health probes.
    async fn restart(&mut self) -> Transition {
        // The delay is computed from the attempt count as read before this
        // restart is recorded.
        let delay = self.backoff.delay_for_attempt(self.state.attempt);
        self.state.record_restart();
        self.store.save(&self.state);
        self.last_restart_at = Some(Instant::now());

        info!(
            attempt = self.state.attempt,
            total_restarts = self.state.total_restarts,
            delay_secs = delay.as_secs(),
            "initiating stream restart"
        );

        let outcome = self.controller.stop().await;
        debug!(?outcome, "process controller finished");

        info!(delay_secs = delay.as_secs(), "holding before the supervisor relaunches");
        if !self.pause(delay).await {
            return Transition::Idle;
        }

        // Clear transient artifacts so the next progress read starts clean.
        ProgressFile::new(&self.config.paths.progress_file).clear();
        LastFrameMarker::new(&self.config.paths.last_frame_file).clear();

        Transition::To(Phase::VerifyingRecovery)
    }

    /// `VerifyingRecovery`: require a contiguous stretch of live readings
    /// inside a bounded window before declaring the episode over.
    async fn verify_recovery(&mut self) -> Transition {
        info!(
            settle_secs = VERIFY_SETTLE.as_secs(),
            "waiting for the stream to stabilize"
        );
        if !self.pause(VERIFY_SETTLE).await {
            return Transition::Idle;
        }

        let deadline = Instant::now() + self.config.verification_window;
        let mut contiguous = Duration::ZERO;

        loop {
            let status = self.stream_probe.check().await;
            if status.is_live() {
                contiguous += VERIFY_POLL_INTERVAL;
                info!(
                    stable_secs = contiguous.as_secs(),
                    needed_secs = self.config.stability_threshold.as_secs(),
                    "stream live during verification"
                );
                if contiguous >= self.config.stability_threshold {
                    info!("stream verified stable");
                    self.on_recovery_verified().await;
                    return Transition::Idle;
                }
            } else {
                // Any non-live reading restarts the contiguous requirement.
                contiguous = Duration::ZERO;
                warn!(?status, "stream not live during verification");
            }

            if Instant::now() >= deadline {
                warn!("stream did not stabilize within the verification window, will retry next cycle");
                // Counter stays at/above the threshold; the next cycle
                // re-runs the sequence with a larger backoff.
                return Transition::Idle;
            }

            if !self.pause(VERIFY_POLL_INTERVAL).await {
                return Transition::Idle;
            }
        }
    }

    /// Episode closure after a verified recovery.
    async fn on_recovery_verified(&mut self) {
        let offline_checks = self.consecutive_offline;
        self.consecutive_offline = 0;

        if self.governor.is_enabled() {
            info!("checking broadcast visibility after recovery");
            if self.pause(RECOVERY_VISIBILITY_SETTLE).await {
                self.governor.ensure_public().await;
                self.last_visibility_check = Some(Instant::now());
            }
        }

        self.alerts.dispatch(AlertEvent::StreamRecovered {
            offline_checks,
            total_restarts: self.state.total_restarts,
        });
        self.alerted_offline = false;
    }

    /// Sleep unless shutdown wins the race. Returns `false` when cancelled.
    async fn pause(&self, duration: Duration) -> bool {
        tokio::select! {
            _ = self.cancel.cancelled() => {
                info!("shutdown requested");
                false
            }
            _ = tokio::time::sleep(duration) => true,
        }
    }
}
