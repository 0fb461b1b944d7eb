use std::path::PathBuf;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use vigil::config::WatchdogConfig;
use vigil::notification::{AlertDispatcher, DiscordNotifier};
use vigil::platform::VisibilityGovernor;
use vigil::probes::{CameraSourceProbe, StatusEndpointProbe};
use vigil::process::MediaProcessController;
use vigil::watchdog::Watchdog;

// One controller process, one logical timeline: every wait is an explicit
// sleep, so a single-threaded runtime is all the concurrency there is.
#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Bootstrap values needed before the config (and its warnings) can be logged.
    let log_dir = std::env::var("WATCHDOG_LOG_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("/config/logs"));
    let verbose = std::env::var("WATCHDOG_VERBOSE")
        .map(|v| matches!(v.trim(), "true" | "1" | "yes" | "on"))
        .unwrap_or(false);

    let _guard = vigil::logging::init_logging(&log_dir, verbose)?;
    vigil::panic_hook::install(&log_dir);

    let config = WatchdogConfig::from_env();

    let stream_probe = Arc::new(StatusEndpointProbe::new(config.status_url.clone()));
    let camera_probe = match (&config.source.url, config.source.check_enabled) {
        (Some(url), true) => {
            let probe = CameraSourceProbe::new(url.clone());
            info!(source = %vigil::probes::mask_credentials(url), "camera health checks enabled");
            Some(Arc::new(probe) as Arc<dyn vigil::probes::CameraProbe>)
        }
        _ => {
            info!("camera health checks disabled");
            None
        }
    };
    let controller = Arc::new(MediaProcessController::new(&config.paths));
    let alerts = AlertDispatcher::new(Arc::new(DiscordNotifier::new(config.webhook.clone())));
    let governor = VisibilityGovernor::new(config.credentials.clone(), alerts.clone());

    let cancel = CancellationToken::new();
    let signal_cancel = cancel.clone();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "could not listen for interrupt");
            return;
        }
        info!("interrupt received, shutting down");
        signal_cancel.cancel();
    });

    let mut watchdog = Watchdog::new(
        config,
        stream_probe,
        camera_probe,
        controller,
        alerts,
        governor,
        cancel,
    );
    watchdog.run().await;

    Ok(())
}
