//! Global panic hook.
//!
//! A panic in the controller is a programming fault, not an operational
//! state; it must still leave a trail. The hook logs through `tracing` and,
//! in `panic = "abort"` builds where buffered log writers may never flush,
//! appends the record straight to today's log file before the abort.

use std::backtrace::Backtrace;
use std::fs::OpenOptions;
use std::io::Write;
use std::panic::PanicHookInfo;
use std::path::Path;

use crate::logging::current_log_file;

/// Install the hook. The default hook still runs afterwards, preserving
/// stderr output and backtrace behavior.
pub fn install(log_dir: impl AsRef<Path>) {
    let log_dir = log_dir.as_ref().to_path_buf();
    let previous_hook = std::panic::take_hook();

    std::panic::set_hook(Box::new(move |info: &PanicHookInfo<'_>| {
        let _ = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let record = render(info);
            tracing::error!(target: "vigil::panic", "{record}");

            if cfg!(panic = "abort")
                && let Ok(mut file) = OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(current_log_file(&log_dir))
            {
                let _ = writeln!(file, "{record}");
            }
        }));

        previous_hook(info);
    }));
}

fn render(info: &PanicHookInfo<'_>) -> String {
    let payload = if let Some(s) = info.payload().downcast_ref::<&'static str>() {
        (*s).to_string()
    } else if let Some(s) = info.payload().downcast_ref::<String>() {
        s.clone()
    } else {
        info.to_string()
    };

    let location = info
        .location()
        .map(|loc| format!("{}:{}:{}", loc.file(), loc.line(), loc.column()))
        .unwrap_or_else(|| "<unknown>".to_string());

    let thread = std::thread::current()
        .name()
        .unwrap_or("<unnamed>")
        .to_string();

    format!(
        "PANIC thread={thread} location={location} payload={payload}\nBacktrace:\n{}",
        Backtrace::force_capture()
    )
}
