//! Process-wide tracing setup (SPEC_FULL.md §10 "Logging").
//!
//! The teacher installs `tracing` through bevy's `LogPlugin`, which
//! itself wraps `tracing-subscriber`; this crate has no bevy `App` to
//! host that plugin, so the embedder calls [`init`] directly at process
//! startup instead. Per-tick hot-path logging still goes through
//! [`crate::profile_log!`] and the `#[profile(ms)]` macro, not this
//! module — this module only installs the global subscriber those
//! macros log through.

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

/// Install the global `tracing` subscriber, reading its filter from
/// `RUST_LOG` (falling back to `info` if unset or unparsable).
///
/// Logs to a non-blocking rolling file under `log_dir` (one file per
/// day, named `skirmish_movement.log.<date>`), so a long-running
/// simulation process doesn't block its tick loop on file I/O. The
/// returned [`WorkerGuard`] must be kept alive for the duration of the
/// process — dropping it flushes and stops the background writer
/// thread.
pub fn init(log_dir: impl AsRef<std::path::Path>) -> WorkerGuard {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let file_appender = tracing_appender::rolling::daily(log_dir, "skirmish_movement.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    // `try_init` rather than `init`: a process that already installed a
    // subscriber (an embedder with its own, or a second call from tests
    // in the same binary) gets this one silently skipped rather than a
    // panic, matching tracing_subscriber's own recommendation for
    // library-side init helpers.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(non_blocking)
        .with_ansi(false)
        .try_init();

    guard
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_returns_a_live_guard() {
        let dir = std::env::temp_dir().join("skirmish_movement_logging_test");
        std::fs::create_dir_all(&dir).unwrap();
        let guard = init(&dir);
        tracing::info!("logging smoke test");
        drop(guard);
    }
}
