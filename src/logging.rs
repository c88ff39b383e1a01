//! Operational logging setup, separate from the per-context Event Bus.
//!
//! `tracing` for structured fields plus `tracing-subscriber`'s `EnvFilter`
//! so `RUST_LOG` overrides the default `info` level, and `tracing-appender`
//! for a non-blocking rolling file writer when a log directory is
//! configured.

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

/// Must be kept alive for the lifetime of the process; dropping it stops the
/// background flush thread for the file appender.
pub struct LoggingGuard {
    _file_guard: Option<WorkerGuard>,
}

/// Initializes the global tracing subscriber. `log_dir` is `None` for
/// stderr-only logging (the common case for `swarmkeepd serve` in a
/// foreground terminal or under a supervisor that captures stderr).
pub fn init(log_dir: Option<&std::path::Path>) -> LoggingGuard {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    match log_dir {
        Some(dir) => {
            let file_appender = tracing_appender::rolling::daily(dir, "swarmkeepd.log");
            let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
            let subscriber = tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(non_blocking)
                .finish();
            let _ = tracing::subscriber::set_global_default(subscriber);
            LoggingGuard {
                _file_guard: Some(guard),
            }
        }
        None => {
            let subscriber = tracing_subscriber::fmt().with_env_filter(filter).finish();
            let _ = tracing::subscriber::set_global_default(subscriber);
            LoggingGuard { _file_guard: None }
        }
    }
}
