//! Tracing subscriber setup and logging helpers.
//!
//! The library itself only emits `tracing` events; binaries, tests and
//! benchmarks call one of the `init_*` functions to see them.

use std::sync::Once;
use tracing::info;
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

static INIT: Once = Once::new();

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Install a human-readable global subscriber.
///
/// The filter comes from `RUST_LOG`, defaulting to `info`. Only the first call
/// of either `init_*` function has an effect.
pub fn init_tracing() {
    INIT.call_once(|| {
        let fmt_layer = fmt::layer()
            .with_span_events(FmtSpan::CLOSE)
            .with_target(true)
            .with_file(true)
            .with_line_number(true);

        // A subscriber installed by the host application takes precedence.
        let _ = tracing_subscriber::registry()
            .with(env_filter())
            .with(fmt_layer)
            .try_init();

        info!("elfmodel tracing initialized");
    });
}

/// Install a JSON global subscriber for structured log collection.
pub fn init_tracing_json() {
    INIT.call_once(|| {
        let fmt_layer = fmt::layer()
            .json()
            .with_span_events(FmtSpan::CLOSE)
            .with_target(true)
            .with_file(true)
            .with_line_number(true)
            .with_current_span(true);

        let _ = tracing_subscriber::registry()
            .with(env_filter())
            .with(fmt_layer)
            .try_init();

        info!("elfmodel tracing initialized (JSON mode)");
    });
}

/// Log an error at the point it is raised and yield it
#[macro_export]
macro_rules! log_error {
    ($err:expr) => {{
        let e = $err;
        tracing::error!(error = %e, "Operation failed");
        e
    }};
    ($err:expr, $msg:expr) => {{
        let e = $err;
        tracing::error!(error = %e, message = $msg, "Operation failed");
        e
    }};
}
