use std::any::Any;
use std::backtrace::{Backtrace, BacktraceStatus};
use std::panic::PanicHookInfo;

use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{Layer, filter::EnvFilter, fmt};

const ENV_DEBUG: &str = "MAPREDUCE_DEBUG";

/// Logs a panic as one structured `error` event instead of the multi-line stderr report.
/// Callback panics are contained by the engine and turned into a cancellation, the event keeps the
/// panic site so it can be matched with the failed run in the JSON log.
fn report_panic(panic_info: &PanicHookInfo<'_>) {
    let payload = panic_payload(panic_info.payload());
    let thread = std::thread::current();
    let thread = thread.name().unwrap_or("<unnamed>");

    // captured only with RUST_BACKTRACE or RUST_LIB_BACKTRACE set
    let backtrace = Backtrace::capture();
    let backtrace =
        (backtrace.status() == BacktraceStatus::Captured).then(|| backtrace.to_string());

    match panic_info.location() {
        Some(location) => tracing::error!(
            panic.file = location.file(),
            panic.line = location.line(),
            panic.column = location.column(),
            panic.thread = thread,
            panic.backtrace = backtrace,
            "panicked: {payload}"
        ),
        None => tracing::error!(
            panic.thread = thread,
            panic.backtrace = backtrace,
            "panicked: {payload}"
        ),
    }
}

fn panic_payload(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&str>() {
        *s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.as_str()
    } else {
        "<non-string payload>"
    }
}

/// Installs the global subscriber. RUST_LOG overrides the level, the default is `info`, or
/// `debug` when MAPREDUCE_DEBUG=true. Debug mode also switches from flattened JSON to text.
pub(crate) fn register() {
    let debug_mode = std::env::var(ENV_DEBUG).is_ok_and(|v| v.to_lowercase() == "true");
    let default_log_level = if debug_mode { "debug" } else { "info" };

    let filter = EnvFilter::builder()
        .with_default_directive(default_log_level.parse().unwrap_or(Level::INFO.into()))
        .from_env_lossy();

    let layer = if debug_mode {
        fmt::layer().boxed()
    } else {
        fmt::layer()
            .with_ansi(false)
            .json()
            .flatten_event(true)
            .boxed()
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(layer)
        .init();

    std::panic::set_hook(Box::new(report_panic));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_panic_payload() {
        let payload: Box<dyn Any + Send> = Box::new("static message");
        assert_eq!(panic_payload(payload.as_ref()), "static message");

        let payload: Box<dyn Any + Send> = Box::new(format!("item {}", 3));
        assert_eq!(panic_payload(payload.as_ref()), "item 3");

        let payload: Box<dyn Any + Send> = Box::new(42u32);
        assert_eq!(panic_payload(payload.as_ref()), "<non-string payload>");
    }
}
