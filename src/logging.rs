use std::panic::PanicHookInfo;

use tracing::error;
use tracing_subscriber::{fmt, EnvFilter};

const DEFAULT_FILTER: &str = "activity_map=info";

/// Install the global subscriber. `RUST_LOG` overrides the default filter.
pub fn init_logging() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_names(true)
        .with_file(false)
        .with_line_number(false)
        .init();
}

/// Report a failure that is handled where it happens, such as a store write
/// that the next fetch will redo.
pub fn log_error(context: &str, error: &dyn std::error::Error) {
    error!("{}: {}", context, error);
}

fn panic_payload(info: &PanicHookInfo) -> String {
    let payload = info.payload();
    payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "Unknown panic payload".to_string())
}

pub fn install_panic_hook() {
    let default_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        let location = info
            .location()
            .map(|loc| format!("{}:{}", loc.file(), loc.line()))
            .unwrap_or_else(|| "unknown location".to_string());
        error!(
            thread = std::thread::current().name().unwrap_or("unnamed"),
            "PANIC at {}: {}",
            location,
            panic_payload(info)
        );
        default_hook(info);
    }));
}
