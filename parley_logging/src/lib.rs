pub use tracing::{self, debug, error, info, instrument, trace, warn};
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::fmt::SubscriberBuilder;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Used when `RUST_LOG` is unset or cannot be parsed
const DEFAULT_DIRECTIVE: &str = "parley=info";

/// Sets up the logging for any crate
pub fn setup_log() {
    std::panic::set_hook(Box::new(|info| {
        error!(target: "parley", "Panic occurred: {}", info);
        std::process::exit(1);
    }));

    setup_log_no_panic_hook()
}

/// Installs the subscriber without touching the panic hook. Safe to call more than once;
/// only the first call installs anything
pub fn setup_log_no_panic_hook() {
    let _ = SubscriberBuilder::default()
        .with_line_number(true)
        .with_file(true)
        .with_span_events(FmtSpan::NONE)
        .with_env_filter(env_filter())
        .finish()
        .try_init();
}

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_DIRECTIVE))
}
