use std::panic::PanicHookInfo;
use std::sync::Once;

use tracing_subscriber::{
    filter::FilterFn, fmt::format::Format, layer::SubscriberExt, util::SubscriberInitExt,
};

/// Installs the global subscriber, limited to events from the `headway`
/// crates, and routes panics through it. Later calls are no-ops.
pub fn setup_logging() {
    static LOGGING_SETUP: Once = Once::new();

    LOGGING_SETUP.call_once(|| {
        let filter = FilterFn::new(|metadata| {
            metadata
                .module_path()
                .unwrap_or_default()
                .starts_with("headway")
        });
        let layer = tracing_subscriber::fmt::layer()
            .event_format(Format::default().with_target(true))
            .with_ansi(false);
        // Another subscriber may already be installed by the host binary
        let _ = tracing_subscriber::registry()
            .with(layer)
            .with(filter)
            .try_init();
        std::panic::set_hook(Box::new(panic_hook));
    })
}

fn panic_hook(info: &PanicHookInfo) {
    tracing::error!("{info}")
}
