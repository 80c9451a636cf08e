//! Subscriber setup for the binary. Log lines go to stderr; stdout carries
//! JSON responses only.

use std::sync::Once;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

/// Env var holding an `EnvFilter` directive, e.g. `neuromap=debug`.
pub const LOG_ENV: &str = "NEUROMAP_LOG";
const DEFAULT_FILTER: &str = "neuromap=info";

static INIT: Once = Once::new();

/// Installs the global subscriber once; later calls are no-ops.
pub fn init_logging() {
    INIT.call_once(|| {
        let filter =
            EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

        // An embedding host may already own the global subscriber.
        let _ = tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_target(true),
            )
            .with(filter)
            .try_init();
    });
}
