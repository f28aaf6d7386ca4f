//! Logging initialization.
//!
//! The RUST_LOG environment variable always wins; the `filter` argument is
//! the fallback for hosts embedding the control plane without one set.

use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

pub fn init_logging(filter: Option<&str>) {
    let env_filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        EnvFilter::new(filter.unwrap_or("info"))
    };

    let subscriber = tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer());

    // Ignore the error if a subscriber is already set (tests, embedding hosts).
    let _ = tracing::subscriber::set_global_default(subscriber);
}
