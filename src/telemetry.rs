use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::config::TracingConfig;

/// Installs the process-wide tracing subscriber, substituting the real
/// `tracing-subscriber` crate directly for the teacher's unpublished
/// `shine_service::axum::tracing::TracingConfig` layer.
pub fn init(config: &TracingConfig) {
    let filter = EnvFilter::try_new(&config.filter).unwrap_or_else(|_| EnvFilter::new("info"));

    let registry = tracing_subscriber::registry().with(filter);

    if config.json {
        registry.with(fmt::layer().json()).init();
    } else {
        registry.with(fmt::layer()).init();
    }
}
