//! Tracing initialization, mirroring the teacher's `annactl`/`annad`
//! setup: an `EnvFilter` driven by `RUST_LOG`, defaulting to a quiet
//! level so the host app's own logging isn't drowned out.
//!
//! Stage transitions in `ExplanationOrchestrator::explain` log at
//! `debug!`/`info!` carrying the incident id; package name is the only
//! field ever logged, and only when the incident has one. Kill-switch
//! activation, cooldown rejections, and `ModelManager` state
//! transitions log at `warn!`/`info!`.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Installs a global tracing subscriber. Safe to call more than once -
/// subsequent calls are no-ops, matching `tracing`'s own guarantee on
/// `try_init`.
pub fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("aegis_common=info"));

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().without_time())
        .try_init();
}
