//! Bank accounts with an append-only transaction log, kept in a durable store.

pub mod account;
pub mod config;
pub mod error;
pub mod service;
pub mod store;
pub mod types;

use std::sync::Once;

static INIT_TRACING: Once = Once::new();

/// Install the global `tracing` subscriber. Honors `RUST_LOG`, defaulting to `info`.
pub fn init_tracing() {
    INIT_TRACING.call_once(|| {
        use tracing_subscriber::{EnvFilter, fmt};

        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
        // another subscriber may already be installed by the host
        let _ = fmt().with_env_filter(filter).with_writer(std::io::stderr).try_init();
    });
}
