//! Logging utilities
//!
//! Thin wrapper around `log`/`env_logger` so hosts and tests share one
//! initialization path.

pub use log::{debug, error, info, trace, warn};

/// Initialize the logging system
///
/// Reads the standard `RUST_LOG` environment variable, defaulting to `info`
/// when unset. Safe to call more than once; later calls are ignored.
pub fn init() {
    let _ = env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or("info"),
    )
    .try_init();
}
