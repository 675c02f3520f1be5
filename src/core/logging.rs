//! Logger setup for the streaming binary and benches

/// Initialize env_logger at `info`
///
/// `RUST_LOG` overrides the default, e.g. `RUST_LOG=lodstream::cache=debug`
/// to follow eviction passes.
///
/// # Example
/// ```
/// lodstream::core::logging::init();
/// log::info!("Streaming started");
/// ```
pub fn init() {
    init_with_filter("info");
}

/// Initialize env_logger with a custom default filter
///
/// Later calls are ignored.
pub fn init_with_filter(default_filter: &str) {
    let _ = env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(default_filter)
    ).try_init();
}
