//! Utility functions.

use rill_core::RuntimeConfig;
use tracing_subscriber::EnvFilter;

/// Initialize tracing for tests from the environment
///
/// Safe to call from every test; only the first call installs a subscriber.
pub fn init_tracing() {
    let config = RuntimeConfig::load().unwrap_or_default();
    init_tracing_with(&config);
}

/// Initialize tracing with the log filter of the given configuration
pub fn init_tracing_with(config: &RuntimeConfig) {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(log_filter(config))
        .with_test_writer()
        .with_target(true)
        .try_init();
}

/// Filter for `config`, falling back to the default filter when it does not parse
pub fn log_filter(config: &RuntimeConfig) -> EnvFilter {
    EnvFilter::try_new(&config.log_filter)
        .unwrap_or_else(|_| EnvFilter::new(RuntimeConfig::default().log_filter))
}
