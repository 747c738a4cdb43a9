//! Tracing initialisation helpers for tests.
//!
//! Call [`init_test_tracing`] at the top of any test that emits tracing events
//! and wants them captured by the test harness. The subscriber is installed at
//! most once per process; later calls are ignored.

use tracing_subscriber::EnvFilter;

/// Default filter: engine internals at debug, everything else at warn.
pub const DEFAULT_TEST_FILTER: &str = "switchyard_core=debug,switchyard_config=debug,warn";

/// Install a test-writer subscriber. `RUST_LOG` overrides [`DEFAULT_TEST_FILTER`].
///
/// # Example
///
/// ```ignore
/// #[tokio::test]
/// async fn my_test() {
///     switchyard_test_utils::tracing_setup::init_test_tracing();
///     tracing::debug!("captured by the harness");
/// }
/// ```
pub fn init_test_tracing() {
    init_test_tracing_with(DEFAULT_TEST_FILTER);
}

/// Like [`init_test_tracing`] with an explicit fallback filter.
pub fn init_test_tracing_with(filter: &str) {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .with_test_writer()
        .with_target(true)
        .try_init();
}
