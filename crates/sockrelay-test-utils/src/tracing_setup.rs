//! Tracing initialisation for tests.
//!
//! Dispatch logs every failed attempt at `warn`; call [`init_test_tracing`]
//! to see those while debugging a failover test with `RUST_LOG=debug`.

use tracing_subscriber::EnvFilter;

/// Install a subscriber writing to the test-harness writer, filtered by
/// `RUST_LOG` (default `warn`).
///
/// The subscriber is installed at most once per process; later calls are
/// no-ops.
pub fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_test_writer()
        .try_init();
}
