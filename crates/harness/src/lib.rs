mod doubles;
mod repo;

pub use doubles::{
    FailingWatchlist, RecordingMergeEngine, RecordingReader, RecordingWriter, RejectingFilter,
    SaveRecord,
};
pub use repo::{TestRepo, FULL_RIGHTS};

use tracing_subscriber::EnvFilter;

/// Install a test-friendly subscriber. Honours `RUST_LOG`, defaults to
/// `warn`. Safe to call from every test.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_test_writer()
        .try_init();
}
