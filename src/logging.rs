//! Tracing subscriber setup for binaries and ad-hoc debugging.

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Install a stderr subscriber filtered by `RUST_LOG`, defaulting to `default_level`.
///
/// Calling it twice is harmless; the second install is ignored.
pub fn init(default_level: tracing::Level) {
    let env_filter = tracing_subscriber::EnvFilter::builder()
        .with_default_directive(default_level.into())
        .from_env_lossy();

    let _ = tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .try_init();
}
