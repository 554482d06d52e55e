pub mod api;
pub mod config;
pub mod transport;

use tracing_subscriber::EnvFilter;

/// Initialize the tracing subscriber shared by both relay binaries.
pub fn init_tracing(log_level: &str) {
    let level: tracing::Level = log_level.parse().unwrap_or(tracing::Level::INFO);
    let env_filter = EnvFilter::builder()
        .with_default_directive(level.into())
        .from_env_lossy();

    tracing_subscriber::fmt()
        .compact()
        .with_env_filter(env_filter)
        .init();
}
