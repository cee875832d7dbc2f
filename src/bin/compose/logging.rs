// logging.rs - Console tracing subscriber

use tracing::Level;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::writer::MakeWriterExt;

/// RUST_LOG wins over `base_level` when set
pub fn setup_logging(base_level: &str) {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(base_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    // Warnings and errors also go to stderr
    let writer = std::io::stdout.and(std::io::stderr.with_min_level(Level::WARN));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(writer)
        .try_init();
}
