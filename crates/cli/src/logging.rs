use docbot_core::config::{LogFormat, LoggingConfig};
use tracing::Level;

fn max_level(config: &LoggingConfig) -> Level {
    config.level.parse::<Level>().unwrap_or(Level::INFO)
}

/// Installs the process subscriber on stderr so command output on stdout stays
/// clean. Returns false when a subscriber was already installed.
pub fn init_logging(config: &LoggingConfig) -> bool {
    let builder = tracing_subscriber::fmt()
        .with_target(false)
        .with_max_level(max_level(config))
        .with_writer(std::io::stderr);

    match config.format {
        LogFormat::Compact => builder.compact().try_init().is_ok(),
        LogFormat::Pretty => builder.pretty().try_init().is_ok(),
        LogFormat::Json => builder.json().try_init().is_ok(),
    }
}
