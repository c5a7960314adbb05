use std::process::ExitCode;

use covermatch_core::config::{AppConfig, LogFormat};

fn init_logging(config: &AppConfig) {
    use tracing::Level;

    let log_level = config.logging.level.parse::<Level>().unwrap_or(Level::INFO);

    match config.logging.format {
        LogFormat::Compact => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).compact().init();
        }
        LogFormat::Pretty => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).pretty().init();
        }
        LogFormat::Json => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).json().init();
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    // Logging uses defaults if the config file is broken; the affected
    // command will report the config error itself.
    let logging_config = AppConfig::load(Default::default()).unwrap_or_default();
    init_logging(&logging_config);

    covermatch_cli::run().await
}
