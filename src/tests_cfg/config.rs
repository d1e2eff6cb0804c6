use crate::config::{Config, Logger, TranslationSettings};

/// Configuration with logging disabled, no generation backend and no retry
/// delay.
#[must_use]
pub fn test_config() -> Config {
    Config {
        logger: Logger {
            enable: false,
            ..Logger::default()
        },
        translation: TranslationSettings {
            retry_delay_ms: 0,
            ..TranslationSettings::default()
        },
        ..Config::default()
    }
}
