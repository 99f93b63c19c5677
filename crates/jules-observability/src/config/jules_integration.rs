//! Jules Config 集成模块
//!
//! 把 `~/.jules/config.json` 中的 logging 段转换为观测性配置。

use crate::config::Config as ObservabilityConfig;

impl From<&jules_config::LoggingConfig> for ObservabilityConfig {
    fn from(logging: &jules_config::LoggingConfig) -> Self {
        // HTTP stack stays at warn
        let mut config = ObservabilityConfig::default()
            .with_log_level(logging.level.as_str())
            .with_json_format(logging.json)
            .with_module_level("hyper", "warn")
            .with_module_level("reqwest", "warn");

        if let Some(path) = logging.file.as_deref().and_then(jules_config::expand_tilde) {
            config = config.with_log_file(path);
        }

        config
    }
}

impl From<&jules_config::Config> for ObservabilityConfig {
    fn from(config: &jules_config::Config) -> Self {
        Self::from(&config.logging)
    }
}
