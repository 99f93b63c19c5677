pub mod base_url;
pub mod config;
pub mod manager;

pub use base_url::{resolve_base_url, ApiBase, Environment, API_URL_ENV, ENVIRONMENT_ENV};
pub use config::{
    ApiConfig, ChatConfig, Config, ConfigError, ConfigResult, LogLevel, LoggingConfig,
    UploadConfig,
};
pub use manager::ConfigManager;

use std::path::PathBuf;

/// 获取 Jules 配置目录路径
pub fn jules_dir() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".jules"))
}

/// 获取默认配置文件路径
pub fn default_config_path() -> Option<PathBuf> {
    jules_dir().map(|dir| dir.join("config.json"))
}

/// 获取默认日志文件路径
pub fn default_log_path() -> Option<PathBuf> {
    jules_dir().map(|dir| dir.join("logs").join("jules.log"))
}

/// 初始化 Jules 目录结构
pub async fn init_jules_dirs() -> ConfigResult<()> {
    if let Some(jules) = jules_dir() {
        tokio::fs::create_dir_all(&jules).await?;
        tokio::fs::create_dir_all(jules.join("logs")).await?;
    }
    Ok(())
}

/// 展开路径中的 ~ 为用户主目录
pub fn expand_tilde(path: &str) -> Option<PathBuf> {
    match path.strip_prefix("~/") {
        Some(rest) => dirs::home_dir().map(|home| home.join(rest)),
        None => Some(PathBuf::from(path)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_jules_dir() {
        let dir = jules_dir();
        assert!(dir.is_some());
        assert!(dir.unwrap().to_string_lossy().contains(".jules"));
    }

    #[test]
    fn test_expand_tilde() {
        let expanded = expand_tilde("~/.jules/config.json");
        assert!(expanded.is_some());
        assert!(!expanded.unwrap().to_string_lossy().starts_with("~"));

        assert_eq!(expand_tilde("/var/log/jules.log"), Some(PathBuf::from("/var/log/jules.log")));
    }

    #[test]
    fn test_default_log_path() {
        let path = default_log_path().unwrap();
        assert!(path.ends_with("logs/jules.log"));
    }
}
