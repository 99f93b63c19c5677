//! 日志配置
//!
//! 由 `~/.jules/config.json` 的 logging 段转换而来，前端可再用 builder 覆盖。

pub mod jules_integration;

use std::collections::BTreeMap;
use std::path::PathBuf;

/// 观测性配置
#[derive(Debug, Clone, Default)]
pub struct Config {
    /// 日志配置
    pub logging: LoggingConfig,
}

impl Config {
    /// 设置日志级别
    pub fn with_log_level(mut self, level: impl Into<String>) -> Self {
        self.logging.level = level.into();
        self
    }

    /// 设置是否使用 JSON 格式
    pub fn with_json_format(mut self, json: bool) -> Self {
        self.logging.json_format = json;
        self
    }

    /// 设置日志文件路径，设置后不再输出到 stderr
    pub fn with_log_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.logging.file_path = Some(path.into());
        self
    }

    /// 单独调整某个 crate 的级别，例如压低 HTTP 栈的调试输出
    pub fn with_module_level(mut self, module: impl Into<String>, level: impl Into<String>) -> Self {
        self.logging.module_levels.insert(module.into(), level.into());
        self
    }
}

/// 日志配置
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// EnvFilter 语法的级别，如 `info` 或 `jules_session=debug,warn`
    pub level: String,

    /// 是否使用 JSON 格式
    pub json_format: bool,

    /// 日志文件路径，`None` 时写 stderr
    pub file_path: Option<PathBuf>,

    /// 追加在级别之后的 `module=level` 指令
    pub module_levels: BTreeMap<String, String>,

    /// 写 stderr 时是否启用 ANSI 颜色
    pub ansi_colors: bool,

    /// 是否包含行号
    pub include_line_number: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
            json_format: false,
            file_path: None,
            module_levels: BTreeMap::new(),
            ansi_colors: true,
            include_line_number: false,
        }
    }
}

impl LoggingConfig {
    /// 完整的过滤指令，模块指令排在基础级别之后
    pub fn directives(&self) -> String {
        let mut directives = self.level.clone();
        for (module, level) in &self.module_levels {
            directives.push_str(&format!(",{}={}", module, level));
        }
        directives
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_logs_to_stderr() {
        let config = Config::default();
        assert!(config.logging.file_path.is_none());
        assert!(!config.logging.json_format);
        assert!(config.logging.module_levels.is_empty());
    }

    #[test]
    fn test_config_builder() {
        let config = Config::default()
            .with_log_level("debug")
            .with_json_format(true)
            .with_log_file("/tmp/jules.log")
            .with_module_level("jules_session", "trace");

        assert_eq!(config.logging.level, "debug");
        assert!(config.logging.json_format);
        assert_eq!(config.logging.file_path, Some(PathBuf::from("/tmp/jules.log")));
        assert_eq!(
            config.logging.module_levels.get("jules_session"),
            Some(&"trace".to_string())
        );
    }

    #[test]
    fn test_directives_order() {
        let config = Config::default()
            .with_log_level("debug")
            .with_module_level("reqwest", "warn")
            .with_module_level("hyper", "warn");

        assert_eq!(config.logging.directives(), "debug,hyper=warn,reqwest=warn");
    }
}
