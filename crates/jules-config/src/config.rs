use jules_session::{Locale, UploadPolicy, MAX_UPLOAD_BYTES};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::base_url::{ApiBase, Environment};

/// 主配置结构体
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Config {
    pub version: String,
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub chat: ChatConfig,
    #[serde(default)]
    pub upload: UploadConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: env!("CARGO_PKG_VERSION").to_string(),
            api: ApiConfig::default(),
            chat: ChatConfig::default(),
            upload: UploadConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Config {
    /// 获取配置值的快捷方法
    pub fn get_value(&self, key: &str) -> Option<String> {
        let parts: Vec<&str> = key.split('.').collect();
        match parts.as_slice() {
            ["version"] => Some(self.version.clone()),
            ["api", "base_url"] => self.api.base_url.clone(),
            ["api", "environment"] => self.api.environment.map(|e| e.to_string()),
            ["api", "request_timeout_seconds"] => {
                self.api.request_timeout_seconds.map(|s| s.to_string())
            }
            ["chat", "locale"] => Some(self.chat.locale.to_string()),
            ["upload", "max_bytes"] => Some(self.upload.max_bytes.to_string()),
            ["upload", "allowed_types"] => Some(self.upload.allowed_types.join(",")),
            ["upload", "rejection_ttl_ms"] => Some(self.upload.rejection_ttl_ms.to_string()),
            ["upload", "result_ttl_ms"] => Some(self.upload.result_ttl_ms.to_string()),
            ["logging", "level"] => Some(self.logging.level.as_str().to_string()),
            ["logging", "file"] => self.logging.file.clone(),
            ["logging", "json"] => Some(self.logging.json.to_string()),
            _ => None,
        }
    }

    /// 设置配置值，空字符串清除可选项
    pub fn set_value(&mut self, key: &str, value: &str) -> ConfigResult<()> {
        let parts: Vec<&str> = key.split('.').collect();
        match parts.as_slice() {
            ["api", "base_url"] => {
                self.api.base_url = non_empty(value);
            }
            ["api", "environment"] => {
                self.api.environment = match non_empty(value) {
                    Some(v) => Some(v.parse()?),
                    None => None,
                };
            }
            ["api", "request_timeout_seconds"] => {
                self.api.request_timeout_seconds = match non_empty(value) {
                    Some(v) => Some(parse_number(&v)?),
                    None => None,
                };
            }
            ["chat", "locale"] => {
                self.chat.locale = value.parse().map_err(ConfigError::Validation)?;
            }
            ["upload", "max_bytes"] => {
                self.upload.max_bytes = parse_number(value)?;
            }
            ["upload", "allowed_types"] => {
                self.upload.allowed_types = value
                    .split(',')
                    .map(str::trim)
                    .filter(|t| !t.is_empty())
                    .map(String::from)
                    .collect();
            }
            ["upload", "rejection_ttl_ms"] => {
                self.upload.rejection_ttl_ms = parse_number(value)?;
            }
            ["upload", "result_ttl_ms"] => {
                self.upload.result_ttl_ms = parse_number(value)?;
            }
            ["logging", "level"] => {
                self.logging.level = value.parse()?;
            }
            ["logging", "file"] => {
                self.logging.file = non_empty(value);
            }
            ["logging", "json"] => {
                self.logging.json = value.parse().map_err(|_| {
                    ConfigError::Validation(format!("Invalid boolean: {}", value))
                })?;
            }
            _ => return Err(ConfigError::KeyNotFound(key.to_string())),
        }
        Ok(())
    }

    /// 所有可通过 get/set 访问的键
    pub fn keys() -> &'static [&'static str] {
        &[
            "version",
            "api.base_url",
            "api.environment",
            "api.request_timeout_seconds",
            "chat.locale",
            "upload.max_bytes",
            "upload.allowed_types",
            "upload.rejection_ttl_ms",
            "upload.result_ttl_ms",
            "logging.level",
            "logging.file",
            "logging.json",
        ]
    }
}

fn non_empty(value: &str) -> Option<String> {
    let value = value.trim();
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

fn parse_number<T: std::str::FromStr>(value: &str) -> ConfigResult<T> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::Validation(format!("Invalid number: {}", value)))
}

/// 后端 API 配置
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ApiConfig {
    /// 显式指定的后端地址，优先级最高
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    /// 未设置时读取 JULES_ENV
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub environment: Option<Environment>,
    /// 请求超时（秒），默认不超时
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_timeout_seconds: Option<u64>,
}

impl ApiConfig {
    /// 生效的运行环境
    pub fn effective_environment(&self) -> Environment {
        self.environment
            .or_else(Environment::from_env)
            .unwrap_or_default()
    }

    /// 解析后端地址，`cli_override` 优先于配置文件
    pub fn resolve_base(&self, cli_override: Option<&str>) -> ApiBase {
        let explicit = cli_override
            .filter(|s| !s.trim().is_empty())
            .or(self.base_url.as_deref());
        let env_origin = std::env::var(crate::base_url::API_URL_ENV).ok();
        crate::base_url::resolve_base_url(
            explicit,
            env_origin.as_deref(),
            self.effective_environment(),
        )
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_seconds.map(Duration::from_secs)
    }
}

/// 对话配置
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ChatConfig {
    #[serde(default)]
    pub locale: Locale,
}

/// 上传配置
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UploadConfig {
    #[serde(default = "default_max_bytes")]
    pub max_bytes: u64,
    #[serde(default = "default_allowed_types")]
    pub allowed_types: Vec<String>,
    #[serde(default = "default_rejection_ttl_ms")]
    pub rejection_ttl_ms: u64,
    #[serde(default = "default_result_ttl_ms")]
    pub result_ttl_ms: u64,
}

fn default_max_bytes() -> u64 {
    MAX_UPLOAD_BYTES
}

fn default_allowed_types() -> Vec<String> {
    vec!["text/plain".to_string(), "application/pdf".to_string()]
}

fn default_rejection_ttl_ms() -> u64 {
    4000
}

fn default_result_ttl_ms() -> u64 {
    5000
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            max_bytes: default_max_bytes(),
            allowed_types: default_allowed_types(),
            rejection_ttl_ms: default_rejection_ttl_ms(),
            result_ttl_ms: default_result_ttl_ms(),
        }
    }
}

impl UploadConfig {
    pub fn policy(&self) -> UploadPolicy {
        UploadPolicy {
            max_bytes: self.max_bytes,
            allowed_types: self.allowed_types.clone(),
            rejection_ttl: Duration::from_millis(self.rejection_ttl_ms),
            result_ttl: Duration::from_millis(self.result_ttl_ms),
        }
    }
}

/// 日志级别
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

impl std::str::FromStr for LogLevel {
    type Err = ConfigError;

    fn from_str(s: &str) -> ConfigResult<Self> {
        match s.to_lowercase().as_str() {
            "trace" => Ok(LogLevel::Trace),
            "debug" => Ok(LogLevel::Debug),
            "info" => Ok(LogLevel::Info),
            "warn" | "warning" => Ok(LogLevel::Warn),
            "error" => Ok(LogLevel::Error),
            _ => Err(ConfigError::Validation(format!("Invalid log level: {}", s))),
        }
    }
}

/// Logging 配置
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct LoggingConfig {
    #[serde(default)]
    pub level: LogLevel,
    /// 日志文件路径，未设置时输出到 stderr
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
    /// 输出 JSON 格式
    #[serde(default)]
    pub json: bool,
}

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Key not found: {0}")]
    KeyNotFound(String),

    #[error("Environment variable not found: {0}")]
    EnvVarNotFound(String),

    #[error("Invalid path: {0}")]
    InvalidPath(String),
}

pub type ConfigResult<T> = std::result::Result<T, ConfigError>;
