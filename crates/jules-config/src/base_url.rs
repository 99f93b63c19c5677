//! 后端地址解析
//!
//! 优先级：显式指定 > `JULES_API_URL` > 生产环境同源 > 开发环境本地地址。

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::config::{ConfigError, ConfigResult};

/// 提供后端地址的环境变量
pub const API_URL_ENV: &str = "JULES_API_URL";

/// 指定运行环境的环境变量
pub const ENVIRONMENT_ENV: &str = "JULES_ENV";

/// 开发环境默认后端地址
pub const DEVELOPMENT_ORIGIN: &str = "http://127.0.0.1:8000";

/// 运行环境
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Development,
    Production,
}

impl Environment {
    /// 从 JULES_ENV 读取，未设置或无法识别时返回 None
    pub fn from_env() -> Option<Self> {
        std::env::var(ENVIRONMENT_ENV)
            .ok()
            .and_then(|v| v.parse().ok())
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Development => "development",
            Environment::Production => "production",
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Environment {
    type Err = ConfigError;

    fn from_str(s: &str) -> ConfigResult<Self> {
        match s.trim().to_lowercase().as_str() {
            "development" | "dev" => Ok(Environment::Development),
            "production" | "prod" => Ok(Environment::Production),
            _ => Err(ConfigError::Validation(format!("Invalid environment: {}", s))),
        }
    }
}

/// 解析得到的后端地址
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiBase {
    /// 完整的源地址，不带结尾斜杠
    Origin(String),
    /// 与前端同源，路径保持相对
    Relative,
}

impl ApiBase {
    pub fn origin(&self) -> Option<&str> {
        match self {
            ApiBase::Origin(origin) => Some(origin),
            ApiBase::Relative => None,
        }
    }

    /// 拼接接口路径，`path` 以 `/` 开头
    pub fn join(&self, path: &str) -> String {
        match self {
            ApiBase::Origin(origin) => format!("{}{}", origin, path),
            ApiBase::Relative => path.to_string(),
        }
    }
}

impl fmt::Display for ApiBase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiBase::Origin(origin) => f.write_str(origin),
            ApiBase::Relative => f.write_str("(same origin)"),
        }
    }
}

fn normalize(origin: Option<&str>) -> Option<String> {
    let origin = origin?.trim().trim_end_matches('/');
    if origin.is_empty() {
        None
    } else {
        Some(origin.to_string())
    }
}

/// 统一的后端地址解析规则
pub fn resolve_base_url(
    explicit: Option<&str>,
    env_origin: Option<&str>,
    environment: Environment,
) -> ApiBase {
    if let Some(origin) = normalize(explicit) {
        return ApiBase::Origin(origin);
    }
    if let Some(origin) = normalize(env_origin) {
        return ApiBase::Origin(origin);
    }
    match environment {
        Environment::Production => ApiBase::Relative,
        Environment::Development => ApiBase::Origin(DEVELOPMENT_ORIGIN.to_string()),
    }
}
