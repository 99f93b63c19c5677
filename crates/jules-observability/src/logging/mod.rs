//! 结构化日志模块
//!
//! 提供基于 tracing 的结构化日志功能。

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    fmt::writer::BoxMakeWriter,
    layer::SubscriberExt,
    reload::{self, Handle},
    util::SubscriberInitExt,
    EnvFilter, Registry,
};

use crate::config::{Config, LoggingConfig};
use crate::error::{ObservabilityError, Result};

/// 日志级别重新加载句柄类型
type ReloadHandle = Handle<EnvFilter, Registry>;

/// 日志管理器
///
/// 输出到文件时持有后台写线程的 guard，drop 时刷新缓冲区。
#[derive(Debug)]
pub struct LogManager {
    config: LoggingConfig,
    reload_handle: Option<ReloadHandle>,
    guard: Option<WorkerGuard>,
}

impl LogManager {
    /// 创建并安装全局日志订阅者
    pub async fn new(config: &Config) -> Result<Self> {
        let mut manager = Self {
            config: config.logging.clone(),
            reload_handle: None,
            guard: None,
        };

        manager.init().await?;

        Ok(manager)
    }

    async fn init(&mut self) -> Result<()> {
        let filter = build_filter(&self.config)?;
        let (filter, reload_handle) = reload::Layer::new(filter);

        let (writer, guard, ansi) = self.make_writer().await?;
        let registry = tracing_subscriber::registry().with(filter);

        let installed = if self.config.json_format {
            let layer = tracing_subscriber::fmt::layer()
                .json()
                .with_writer(writer)
                .with_line_number(self.config.include_line_number)
                .with_ansi(false);
            registry.with(layer).try_init()
        } else {
            let layer = tracing_subscriber::fmt::layer()
                .with_writer(writer)
                .with_line_number(self.config.include_line_number)
                .with_ansi(ansi);
            registry.with(layer).try_init()
        };
        installed.map_err(|e| ObservabilityError::logging(e.to_string()))?;

        self.reload_handle = Some(reload_handle);
        self.guard = guard;

        tracing::info!(
            target: "jules_observability",
            "Log manager initialized with level: {}",
            self.config.level
        );

        Ok(())
    }

    /// stderr，或设置了文件路径时的非阻塞文件写入器
    async fn make_writer(&self) -> Result<(BoxMakeWriter, Option<WorkerGuard>, bool)> {
        let Some(path) = &self.config.file_path else {
            return Ok((BoxMakeWriter::new(std::io::stderr), None, self.config.ansi_colors));
        };

        let file_name = path
            .file_name()
            .ok_or_else(|| ObservabilityError::config(format!("Invalid log file path: {:?}", path)))?;
        let directory = match path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
            _ => std::path::PathBuf::from("."),
        };
        tokio::fs::create_dir_all(&directory).await?;

        let appender = tracing_appender::rolling::never(directory, file_name);
        let (writer, guard) = tracing_appender::non_blocking(appender);
        Ok((BoxMakeWriter::new(writer), Some(guard), false))
    }

    /// 动态更新日志级别
    pub fn update_level(&mut self, level: &str) -> Result<()> {
        let mut config = self.config.clone();
        config.level = level.to_string();
        let new_filter = build_filter(&config)?;

        let handle = self
            .reload_handle
            .as_ref()
            .ok_or_else(|| ObservabilityError::logging("Log manager not initialized"))?;
        handle
            .modify(|filter| *filter = new_filter)
            .map_err(|e| ObservabilityError::logging(format!("Failed to update log level: {}", e)))?;

        self.config = config;

        tracing::info!(
            target: "jules_observability",
            "Log level updated to: {}",
            level
        );

        Ok(())
    }

    /// 获取当前配置
    pub fn config(&self) -> &LoggingConfig {
        &self.config
    }

    /// 刷新并关闭文件写入器
    pub fn shutdown(mut self) {
        tracing::info!(target: "jules_observability", "Log manager shutting down");
        self.guard.take();
    }
}

/// 构建环境过滤器
fn build_filter(config: &LoggingConfig) -> Result<EnvFilter> {
    EnvFilter::try_new(config.directives())
        .map_err(|e| ObservabilityError::logging(format!("Invalid log level: {}", e)))
}

/// 生成请求 ID
pub fn new_request_id() -> String {
    format!("req-{}", uuid::Uuid::new_v4())
}

/// 创建带有请求上下文的 span
pub fn request_span(request_id: &str) -> tracing::Span {
    tracing::info_span!("request", request_id = %request_id)
}

/// 创建带有会话上下文的 span
pub fn session_span(session_id: &str) -> tracing::Span {
    tracing::info_span!("session", session_id = %session_id)
}
