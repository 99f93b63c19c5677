//! Jules Observability Infrastructure
//!
//! 提供统一的结构化日志功能。

#![warn(missing_docs)]

pub mod config;
pub mod error;
pub mod logging;

pub use config::{Config, LoggingConfig};
pub use error::{ObservabilityError, Result};
pub use logging::{new_request_id, request_span, session_span, LogManager};

/// 便捷导入模块
pub mod prelude {
    //! 常用类型的便捷导入

    pub use crate::{Config, LogManager, Result};

    // 日志
    pub use tracing::{debug, error, info, instrument, trace, warn, Instrument, Span};
}
