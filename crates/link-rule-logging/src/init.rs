use thiserror::Error;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::{LogFormat, LoggingConfig};

#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("Invalid log filter `{directives}`: {reason}")]
    InvalidFilter { directives: String, reason: String },

    #[error("Failed to install subscriber: {0}")]
    InitError(String),
}

/// 构造过滤器；设置了 RUST_LOG 时以环境变量为准
pub fn build_filter(config: &LoggingConfig) -> Result<EnvFilter, LoggingError> {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok(filter);
    }

    let directives = config.filter_directives();
    EnvFilter::try_new(&directives).map_err(|e| LoggingError::InvalidFilter {
        directives,
        reason: e.to_string(),
    })
}

/// 安装全局日志订阅者，输出到 stderr
///
/// 进程内只能成功一次，重复调用返回 `InitError`。
pub fn init_logging(config: &LoggingConfig) -> Result<(), LoggingError> {
    let filter = build_filter(config)?;
    let registry = tracing_subscriber::registry().with(filter);

    match config.format {
        LogFormat::Pretty => registry
            .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
            .try_init(),
        LogFormat::Json => registry
            .with(
                fmt::layer()
                    .json()
                    .with_current_span(false)
                    .with_writer(std::io::stderr),
            )
            .try_init(),
    }
    .map_err(|e| LoggingError::InitError(e.to_string()))
}
