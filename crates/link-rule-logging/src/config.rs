use serde::{Deserialize, Serialize};
use std::fmt;

/// 日志级别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
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

impl From<tracing::Level> for LogLevel {
    fn from(level: tracing::Level) -> Self {
        match level {
            tracing::Level::TRACE => LogLevel::Trace,
            tracing::Level::DEBUG => LogLevel::Debug,
            tracing::Level::INFO => LogLevel::Info,
            tracing::Level::WARN => LogLevel::Warn,
            tracing::Level::ERROR => LogLevel::Error,
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 输出格式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// 人类可读的文本
    #[default]
    Pretty,

    /// 每行一个 JSON 对象
    Json,
}

/// 日志配置
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// 全局级别
    pub level: LogLevel,

    /// 输出格式
    pub format: LogFormat,

    /// 附加的过滤指令，例如 `link_rule=debug,reqwest=warn`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub directives: Option<String>,
}

impl LoggingConfig {
    /// 合成 EnvFilter 指令
    pub fn filter_directives(&self) -> String {
        match self.directives.as_deref().map(str::trim) {
            Some(extra) if !extra.is_empty() => format!("{},{}", self.level, extra),
            _ => self.level.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = LoggingConfig::default();
        assert_eq!(config.level, LogLevel::Info);
        assert_eq!(config.format, LogFormat::Pretty);
        assert_eq!(config.filter_directives(), "info");
    }

    #[test]
    fn test_filter_directives() {
        let config = LoggingConfig {
            level: LogLevel::Warn,
            format: LogFormat::Json,
            directives: Some(" link_rule=debug ".to_string()),
        };
        assert_eq!(config.filter_directives(), "warn,link_rule=debug");

        let blank = LoggingConfig {
            directives: Some("  ".to_string()),
            ..Default::default()
        };
        assert_eq!(blank.filter_directives(), "info");
    }

    #[test]
    fn test_deserialize_lowercase() {
        let config: LoggingConfig =
            serde_json::from_str(r#"{"level":"debug","format":"json"}"#).unwrap();
        assert_eq!(config.level, LogLevel::Debug);
        assert_eq!(config.format, LogFormat::Json);
        assert!(config.directives.is_none());
    }

    #[test]
    fn test_from_tracing_level() {
        assert_eq!(LogLevel::from(tracing::Level::ERROR), LogLevel::Error);
        assert_eq!(LogLevel::from(tracing::Level::TRACE).as_str(), "trace");
    }
}
