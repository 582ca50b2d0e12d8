//! 助手错误类型
//!
//! 所有错误都可在单轮内恢复：编排器把它们转成用户可见的回复，循环本身不会因此终止。

use thiserror::Error;

/// 工具库调用错误（对应 Tool Library 的 invoke 契约）
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ToolError {
    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    #[error("Invalid arguments for {tool}: {reason}")]
    InvalidArgs { tool: String, reason: String },

    #[error("Tool {tool} failed: {reason}")]
    ExecutionFailed { tool: String, reason: String },

    #[error("Tool {0} timed out")]
    Timeout(String),
}

/// 助手运行过程中的错误分类
#[derive(Error, Debug)]
pub enum AssistantError {
    /// 无规则命中且未配置语言后端
    #[error("No rule matched and no language backend is configured")]
    RoutingAmbiguous,

    #[error("Tool invocation error: {0}")]
    ToolInvocation(#[from] ToolError),

    #[error("Language backend unavailable: {0}")]
    BackendUnavailable(String),

    #[error("Confirmation timed out")]
    ConfirmationTimeout,

    #[error("Memory store error: {0}")]
    Memory(String),

    #[error("Config error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<config::ConfigError> for AssistantError {
    fn from(e: config::ConfigError) -> Self {
        AssistantError::Config(e.to_string())
    }
}
