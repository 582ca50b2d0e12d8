//! 工具执行器
//!
//! 持有 ToolRegistry 与全局超时，invoke(name, args) 在超时内调用 registry.invoke，
//! 超时转为 ToolError::Timeout；每次调用输出结构化审计日志（JSON）。

use std::time::{Duration, Instant};

use tokio::time::timeout;

use crate::core::ToolError;
use crate::intent::ToolArgs;
use crate::tools::{ToolRegistry, ToolResult, ToolSpec};

pub struct ToolExecutor {
    registry: ToolRegistry,
    timeout: Duration,
}

impl ToolExecutor {
    pub fn new(registry: ToolRegistry, timeout_secs: u64) -> Self {
        Self::with_timeout(registry, Duration::from_secs(timeout_secs))
    }

    pub fn with_timeout(registry: ToolRegistry, timeout: Duration) -> Self {
        Self { registry, timeout }
    }

    /// 执行指定工具；超时返回 Timeout，其它错误原样返回；输出 JSON 审计日志
    pub async fn invoke(&self, tool_name: &str, args: &ToolArgs) -> Result<ToolResult, ToolError> {
        let start = Instant::now();
        let result = timeout(self.timeout, self.registry.invoke(tool_name, args)).await;

        let outcome = match &result {
            Ok(Ok(r)) if r.success => "ok",
            Ok(Ok(_)) => "reported_failure",
            Ok(Err(ToolError::UnknownTool(_))) => "unknown_tool",
            Ok(Err(ToolError::InvalidArgs { .. })) => "invalid_args",
            Ok(Err(_)) => "error",
            Err(_) => "timeout",
        };
        let audit = serde_json::json!({
            "event": "tool_audit",
            "tool": tool_name,
            "ok": outcome == "ok",
            "outcome": outcome,
            "duration_ms": start.elapsed().as_millis() as u64,
            "args_preview": args_preview(args),
        });
        tracing::info!(audit = %audit, "tool");

        match result {
            Ok(r) => r,
            Err(_) => Err(ToolError::Timeout(tool_name.to_string())),
        }
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    pub fn contains(&self, name: &str) -> bool {
        self.registry.contains(name)
    }

    pub fn specs(&self) -> Vec<ToolSpec> {
        self.registry.specs()
    }

    pub fn tool_names(&self) -> Vec<String> {
        self.registry.tool_names()
    }
}

fn args_preview(args: &ToolArgs) -> String {
    let s = serde_json::Value::Object(args.clone()).to_string();
    if s.chars().count() > 200 {
        format!("{}...", s.chars().take(200).collect::<String>())
    } else {
        s
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::Tool;
    use async_trait::async_trait;

    struct Sleepy;

    #[async_trait]
    impl Tool for Sleepy {
        fn name(&self) -> &str {
            "sleepy"
        }

        fn description(&self) -> &str {
            "Sleeps for a while"
        }

        async fn execute(&self, _args: &ToolArgs) -> Result<ToolResult, String> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(ToolResult::ok("woke up"))
        }
    }

    #[tokio::test]
    async fn test_timeout_is_tool_error() {
        let mut registry = ToolRegistry::new();
        registry.register(Sleepy);
        let executor = ToolExecutor::with_timeout(registry, Duration::from_millis(20));
        let err = executor.invoke("sleepy", &ToolArgs::new()).await.unwrap_err();
        assert_eq!(err, ToolError::Timeout("sleepy".into()));
    }

    #[test]
    fn test_args_preview_truncates() {
        let mut args = ToolArgs::new();
        args.insert("text".into(), serde_json::Value::String("x".repeat(500)));
        assert!(args_preview(&args).ends_with("..."));
    }
}
