//! 工具注册表
//!
//! 所有工具实现 Tool trait（name / description / parameters_schema / execute），由 ToolRegistry 按名注册与查找；
//! invoke 先按参数 schema 校验，再执行，错误统一为 ToolError。

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::core::ToolError;
use crate::intent::ToolArgs;

/// 工具执行结果：创建后不再修改
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResult {
    pub success: bool,
    pub summary: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<Value>,
}

impl ToolResult {
    pub fn ok(summary: impl Into<String>) -> Self {
        Self {
            success: true,
            summary: summary.into(),
            payload: None,
        }
    }

    pub fn failure(summary: impl Into<String>) -> Self {
        Self {
            success: false,
            summary: summary.into(),
            payload: None,
        }
    }

    pub fn with_payload(mut self, payload: Value) -> Self {
        self.payload = Some(payload);
        self
    }
}

/// 发给语言后端的工具描述
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

/// 工具 trait：名称、描述（供 LLM 理解）、参数 schema、是否默认需要确认、异步执行
#[async_trait]
pub trait Tool: Send + Sync {
    /// 工具名称（规则与后端 tool call 都按此名引用）
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    /// 参数 JSON Schema，默认无参数
    fn parameters_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {},
            "required": []
        })
    }

    /// 默认风险标记，可被配置 [tools.risk] 覆盖
    fn requires_confirmation(&self) -> bool {
        false
    }

    /// 执行工具；Err 为面向用户的失败原因
    async fn execute(&self, args: &ToolArgs) -> Result<ToolResult, String>;
}

/// 工具注册表：按名称存储 Arc<dyn Tool>
#[derive(Default, Clone)]
pub struct ToolRegistry {
    tools: BTreeMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, tool: impl Tool + 'static) {
        self.register_arc(Arc::new(tool));
    }

    pub fn register_arc(&mut self, tool: Arc<dyn Tool>) {
        let name = tool.name().to_string();
        if self.tools.insert(name.clone(), tool).is_some() {
            tracing::warn!(tool = %name, "tool registered twice, keeping the latest");
        }
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    pub fn tool_names(&self) -> Vec<String> {
        self.tools.keys().cloned().collect()
    }

    /// 所有工具的 (name, description, parameters)，供后端 function calling
    pub fn specs(&self) -> Vec<ToolSpec> {
        self.tools
            .iter()
            .map(|(name, tool)| ToolSpec {
                name: name.clone(),
                description: tool.description().to_string(),
                parameters: tool.parameters_schema(),
            })
            .collect()
    }

    /// 校验参数后执行；未注册返回 UnknownTool，校验失败返回 InvalidArgs
    pub async fn invoke(&self, name: &str, args: &ToolArgs) -> Result<ToolResult, ToolError> {
        let tool = self
            .get(name)
            .ok_or_else(|| ToolError::UnknownTool(name.to_string()))?;
        validate_args(&tool.parameters_schema(), args).map_err(|reason| ToolError::InvalidArgs {
            tool: name.to_string(),
            reason,
        })?;
        tool.execute(args)
            .await
            .map_err(|reason| ToolError::ExecutionFailed {
                tool: name.to_string(),
                reason,
            })
    }
}

/// 按 schema 的 required / properties.type 校验参数；只接受 JSON 原始类型
pub fn validate_args(schema: &Value, args: &ToolArgs) -> Result<(), String> {
    for (key, value) in args {
        if value.is_null() || value.is_array() || value.is_object() {
            return Err(format!("argument '{key}' must be a string, number or boolean"));
        }
    }

    if let Some(required) = schema.get("required").and_then(|r| r.as_array()) {
        for field in required.iter().filter_map(|f| f.as_str()) {
            match args.get(field) {
                None => return Err(format!("missing required argument '{field}'")),
                Some(Value::String(s)) if s.trim().is_empty() => {
                    return Err(format!("argument '{field}' is empty"))
                }
                Some(_) => {}
            }
        }
    }

    if let Some(props) = schema.get("properties").and_then(|p| p.as_object()) {
        for (key, value) in args {
            let Some(expected) = props
                .get(key)
                .and_then(|p| p.get("type"))
                .and_then(|t| t.as_str())
            else {
                continue;
            };
            let ok = match expected {
                "string" => value.is_string(),
                "integer" => value.is_i64() || value.is_u64(),
                "number" => value.is_number(),
                "boolean" => value.is_boolean(),
                _ => true,
            };
            if !ok {
                return Err(format!("argument '{key}' must be of type {expected}"));
            }
        }
    }

    Ok(())
}
