//! 工具调用 JSON Schema 生成（schemars）
//!
//! 不支持原生 function calling 的后端（OpenAI 兼容文本模式）把它拼进 system prompt，减少格式错误。

use schemars::{schema_for, JsonSchema};
use std::collections::HashMap;

/// 工具调用请求格式：`{"tool": "...", "args": {...}}`（仅用于 Schema 生成）
#[allow(dead_code)]
#[derive(JsonSchema)]
struct ToolCallFormat {
    /// 工具名，如 read-screen、type-text、click-at
    pub tool: String,
    /// 工具参数，值只能是字符串、数字或布尔
    pub args: HashMap<String, serde_json::Value>,
}

/// 返回工具调用的 JSON Schema 字符串，可拼入 system prompt
pub fn tool_call_schema_json() -> String {
    let schema = schema_for!(ToolCallFormat);
    serde_json::to_string_pretty(&schema).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_mentions_fields() {
        let s = tool_call_schema_json();
        assert!(s.contains("\"tool\""));
        assert!(s.contains("\"args\""));
    }
}
