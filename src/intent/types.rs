//! 意图路由的数据类型：Utterance、Intent、ToolCall、ModelPrompt

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// 输入来源
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    Voice,
    Console,
}

/// 一次用户输入（语音转写或控制台文本），创建后不可变
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Utterance {
    pub text: String,
    pub channel: Channel,
    pub received_at: DateTime<Utc>,
}

impl Utterance {
    pub fn new(text: impl Into<String>, channel: Channel) -> Self {
        Self {
            text: text.into(),
            channel,
            received_at: Utc::now(),
        }
    }

    pub fn console(text: impl Into<String>) -> Self {
        Self::new(text, Channel::Console)
    }

    pub fn voice(text: impl Into<String>) -> Self {
        Self::new(text, Channel::Voice)
    }

    /// 折叠连续空白并去掉首尾空白（规则匹配用，保留大小写）
    pub fn normalized(&self) -> String {
        self.text.split_whitespace().collect::<Vec<_>>().join(" ")
    }
}

/// 工具参数：键为字符串，值为 JSON 原始类型（string / number / bool）
pub type ToolArgs = Map<String, Value>;

/// 一次工具调用请求；risky 只由工具名决定
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub name: String,
    pub args: ToolArgs,
    pub risky: bool,
}

impl ToolCall {
    pub fn new(name: impl Into<String>, args: ToolArgs, risky: bool) -> Self {
        Self {
            name: name.into(),
            args,
            risky,
        }
    }

    /// 给确认提示用的简短描述，如 `type-text(text="Hello")`
    pub fn describe(&self) -> String {
        if self.args.is_empty() {
            return self.name.clone();
        }
        let args = self
            .args
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join(", ");
        format!("{}({})", self.name, args)
    }
}

/// 注入给语言后端的上下文片段（记忆检索结果、屏幕 / 摄像头观察）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextBlock {
    pub label: String,
    pub content: String,
}

/// 交给语言后端的生成请求：原始输入 + 上下文
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelPrompt {
    pub utterance: String,
    pub context: Vec<ContextBlock>,
}

impl ModelPrompt {
    pub fn new(utterance: impl Into<String>) -> Self {
        Self {
            utterance: utterance.into(),
            context: Vec::new(),
        }
    }

    /// 追加或替换同名上下文（observer 刷新观察时用）
    pub fn upsert_context(&mut self, label: impl Into<String>, content: impl Into<String>) {
        let label = label.into();
        let content = content.into();
        match self.context.iter_mut().find(|b| b.label == label) {
            Some(block) => block.content = content,
            None => self.context.push(ContextBlock { label, content }),
        }
    }

    /// 渲染为发给后端的最终 user 消息
    pub fn render(&self) -> String {
        if self.context.is_empty() {
            return self.utterance.clone();
        }
        let mut s = String::from("## Context\n");
        for block in &self.context {
            s.push_str(&format!("### {}\n{}\n\n", block.label, block.content.trim_end()));
        }
        s.push_str("## User\n");
        s.push_str(&self.utterance);
        s
    }
}

/// 路由结果；每个 Utterance 恰好产生一个，由编排器消费一次
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Intent {
    /// 规则命中，直接调用工具
    DirectTool(ToolCall),
    /// 无规则命中，交给语言后端
    ModelTurn(ModelPrompt),
    /// 规则命中但参数提取失败
    Unknown { tool: String, reason: String },
    /// 用户明确要求退出
    Shutdown,
}

impl Intent {
    pub fn kind(&self) -> &'static str {
        match self {
            Intent::DirectTool(_) => "direct_tool",
            Intent::ModelTurn(_) => "model_turn",
            Intent::Unknown { .. } => "unknown",
            Intent::Shutdown => "shutdown",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalized_collapses_whitespace() {
        let u = Utterance::console("  type:   Hello \t Professor  ");
        assert_eq!(u.normalized(), "type: Hello Professor");
    }

    #[test]
    fn test_prompt_render_without_context_is_utterance() {
        let p = ModelPrompt::new("hi there");
        assert_eq!(p.render(), "hi there");
    }

    #[test]
    fn test_prompt_upsert_replaces_label() {
        let mut p = ModelPrompt::new("what's on my screen?");
        p.upsert_context("Screen", "old");
        p.upsert_context("Screen", "Screen OCR:\nInbox (3)");
        assert_eq!(p.context.len(), 1);
        let rendered = p.render();
        assert!(rendered.contains("Inbox (3)"));
        assert!(!rendered.contains("old"));
        assert!(rendered.ends_with("what's on my screen?"));
    }

    #[test]
    fn test_tool_call_describe() {
        let mut args = ToolArgs::new();
        args.insert("text".into(), Value::String("Hello".into()));
        let call = ToolCall::new("type-text", args, true);
        assert_eq!(call.describe(), "type-text(text=\"Hello\")");
    }
}
