//! 语言后端抽象
//!
//! 所有后端（Ollama / OpenAI 兼容 / Mock）实现 LanguageBackend：给定 prompt、可选工具列表与会话历史，
//! 返回自然语言回复或一次结构化工具调用。后端持有自己的 system prompt。

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::core::AssistantError;
use crate::intent::ToolArgs;
use crate::memory::ConversationTurn;
use crate::tools::ToolSpec;

/// 后端一次 generate 的结果
#[derive(Debug, Clone, PartialEq)]
pub enum BackendReply {
    Reply(String),
    ToolCall { name: String, args: ToolArgs },
}

#[async_trait]
pub trait LanguageBackend: Send + Sync {
    /// 后端名（日志用）
    fn name(&self) -> &str;

    /// tools 为 None 或空时后端不得发起工具调用
    async fn generate(
        &self,
        prompt: &str,
        tools: Option<&[ToolSpec]>,
        history: &[ConversationTurn],
    ) -> Result<BackendReply, AssistantError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    pub fn new(role: ChatRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }
}

/// system + 历史轮次（user/assistant 交替）+ 当前 prompt
pub fn build_messages(system: &str, history: &[ConversationTurn], prompt: &str) -> Vec<ChatMessage> {
    let mut messages = Vec::with_capacity(history.len() * 2 + 2);
    if !system.trim().is_empty() {
        messages.push(ChatMessage::new(ChatRole::System, system));
    }
    for turn in history {
        messages.push(ChatMessage::new(ChatRole::User, turn.utterance.text.clone()));
        if !turn.response.is_empty() {
            messages.push(ChatMessage::new(ChatRole::Assistant, turn.response.clone()));
        }
    }
    messages.push(ChatMessage::new(ChatRole::User, prompt));
    messages
}

/// 文本模式工具调用解析：```json 块或首个 `{` 到最后一个 `}`；
/// 含非空 "tool" 字段才算工具调用，其它一律当作自然语言回复
pub fn parse_backend_output(output: &str) -> BackendReply {
    let trimmed = output.trim();

    let json_str = if let Some(start) = trimmed.find("```json") {
        let rest = &trimmed[start + 7..];
        rest.find("```").map(|end| rest[..end].trim()).unwrap_or(rest.trim())
    } else if let (Some(start), Some(end)) = (trimmed.find('{'), trimmed.rfind('}')) {
        if start < end {
            &trimmed[start..=end]
        } else {
            return BackendReply::Reply(trimmed.to_string());
        }
    } else {
        return BackendReply::Reply(trimmed.to_string());
    };

    #[derive(Deserialize)]
    struct TextToolCall {
        #[serde(default)]
        tool: String,
        #[serde(default)]
        args: ToolArgs,
    }

    match serde_json::from_str::<TextToolCall>(json_str) {
        Ok(call) if !call.tool.trim().is_empty() => BackendReply::ToolCall {
            name: call.tool.trim().to_string(),
            args: call.args,
        },
        Ok(_) => BackendReply::Reply(trimmed.to_string()),
        Err(e) => {
            tracing::debug!(error = %e, "backend output is not a tool call");
            BackendReply::Reply(trimmed.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::intent::{Intent, ModelPrompt, Utterance};

    #[test]
    fn test_parse_plain_reply() {
        assert_eq!(
            parse_backend_output("  Your inbox has 3 unread messages. "),
            BackendReply::Reply("Your inbox has 3 unread messages.".into())
        );
    }

    #[test]
    fn test_parse_fenced_tool_call() {
        let out = "Sure.\n```json\n{\"tool\": \"click-at\", \"args\": {\"x\": 5, \"y\": 6}}\n```";
        match parse_backend_output(out) {
            BackendReply::ToolCall { name, args } => {
                assert_eq!(name, "click-at");
                assert_eq!(args["x"], 5);
            }
            other => panic!("expected tool call, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_braces_without_tool_is_reply() {
        let out = "Use {curly braces} in the template";
        assert_eq!(parse_backend_output(out), BackendReply::Reply(out.into()));
        let out = r#"{"answer": 42}"#;
        assert_eq!(parse_backend_output(out), BackendReply::Reply(out.into()));
    }

    #[test]
    fn test_build_messages_order() {
        let turn = ConversationTurn::new(
            Utterance::console("hello"),
            Intent::ModelTurn(ModelPrompt::new("hello")),
            None,
            "Hi there",
            vec![],
        );
        let msgs = build_messages("sys", &[turn], "next");
        let roles: Vec<_> = msgs.iter().map(|m| m.role).collect();
        assert_eq!(
            roles,
            vec![ChatRole::System, ChatRole::User, ChatRole::Assistant, ChatRole::User]
        );
        assert_eq!(msgs[3].content, "next");
    }
}
