//! Mock 后端（用于测试与 --mock 运行，无需模型服务）
//!
//! 预置回复按顺序消费；队列为空时回显 prompt 中的用户部分。每次调用都会记录下来供断言。

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::core::AssistantError;
use crate::intent::ToolArgs;
use crate::llm::{BackendReply, LanguageBackend};
use crate::memory::ConversationTurn;
use crate::tools::ToolSpec;

/// 一次 generate 调用的记录
#[derive(Debug, Clone, PartialEq)]
pub struct MockCall {
    pub prompt: String,
    pub tools_offered: bool,
    pub history_len: usize,
}

#[derive(Debug, Default)]
pub struct MockBackend {
    replies: Mutex<VecDeque<Result<BackendReply, String>>>,
    calls: Mutex<Vec<MockCall>>,
}

impl MockBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_replies(replies: impl IntoIterator<Item = Result<BackendReply, String>>) -> Self {
        Self {
            replies: Mutex::new(replies.into_iter().collect()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn reply(text: impl Into<String>) -> Result<BackendReply, String> {
        Ok(BackendReply::Reply(text.into()))
    }

    pub fn tool_call(name: impl Into<String>, args: ToolArgs) -> Result<BackendReply, String> {
        Ok(BackendReply::ToolCall {
            name: name.into(),
            args,
        })
    }

    pub fn calls(&self) -> Vec<MockCall> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }
}

/// 渲染后的 prompt 以 "## User\n" 分段时只回显用户部分
fn user_part(prompt: &str) -> &str {
    prompt
        .rsplit_once("## User\n")
        .map(|(_, u)| u)
        .unwrap_or(prompt)
        .trim()
}

#[async_trait]
impl LanguageBackend for MockBackend {
    fn name(&self) -> &str {
        "mock"
    }

    async fn generate(
        &self,
        prompt: &str,
        tools: Option<&[ToolSpec]>,
        history: &[ConversationTurn],
    ) -> Result<BackendReply, AssistantError> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(MockCall {
                prompt: prompt.to_string(),
                tools_offered: tools.is_some_and(|t| !t.is_empty()),
                history_len: history.len(),
            });
        }
        let next = self.replies.lock().ok().and_then(|mut q| q.pop_front());
        match next {
            Some(Ok(reply)) => Ok(reply),
            Some(Err(e)) => Err(AssistantError::BackendUnavailable(e)),
            None => Ok(BackendReply::Reply(format!("Echo from Mock: {}", user_part(prompt)))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_scripted_then_echo() {
        let mock = MockBackend::with_replies([MockBackend::reply("first"), Err("down".to_string())]);
        assert_eq!(
            mock.generate("a", None, &[]).await.unwrap(),
            BackendReply::Reply("first".into())
        );
        assert!(matches!(
            mock.generate("b", None, &[]).await,
            Err(AssistantError::BackendUnavailable(_))
        ));
        assert_eq!(
            mock.generate("## Context\n### Screen\nx\n\n## User\nhello", None, &[])
                .await
                .unwrap(),
            BackendReply::Reply("Echo from Mock: hello".into())
        );
        assert_eq!(mock.calls().len(), 3);
        assert!(!mock.calls()[0].tools_offered);
    }
}
