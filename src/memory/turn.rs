//! ConversationTurn：一轮循环的完整记录，也是写入记忆库的单位

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::core::LoopState;
use crate::intent::{Intent, Utterance};
use crate::tools::ToolResult;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub id: Uuid,
    pub utterance: Utterance,
    pub intent: Intent,
    pub tool_result: Option<ToolResult>,
    pub response: String,
    pub timestamp: DateTime<Utc>,
    /// 本轮经过的状态序列（Idle 不计入）
    #[serde(default)]
    pub trace: Vec<LoopState>,
}

impl ConversationTurn {
    pub fn new(
        utterance: Utterance,
        intent: Intent,
        tool_result: Option<ToolResult>,
        response: impl Into<String>,
        trace: Vec<LoopState>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            utterance,
            intent,
            tool_result,
            response: response.into(),
            timestamp: Utc::now(),
            trace,
        }
    }

    /// 用于检索与预览的纯文本
    pub fn memory_text(&self) -> String {
        match &self.tool_result {
            Some(r) => format!(
                "User: {}\nTool: {}\nAssistant: {}",
                self.utterance.text, r.summary, self.response
            ),
            None => format!("User: {}\nAssistant: {}", self.utterance.text, self.response),
        }
    }

    /// 本轮是否有工具失败
    pub fn tool_failed(&self) -> bool {
        self.tool_result.as_ref().is_some_and(|r| !r.success)
    }
}
