//! 记忆类工具：recall-memory（按相似度检索）、recent-memories（最近几轮）、memory-stats（统计）

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::intent::ToolArgs;
use crate::memory::{ConversationTurn, MemoryStore};
use crate::tools::{Tool, ToolResult};

/// 每条结果预览的最大字符数
const PREVIEW_CHARS: usize = 100;
/// recent-memories 默认条数
const RECENT_DEFAULT: usize = 5;

fn preview_lines(turns: &[ConversationTurn]) -> String {
    turns
        .iter()
        .map(|turn| {
            let text = turn.memory_text().replace('\n', " | ");
            let preview: String = text.chars().take(PREVIEW_CHARS).collect();
            if text.chars().count() > PREVIEW_CHARS {
                format!("- {preview}...")
            } else {
                format!("- {preview}")
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn limit_arg(args: &ToolArgs, default: usize) -> usize {
    args.get("limit")
        .and_then(Value::as_u64)
        .map(|k| k as usize)
        .unwrap_or(default)
        .max(1)
}

pub struct RecallMemoryTool {
    store: Arc<dyn MemoryStore>,
    default_k: usize,
}

impl RecallMemoryTool {
    pub fn new(store: Arc<dyn MemoryStore>, default_k: usize) -> Self {
        Self { store, default_k }
    }
}

#[async_trait]
impl Tool for RecallMemoryTool {
    fn name(&self) -> &str {
        "recall-memory"
    }

    fn description(&self) -> &str {
        "Search past conversations for turns related to a query."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "query": { "type": "string", "description": "What to look for" },
                "limit": { "type": "integer", "description": "Maximum number of results" }
            },
            "required": ["query"]
        })
    }

    async fn execute(&self, args: &ToolArgs) -> Result<ToolResult, String> {
        let query = args
            .get("query")
            .and_then(Value::as_str)
            .ok_or("No search query specified")?;
        let k = limit_arg(args, self.default_k);

        let hits = self.store.search(query, k);
        if hits.is_empty() {
            return Ok(ToolResult::ok("No relevant memories found."));
        }
        let ids: Vec<String> = hits.iter().map(|t| t.id.to_string()).collect();
        Ok(ToolResult::ok(format!(
            "Found {} relevant memories:\n{}",
            hits.len(),
            preview_lines(&hits)
        ))
        .with_payload(json!({ "turn_ids": ids })))
    }
}

pub struct RecentMemoriesTool {
    store: Arc<dyn MemoryStore>,
}

impl RecentMemoriesTool {
    pub fn new(store: Arc<dyn MemoryStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Tool for RecentMemoriesTool {
    fn name(&self) -> &str {
        "recent-memories"
    }

    fn description(&self) -> &str {
        "List the most recent remembered conversation turns, newest first."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "limit": { "type": "integer", "description": "Maximum number of turns" }
            }
        })
    }

    async fn execute(&self, args: &ToolArgs) -> Result<ToolResult, String> {
        let recent = self.store.recent(limit_arg(args, RECENT_DEFAULT));
        if recent.is_empty() {
            return Ok(ToolResult::ok("No recent memories found."));
        }
        Ok(ToolResult::ok(format!("Recent memories:\n{}", preview_lines(&recent)))
            .with_payload(json!({ "count": recent.len() })))
    }
}

pub struct MemoryStatsTool {
    store: Arc<dyn MemoryStore>,
}

impl MemoryStatsTool {
    pub fn new(store: Arc<dyn MemoryStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Tool for MemoryStatsTool {
    fn name(&self) -> &str {
        "memory-stats"
    }

    fn description(&self) -> &str {
        "Report how many conversation turns are remembered and where."
    }

    async fn execute(&self, _args: &ToolArgs) -> Result<ToolResult, String> {
        let stats = self.store.stats();
        Ok(ToolResult::ok(format!(
            "Memory statistics: {} turns stored ({} backend), {} with failed tools.",
            stats.entries, stats.backend, stats.failed_tool_turns
        ))
        .with_payload(json!(stats)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::intent::{Intent, ModelPrompt, Utterance};
    use crate::memory::InMemoryStore;

    fn turn(user: &str, reply: &str) -> ConversationTurn {
        ConversationTurn::new(
            Utterance::console(user),
            Intent::ModelTurn(ModelPrompt::new(user)),
            None,
            reply,
            Vec::new(),
        )
    }

    #[tokio::test]
    async fn test_recall_finds_matching_turn() {
        let store = Arc::new(InMemoryStore::new(100));
        store.append(&turn("the project deadline is friday", "Noted.")).unwrap();
        store.append(&turn("play some music", "Okay.")).unwrap();

        let tool = RecallMemoryTool::new(store, 3);
        let mut args = ToolArgs::new();
        args.insert("query".into(), json!("deadline"));
        let result = tool.execute(&args).await.unwrap();
        assert!(result.summary.starts_with("Found 1 relevant memories"));
        assert!(result.summary.contains("friday"));
    }

    #[tokio::test]
    async fn test_recall_nothing_found() {
        let tool = RecallMemoryTool::new(Arc::new(InMemoryStore::new(10)), 3);
        let mut args = ToolArgs::new();
        args.insert("query".into(), json!("anything"));
        let result = tool.execute(&args).await.unwrap();
        assert_eq!(result.summary, "No relevant memories found.");
    }

    #[tokio::test]
    async fn test_recent_memories_newest_first() {
        let store = Arc::new(InMemoryStore::new(100));
        for text in ["first", "second", "third"] {
            store.append(&turn(text, "ok")).unwrap();
        }
        let tool = RecentMemoriesTool::new(store);
        let mut args = ToolArgs::new();
        args.insert("limit".into(), json!(2));
        let result = tool.execute(&args).await.unwrap();
        let lines: Vec<&str> = result.summary.lines().collect();
        assert_eq!(lines[0], "Recent memories:");
        assert_eq!(lines.len(), 3);
        assert!(lines[1].contains("third"));
        assert!(lines[2].contains("second"));
    }

    #[tokio::test]
    async fn test_recent_memories_empty_store() {
        let tool = RecentMemoriesTool::new(Arc::new(InMemoryStore::new(10)));
        let result = tool.execute(&ToolArgs::new()).await.unwrap();
        assert_eq!(result.summary, "No recent memories found.");
    }

    #[tokio::test]
    async fn test_memory_stats_reports_entries() {
        let store = Arc::new(InMemoryStore::new(10));
        store.append(&turn("hello", "hi")).unwrap();
        let tool = MemoryStatsTool::new(store);
        let result = tool.execute(&ToolArgs::new()).await.unwrap();
        assert!(result.summary.starts_with("Memory statistics: 1 turns stored"));
        assert_eq!(result.payload.unwrap()["entries"], 1);
    }
}
