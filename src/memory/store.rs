//! 记忆库：append(turn) 与 search(query, k)
//!
//! 检索是尽力而为的「相似度」：查询词与记录词的重叠数，分数相同时新记录优先。
//! InMemoryStore 进程内有效；SqliteMemoryStore 跨进程持久化；NoopMemoryStore 关闭记忆。

use std::collections::HashSet;
use std::sync::RwLock;

use serde::Serialize;

use crate::core::AssistantError;
use crate::memory::ConversationTurn;

/// 记忆库统计
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MemoryStats {
    pub backend: &'static str,
    pub entries: usize,
    pub failed_tool_turns: usize,
}

pub trait MemoryStore: Send + Sync {
    fn append(&self, turn: &ConversationTurn) -> Result<(), AssistantError>;

    /// 最相关的至多 k 条，按相关度降序
    fn search(&self, query: &str, k: usize) -> Vec<ConversationTurn>;

    /// 最近的至多 limit 条，新的在前
    fn recent(&self, limit: usize) -> Vec<ConversationTurn>;

    fn stats(&self) -> MemoryStats;

    fn enabled(&self) -> bool {
        true
    }
}

/// 小写、去标点的词集合；单字符词忽略
pub(crate) fn tokenize(s: &str) -> HashSet<String> {
    s.split(|c: char| !c.is_alphanumeric() && c != '\'')
        .map(|w| w.trim_matches('\'').to_lowercase())
        .filter(|w| w.chars().count() > 1)
        .collect()
}

/// 对 (序号, turn) 打分并取前 k；序号越大越新
pub(crate) fn rank<'a>(
    query: &str,
    turns: impl Iterator<Item = (usize, &'a ConversationTurn)>,
    k: usize,
) -> Vec<ConversationTurn> {
    let query_tokens = tokenize(query);
    if query_tokens.is_empty() || k == 0 {
        return Vec::new();
    }
    let mut scored: Vec<(usize, usize, &ConversationTurn)> = turns
        .map(|(idx, turn)| {
            let doc = tokenize(&turn.memory_text());
            (query_tokens.intersection(&doc).count(), idx, turn)
        })
        .filter(|(score, _, _)| *score > 0)
        .collect();
    scored.sort_by(|a, b| b.0.cmp(&a.0).then(b.1.cmp(&a.1)));
    scored.into_iter().take(k).map(|(_, _, t)| t.clone()).collect()
}

/// 空实现：未启用记忆时使用
#[derive(Debug, Clone, Default)]
pub struct NoopMemoryStore;

impl MemoryStore for NoopMemoryStore {
    fn append(&self, _turn: &ConversationTurn) -> Result<(), AssistantError> {
        Ok(())
    }

    fn search(&self, _query: &str, _k: usize) -> Vec<ConversationTurn> {
        Vec::new()
    }

    fn recent(&self, _limit: usize) -> Vec<ConversationTurn> {
        Vec::new()
    }

    fn stats(&self) -> MemoryStats {
        MemoryStats {
            backend: "none",
            ..Default::default()
        }
    }

    fn enabled(&self) -> bool {
        false
    }
}

/// 进程内记忆：超出 max_entries 时丢弃最旧记录
#[derive(Debug)]
pub struct InMemoryStore {
    turns: RwLock<Vec<ConversationTurn>>,
    max_entries: usize,
}

impl InMemoryStore {
    pub fn new(max_entries: usize) -> Self {
        Self {
            turns: RwLock::new(Vec::new()),
            max_entries: max_entries.max(1),
        }
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, Vec<ConversationTurn>> {
        self.turns.read().unwrap_or_else(|e| e.into_inner())
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new(10_000)
    }
}

impl MemoryStore for InMemoryStore {
    fn append(&self, turn: &ConversationTurn) -> Result<(), AssistantError> {
        let mut turns = self.turns.write().unwrap_or_else(|e| e.into_inner());
        turns.push(turn.clone());
        let n = turns.len();
        if n > self.max_entries {
            turns.drain(0..n - self.max_entries);
        }
        Ok(())
    }

    fn search(&self, query: &str, k: usize) -> Vec<ConversationTurn> {
        let turns = self.read();
        rank(query, turns.iter().enumerate(), k)
    }

    fn recent(&self, limit: usize) -> Vec<ConversationTurn> {
        self.read().iter().rev().take(limit).cloned().collect()
    }

    fn stats(&self) -> MemoryStats {
        let turns = self.read();
        MemoryStats {
            backend: "memory",
            entries: turns.len(),
            failed_tool_turns: turns.iter().filter(|t| t.tool_failed()).count(),
        }
    }
}
