//! SQLite 记忆库：每轮一行，保存 turn 的 JSON 与检索文本
//!
//! rusqlite 为同步接口，Connection 放在 Mutex 中；检索在最近 max_entries 行上做词重叠打分。

use std::path::Path;
use std::sync::Mutex;

use anyhow::Context;
use rusqlite::{params, Connection};

use crate::core::AssistantError;
use crate::memory::store::rank;
use crate::memory::{ConversationTurn, MemoryStats, MemoryStore};

pub struct SqliteMemoryStore {
    conn: Mutex<Connection>,
    max_entries: usize,
}

impl SqliteMemoryStore {
    /// 打开（必要时创建）数据库文件
    pub fn open(path: impl AsRef<Path>, max_entries: usize) -> anyhow::Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("create memory dir {}", parent.display()))?;
        }
        let conn = Connection::open(path)
            .with_context(|| format!("open memory db {}", path.display()))?;
        Self::with_connection(conn, max_entries)
    }

    pub fn in_memory(max_entries: usize) -> anyhow::Result<Self> {
        Self::with_connection(Connection::open_in_memory()?, max_entries)
    }

    fn with_connection(conn: Connection, max_entries: usize) -> anyhow::Result<Self> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS turns (
                seq INTEGER PRIMARY KEY AUTOINCREMENT,
                id TEXT NOT NULL UNIQUE,
                created_at TEXT NOT NULL,
                content TEXT NOT NULL,
                tool_failed INTEGER NOT NULL DEFAULT 0,
                turn_json TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_turns_created ON turns(created_at);",
        )
        .context("init memory schema")?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM turns", [], |r| r.get(0))?;
        tracing::info!(entries = count, "memory database ready");
        Ok(Self {
            conn: Mutex::new(conn),
            max_entries: max_entries.max(1),
        })
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// 按 seq 降序读取至多 limit 条，解析失败的行跳过
    fn load_latest(&self, limit: usize) -> rusqlite::Result<Vec<ConversationTurn>> {
        let conn = self.lock();
        let mut stmt = conn.prepare("SELECT turn_json FROM turns ORDER BY seq DESC LIMIT ?1")?;
        let rows = stmt.query_map(params![limit as i64], |r| r.get::<_, String>(0))?;
        let mut turns = Vec::new();
        for row in rows {
            let json = row?;
            match serde_json::from_str::<ConversationTurn>(&json) {
                Ok(t) => turns.push(t),
                Err(e) => tracing::warn!("skipping unreadable memory row: {}", e),
            }
        }
        Ok(turns)
    }
}

impl MemoryStore for SqliteMemoryStore {
    fn append(&self, turn: &ConversationTurn) -> Result<(), AssistantError> {
        let json = serde_json::to_string(turn).map_err(|e| AssistantError::Memory(e.to_string()))?;
        let conn = self.lock();
        conn.execute(
            "INSERT OR REPLACE INTO turns (id, created_at, content, tool_failed, turn_json)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                turn.id.to_string(),
                turn.timestamp.to_rfc3339(),
                turn.memory_text(),
                turn.tool_failed() as i64,
                json
            ],
        )
        .map_err(|e| AssistantError::Memory(e.to_string()))?;
        conn.execute(
            "DELETE FROM turns WHERE seq NOT IN (SELECT seq FROM turns ORDER BY seq DESC LIMIT ?1)",
            params![self.max_entries as i64],
        )
        .map_err(|e| AssistantError::Memory(e.to_string()))?;
        Ok(())
    }

    fn search(&self, query: &str, k: usize) -> Vec<ConversationTurn> {
        match self.load_latest(self.max_entries) {
            // load_latest 为新在前，rank 需要序号越大越新
            Ok(turns) => {
                let n = turns.len();
                rank(query, turns.iter().enumerate().map(|(i, t)| (n - i, t)), k)
            }
            Err(e) => {
                tracing::warn!("memory search failed: {}", e);
                Vec::new()
            }
        }
    }

    fn recent(&self, limit: usize) -> Vec<ConversationTurn> {
        self.load_latest(limit).unwrap_or_else(|e| {
            tracing::warn!("memory recent failed: {}", e);
            Vec::new()
        })
    }

    fn stats(&self) -> MemoryStats {
        let conn = self.lock();
        let counts = conn.query_row(
            "SELECT COUNT(*), COALESCE(SUM(tool_failed), 0) FROM turns",
            [],
            |r| Ok((r.get::<_, i64>(0)?, r.get::<_, i64>(1)?)),
        );
        let (entries, failed) = counts.unwrap_or((0, 0));
        MemoryStats {
            backend: "sqlite",
            entries: entries as usize,
            failed_tool_turns: failed as usize,
        }
    }
}
