//! 记忆层：会话上下文（短期）、记忆库（长期检索，内存 / SQLite）

pub mod context;
pub mod sqlite;
pub mod store;
pub mod turn;

pub use context::SessionContext;
pub use sqlite::SqliteMemoryStore;
pub use store::{InMemoryStore, MemoryStats, MemoryStore, NoopMemoryStore};
pub use turn::ConversationTurn;
