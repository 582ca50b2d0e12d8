//! Jarvis - 本地桌面语音助手
//!
//! 模块划分：
//! - **config**: 应用配置加载（TOML + 环境变量）
//! - **core**: 错误、循环状态、编排循环、构建器、优雅关闭
//! - **intent**: Utterance / Intent 类型、规则表与意图路由
//! - **io**: 控制台 / 语音输入，控制台 / TTS 输出
//! - **llm**: 语言后端抽象与实现（Ollama / OpenAI 兼容 / Mock）
//! - **memory**: 会话上下文、对话记录与记忆库（内存 / SQLite）
//! - **observability**: 日志初始化
//! - **tools**: 工具库（屏幕、键鼠、摄像头、帮助、记忆检索）与执行器

pub mod config;
pub mod core;
pub mod intent;
pub mod io;
pub mod llm;
pub mod memory;
pub mod observability;
pub mod tools;

pub use crate::core::{AssistantBuilder, AssistantError, Orchestrator};
