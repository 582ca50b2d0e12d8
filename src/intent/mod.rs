//! 意图识别：规则表 + 路由器（快速路径走工具，其余交给语言后端）

pub mod router;
pub mod rules;
pub mod types;

pub use router::{IntentRouter, RouteContext};
pub use rules::{default_rules, rules_from_config, ArgKind, ArgSpec, IntentRule, RuleTarget};
pub use types::{Channel, ContextBlock, Intent, ModelPrompt, ToolArgs, ToolCall, Utterance};
