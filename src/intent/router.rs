//! 意图路由器：Utterance -> Intent
//!
//! 纯函数：只依赖输入文本、规则表、风险策略和调用方给出的上下文，不做任何 I/O。

use crate::intent::rules::{IntentRule, RuleTarget};
use crate::intent::{Intent, ModelPrompt, ToolCall, Utterance};
use crate::memory::ConversationTurn;
use crate::tools::RiskPolicy;

/// 注入 ModelTurn 的上下文：最新观察与检索到的相关记忆
#[derive(Debug, Default, Clone, Copy)]
pub struct RouteContext<'a> {
    pub observations: &'a [(String, String)],
    pub recalled: &'a [ConversationTurn],
}

pub struct IntentRouter {
    rules: Vec<IntentRule>,
    risk: RiskPolicy,
}

impl IntentRouter {
    pub fn new(rules: Vec<IntentRule>, risk: RiskPolicy) -> Self {
        Self { rules, risk }
    }

    pub fn rules(&self) -> &[IntentRule] {
        &self.rules
    }

    pub fn risk(&self) -> &RiskPolicy {
        &self.risk
    }

    /// 规则引用的工具名（启动时用于校验规则与工具库一致）
    pub fn referenced_tools(&self) -> Vec<&str> {
        self.rules
            .iter()
            .filter_map(IntentRule::tool_name)
            .collect()
    }

    /// 恰好返回一个 Intent：首个命中规则决定 DirectTool / Shutdown / Unknown，无命中则 ModelTurn
    pub fn route(&self, utterance: &Utterance, ctx: &RouteContext<'_>) -> Intent {
        let text = utterance.normalized();

        for rule in &self.rules {
            let Some(extracted) = rule.apply(&text, &utterance.text) else {
                continue;
            };
            return match (&rule.target, extracted) {
                (RuleTarget::Shutdown, _) => Intent::Shutdown,
                (RuleTarget::Tool { name, .. }, Ok(args)) => {
                    Intent::DirectTool(ToolCall::new(name.clone(), args, self.risk.is_risky(name)))
                }
                (RuleTarget::Tool { name, .. }, Err(reason)) => {
                    tracing::debug!(tool = %name, %reason, "argument extraction failed");
                    Intent::Unknown {
                        tool: name.clone(),
                        reason,
                    }
                }
            };
        }

        Intent::ModelTurn(build_prompt(&utterance.text, ctx))
    }
}

fn build_prompt(utterance: &str, ctx: &RouteContext<'_>) -> ModelPrompt {
    let mut prompt = ModelPrompt::new(utterance.trim());
    for (label, content) in ctx.observations {
        prompt.upsert_context(label.clone(), content.clone());
    }
    if !ctx.recalled.is_empty() {
        let memories = ctx
            .recalled
            .iter()
            .map(|t| format!("- {}", t.memory_text().replace('\n', " | ")))
            .collect::<Vec<_>>()
            .join("\n");
        prompt.upsert_context("Relevant memories", memories);
    }
    prompt
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::intent::rules::{default_rules, ArgKind, ArgSpec};
    use serde_json::Value;

    fn router() -> IntentRouter {
        IntentRouter::new(
            default_rules().unwrap(),
            RiskPolicy::with_risky(["type-text", "click-at"]),
        )
    }

    fn route(text: &str) -> Intent {
        router().route(&Utterance::console(text), &RouteContext::default())
    }

    #[test]
    fn test_type_text_keeps_original_case() {
        match route("  Type:   Hello   Professor ") {
            Intent::DirectTool(call) => {
                assert_eq!(call.name, "type-text");
                assert_eq!(call.args["text"], "Hello   Professor");
                assert!(call.risky);
            }
            other => panic!("expected DirectTool, got {other:?}"),
        }
    }

    #[test]
    fn test_click_parses_integers() {
        match route("click 500 400") {
            Intent::DirectTool(call) => {
                assert_eq!(call.name, "click-at");
                assert_eq!(call.args["x"], Value::from(500));
                assert_eq!(call.args["y"], Value::from(400));
            }
            other => panic!("expected DirectTool, got {other:?}"),
        }
    }

    #[test]
    fn test_move_mouse_not_risky() {
        match route("move mouse to 1000, 500") {
            Intent::DirectTool(call) => {
                assert_eq!(call.name, "move-mouse");
                assert!(!call.risky);
            }
            other => panic!("expected DirectTool, got {other:?}"),
        }
    }

    #[test]
    fn test_empty_type_text_is_unknown() {
        assert!(matches!(
            route("type:"),
            Intent::Unknown { ref tool, .. } if tool == "type-text"
        ));
        assert!(matches!(route("recall"), Intent::Unknown { .. }));
    }

    #[test]
    fn test_unmatched_is_model_turn() {
        match route("what's on my screen?") {
            Intent::ModelTurn(prompt) => assert_eq!(prompt.utterance, "what's on my screen?"),
            other => panic!("expected ModelTurn, got {other:?}"),
        }
        assert!(matches!(route("tell me a joke"), Intent::ModelTurn(_)));
        assert!(matches!(route("typewriter history"), Intent::ModelTurn(_)));
    }

    #[test]
    fn test_shutdown() {
        assert_eq!(route("Goodbye!"), Intent::Shutdown);
        assert_eq!(route("  exit "), Intent::Shutdown);
    }

    #[test]
    fn test_first_match_wins() {
        let rules = vec![
            IntentRule::tool(r"^open (.*)$", "first", vec![ArgSpec::group("app", 1, ArgKind::Text)])
                .unwrap(),
            IntentRule::tool(r"^open (.*)$", "second", vec![ArgSpec::group("app", 1, ArgKind::Text)])
                .unwrap(),
        ];
        let router = IntentRouter::new(rules, RiskPolicy::default());
        match router.route(&Utterance::console("open firefox"), &RouteContext::default()) {
            Intent::DirectTool(call) => assert_eq!(call.name, "first"),
            other => panic!("expected DirectTool, got {other:?}"),
        }
    }

    #[test]
    fn test_model_turn_injects_context() {
        let observations = vec![("Screen".to_string(), "Screen OCR:\nInbox (3)".to_string())];
        let ctx = RouteContext {
            observations: &observations,
            recalled: &[],
        };
        match router().route(&Utterance::console("what's on my screen?"), &ctx) {
            Intent::ModelTurn(prompt) => {
                assert_eq!(prompt.context.len(), 1);
                assert!(prompt.render().contains("Inbox (3)"));
            }
            other => panic!("expected ModelTurn, got {other:?}"),
        }
    }

    #[test]
    fn test_route_is_deterministic() {
        let r = router();
        let u = Utterance::console("click at 10 20");
        let ctx = RouteContext::default();
        assert_eq!(r.route(&u, &ctx), r.route(&u, &ctx));
    }
}
