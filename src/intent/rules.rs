//! 意图规则：(pattern, target, 参数提取器)
//!
//! pattern 以大小写不敏感方式匹配空白折叠后的文本，等价于匹配小写文本；
//! 参数从只去掉首尾空白的原文中捕获，保留大小写与内部空白。
//! 规则顺序来自配置，先命中者胜。

use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::{ArgSpecConfig, IntentRuleConfig};
use crate::core::AssistantError;
use crate::intent::ToolArgs;

/// 参数值类型
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArgKind {
    #[default]
    Text,
    Integer,
    Number,
    Boolean,
}

impl ArgKind {
    /// 把捕获到的文本转换为 JSON 原始值；空文本或格式错误返回 Err
    pub fn coerce(self, raw: &str) -> Result<Value, String> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err("empty value".to_string());
        }
        match self {
            ArgKind::Text => Ok(Value::String(raw.to_string())),
            ArgKind::Integer => raw
                .parse::<i64>()
                .map(Value::from)
                .map_err(|_| format!("'{raw}' is not an integer")),
            ArgKind::Number => raw
                .parse::<f64>()
                .ok()
                .and_then(serde_json::Number::from_f64)
                .map(Value::Number)
                .ok_or_else(|| format!("'{raw}' is not a number")),
            ArgKind::Boolean => match raw.to_lowercase().as_str() {
                "true" | "yes" | "on" => Ok(Value::Bool(true)),
                "false" | "no" | "off" => Ok(Value::Bool(false)),
                _ => Err(format!("'{raw}' is not a boolean")),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ArgSource {
    /// 第 n 个捕获组（从 1 开始）
    Group(usize),
    Literal(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ArgSpec {
    pub name: String,
    pub source: ArgSource,
    pub kind: ArgKind,
}

impl ArgSpec {
    pub fn group(name: &str, group: usize, kind: ArgKind) -> Self {
        Self {
            name: name.to_string(),
            source: ArgSource::Group(group),
            kind,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum RuleTarget {
    Tool { name: String, args: Vec<ArgSpec> },
    Shutdown,
}

#[derive(Debug, Clone)]
pub struct IntentRule {
    pattern: Regex,
    pub target: RuleTarget,
}

impl IntentRule {
    pub fn new(pattern: &str, target: RuleTarget) -> Result<Self, AssistantError> {
        let regex = RegexBuilder::new(pattern)
            .case_insensitive(true)
            .build()
            .map_err(|e| AssistantError::Config(format!("invalid intent pattern '{pattern}': {e}")))?;
        if let RuleTarget::Tool { args, .. } = &target {
            for arg in args {
                if let ArgSource::Group(g) = arg.source {
                    if g == 0 || g >= regex.captures_len() {
                        return Err(AssistantError::Config(format!(
                            "pattern '{pattern}' has no capture group {g} for argument '{}'",
                            arg.name
                        )));
                    }
                }
            }
        }
        Ok(Self {
            pattern: regex,
            target,
        })
    }

    pub fn tool(pattern: &str, tool: &str, args: Vec<ArgSpec>) -> Result<Self, AssistantError> {
        Self::new(
            pattern,
            RuleTarget::Tool {
                name: tool.to_string(),
                args,
            },
        )
    }

    pub fn pattern(&self) -> &str {
        self.pattern.as_str()
    }

    /// 目标工具名；Shutdown 规则返回 None
    pub fn tool_name(&self) -> Option<&str> {
        match &self.target {
            RuleTarget::Tool { name, .. } => Some(name.as_str()),
            RuleTarget::Shutdown => None,
        }
    }

    /// 不匹配返回 None；匹配时返回参数提取结果
    ///
    /// 是否命中只看 `normalized`；捕获优先取自 `original`，原文因内部空白不匹配时退回折叠文本。
    pub fn apply(&self, normalized: &str, original: &str) -> Option<Result<ToolArgs, String>> {
        if !self.pattern.is_match(normalized) {
            return None;
        }
        let caps = self
            .pattern
            .captures(original.trim())
            .or_else(|| self.pattern.captures(normalized))?;
        let RuleTarget::Tool { args, .. } = &self.target else {
            return Some(Ok(ToolArgs::new()));
        };
        let mut out = ToolArgs::new();
        for spec in args {
            let raw = match &spec.source {
                ArgSource::Group(g) => caps.get(*g).map(|m| m.as_str()).unwrap_or(""),
                ArgSource::Literal(v) => v.as_str(),
            };
            match spec.kind.coerce(raw) {
                Ok(value) => {
                    out.insert(spec.name.clone(), value);
                }
                Err(e) => return Some(Err(format!("argument '{}': {e}", spec.name))),
            }
        }
        Some(Ok(out))
    }
}

impl TryFrom<&IntentRuleConfig> for IntentRule {
    type Error = AssistantError;

    fn try_from(cfg: &IntentRuleConfig) -> Result<Self, Self::Error> {
        let target = match (&cfg.tool, cfg.shutdown) {
            (None, true) => RuleTarget::Shutdown,
            (Some(tool), false) => RuleTarget::Tool {
                name: tool.clone(),
                args: cfg
                    .args
                    .iter()
                    .map(arg_from_config)
                    .collect::<Result<_, _>>()?,
            },
            _ => {
                return Err(AssistantError::Config(format!(
                    "intent '{}' must set exactly one of `tool` or `shutdown = true`",
                    cfg.pattern
                )))
            }
        };
        IntentRule::new(&cfg.pattern, target)
    }
}

fn arg_from_config(cfg: &ArgSpecConfig) -> Result<ArgSpec, AssistantError> {
    let source = match (cfg.group, &cfg.value) {
        (Some(g), None) => ArgSource::Group(g),
        (None, Some(v)) => ArgSource::Literal(v.clone()),
        _ => {
            return Err(AssistantError::Config(format!(
                "argument '{}' must set exactly one of `group` or `value`",
                cfg.name
            )))
        }
    };
    Ok(ArgSpec {
        name: cfg.name.clone(),
        source,
        kind: cfg.kind,
    })
}

/// 从配置构建规则列表；配置为空时用内置规则
pub fn rules_from_config(configs: &[IntentRuleConfig]) -> Result<Vec<IntentRule>, AssistantError> {
    if configs.is_empty() {
        return default_rules();
    }
    configs.iter().map(IntentRule::try_from).collect()
}

/// 内置规则（顺序即优先级）
pub fn default_rules() -> Result<Vec<IntentRule>, AssistantError> {
    use ArgKind::*;
    Ok(vec![
        IntentRule::new(r"^(exit|quit|bye|goodbye|stop listening)[.!]?$", RuleTarget::Shutdown)?,
        IntentRule::tool(
            r"^(?:type|write)\s*:\s*(.*)$",
            "type-text",
            vec![ArgSpec::group("text", 1, Text)],
        )?,
        IntentRule::tool(
            r"^click(?:\s+at)?\s+(\d+)\s*[, ]\s*(\d+)$",
            "click-at",
            vec![ArgSpec::group("x", 1, Integer), ArgSpec::group("y", 2, Integer)],
        )?,
        IntentRule::tool(r"^click(?:\s+here)?[.!]?$", "click-at", vec![])?,
        IntentRule::tool(
            r"^move(?:\s+mouse)?(?:\s+to)?\s+(\d+)\s*[, ]\s*(\d+)$",
            "move-mouse",
            vec![ArgSpec::group("x", 1, Integer), ArgSpec::group("y", 2, Integer)],
        )?,
        IntentRule::tool(
            r"^(?:read|scan)(?:\s+the|\s+my)?\s+screen[.!]?$|^take\s+(?:a\s+)?screenshot[.!]?$",
            "read-screen",
            vec![],
        )?,
        IntentRule::tool(
            r"^(?:what do you see|camera view|capture (?:a )?webcam frame|check the (?:camera|webcam))[?.!]?$",
            "capture-webcam-frame",
            vec![],
        )?,
        IntentRule::tool(r"^(?:help|what can you do)[?.!]?$", "help", vec![])?,
        IntentRule::tool(r"^memory (?:stats|statistics)[?.!]?$", "memory-stats", vec![])?,
        IntentRule::tool(
            r"^(?:recent memories|what do you remember)[?.!]?$",
            "recent-memories",
            vec![],
        )?,
        IntentRule::tool(
            r"^(?:recall|search memory(?: for)?)(?:\s*:\s*|\s+|$)(.*)$",
            "recall-memory",
            vec![ArgSpec::group("query", 1, Text)],
        )?,
    ])
}
