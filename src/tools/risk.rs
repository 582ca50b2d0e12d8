//! 风险标记：某个工具是否需要用户确认
//!
//! 只看工具名：工具自身的默认值，叠加配置 [tools.risk] 的覆盖。参数永远不参与判断。

use std::collections::{HashMap, HashSet};

use crate::tools::ToolRegistry;

#[derive(Debug, Clone, Default)]
pub struct RiskPolicy {
    risky: HashSet<String>,
}

impl RiskPolicy {
    /// 由注册表的默认值和配置覆盖构建；覆盖中出现未注册的工具名只记日志
    pub fn from_registry(registry: &ToolRegistry, overrides: &HashMap<String, bool>) -> Self {
        let mut risky: HashSet<String> = registry
            .tool_names()
            .into_iter()
            .filter(|name| {
                registry
                    .get(name)
                    .map(|t| t.requires_confirmation())
                    .unwrap_or(false)
            })
            .collect();
        for (name, flag) in overrides {
            if !registry.contains(name) {
                tracing::warn!(tool = %name, "risk override for unregistered tool");
            }
            if *flag {
                risky.insert(name.clone());
            } else {
                risky.remove(name);
            }
        }
        Self { risky }
    }

    pub fn with_risky<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            risky: names.into_iter().map(Into::into).collect(),
        }
    }

    pub fn is_risky(&self, tool: &str) -> bool {
        self.risky.contains(tool)
    }
}
