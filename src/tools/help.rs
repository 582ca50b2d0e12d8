//! help：列出能力与示例命令

use async_trait::async_trait;

use crate::intent::ToolArgs;
use crate::tools::{Tool, ToolResult};

pub struct HelpTool {
    text: String,
}

impl HelpTool {
    /// tool_names 为当前注册的工具，用于拼出 "Tools:" 一行
    pub fn new(assistant_name: &str, tool_names: &[String]) -> Self {
        let text = format!(
            "I'm {assistant_name}, your desktop assistant. Here's what I can do:\n\
             - Read your screen: 'read screen'\n\
             - Capture a webcam frame: 'what do you see'\n\
             - Type text: 'type: Hello World'\n\
             - Click: 'click 500 400'\n\
             - Move the mouse: 'move 1000 500'\n\
             - Search our past conversations: 'recall: project deadline'\n\
             - Memory: 'memory stats', 'recent memories'\n\
             - Anything else goes to the local language model.\n\
             Say 'exit' to quit.\n\
             Tools: {}",
            tool_names.join(", ")
        );
        Self { text }
    }
}

#[async_trait]
impl Tool for HelpTool {
    fn name(&self) -> &str {
        "help"
    }

    fn description(&self) -> &str {
        "Explain what the assistant can do."
    }

    async fn execute(&self, _args: &ToolArgs) -> Result<ToolResult, String> {
        Ok(ToolResult::ok(self.text.clone()))
    }
}
