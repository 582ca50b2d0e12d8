//! 桌面控制工具：type-text / click-at / move-mouse
//!
//! 工具只做参数解析与结果描述，实际动作交给 DesktopDriver（默认 xdotool；--mock 时用 DryRunDriver）。

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::intent::ToolArgs;
use crate::tools::command::run_command;
use crate::tools::{Tool, ToolResult};

/// 桌面动作驱动
#[async_trait]
pub trait DesktopDriver: Send + Sync {
    async fn type_text(&self, text: &str) -> Result<(), String>;

    /// None 表示在当前位置点击
    async fn click(&self, at: Option<(i64, i64)>) -> Result<(), String>;

    async fn move_mouse(&self, x: i64, y: i64) -> Result<(), String>;
}

/// 通过 xdotool 控制 X11 桌面
pub struct XdotoolDriver {
    type_delay_ms: u64,
    timeout: Duration,
}

impl XdotoolDriver {
    pub fn new(type_delay_ms: u64, timeout_secs: u64) -> Self {
        Self {
            type_delay_ms,
            timeout: Duration::from_secs(timeout_secs),
        }
    }

    async fn xdotool(&self, args: &[&str], vars: &[(&str, &str)]) -> Result<(), String> {
        let mut template = vec!["xdotool".to_string()];
        template.extend(args.iter().map(|s| s.to_string()));
        run_command(&template, vars, self.timeout).await.map(|_| ())
    }
}

#[async_trait]
impl DesktopDriver for XdotoolDriver {
    async fn type_text(&self, text: &str) -> Result<(), String> {
        let delay = self.type_delay_ms.to_string();
        self.xdotool(
            &["type", "--delay", "{delay}", "--", "{text}"],
            &[("delay", &delay), ("text", text)],
        )
        .await
    }

    async fn click(&self, at: Option<(i64, i64)>) -> Result<(), String> {
        match at {
            Some((x, y)) => {
                let (x, y) = (x.to_string(), y.to_string());
                self.xdotool(&["mousemove", "{x}", "{y}", "click", "1"], &[("x", &x), ("y", &y)])
                    .await
            }
            None => self.xdotool(&["click", "1"], &[]).await,
        }
    }

    async fn move_mouse(&self, x: i64, y: i64) -> Result<(), String> {
        let (x, y) = (x.to_string(), y.to_string());
        self.xdotool(&["mousemove", "{x}", "{y}"], &[("x", &x), ("y", &y)])
            .await
    }
}

/// 桌面动作的记录
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DesktopAction {
    Type(String),
    Click(Option<(i64, i64)>),
    Move(i64, i64),
}

/// 不碰真实桌面，只记录并打日志（--mock 与测试使用）
#[derive(Debug, Default)]
pub struct DryRunDriver {
    actions: Mutex<Vec<DesktopAction>>,
}

impl DryRunDriver {
    pub fn actions(&self) -> Vec<DesktopAction> {
        self.actions
            .lock()
            .map(|a| a.clone())
            .unwrap_or_else(|e| e.into_inner().clone())
    }

    fn record(&self, action: DesktopAction) {
        tracing::info!(?action, "dry-run desktop action");
        match self.actions.lock() {
            Ok(mut a) => a.push(action),
            Err(e) => e.into_inner().push(action),
        }
    }
}

#[async_trait]
impl DesktopDriver for DryRunDriver {
    async fn type_text(&self, text: &str) -> Result<(), String> {
        self.record(DesktopAction::Type(text.to_string()));
        Ok(())
    }

    async fn click(&self, at: Option<(i64, i64)>) -> Result<(), String> {
        self.record(DesktopAction::Click(at));
        Ok(())
    }

    async fn move_mouse(&self, x: i64, y: i64) -> Result<(), String> {
        self.record(DesktopAction::Move(x, y));
        Ok(())
    }
}

fn coords(args: &ToolArgs) -> Result<Option<(i64, i64)>, String> {
    let x = args.get("x").and_then(Value::as_i64);
    let y = args.get("y").and_then(Value::as_i64);
    match (x, y) {
        (Some(x), Some(y)) => Ok(Some((x, y))),
        (None, None) => Ok(None),
        _ => Err("Both x and y are required".to_string()),
    }
}

fn coords_schema(required: bool) -> Value {
    let required: Vec<&str> = if required { vec!["x", "y"] } else { vec![] };
    json!({
        "type": "object",
        "properties": {
            "x": { "type": "integer", "description": "Screen x coordinate in pixels" },
            "y": { "type": "integer", "description": "Screen y coordinate in pixels" }
        },
        "required": required
    })
}

pub struct TypeTextTool {
    driver: Arc<dyn DesktopDriver>,
}

impl TypeTextTool {
    pub fn new(driver: Arc<dyn DesktopDriver>) -> Self {
        Self { driver }
    }
}

#[async_trait]
impl Tool for TypeTextTool {
    fn name(&self) -> &str {
        "type-text"
    }

    fn description(&self) -> &str {
        "Type text into the focused window using the keyboard."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "text": { "type": "string", "description": "Text to type" }
            },
            "required": ["text"]
        })
    }

    fn requires_confirmation(&self) -> bool {
        true
    }

    async fn execute(&self, args: &ToolArgs) -> Result<ToolResult, String> {
        let text = args
            .get("text")
            .and_then(Value::as_str)
            .ok_or("No text specified for typing")?;
        self.driver.type_text(text).await?;
        Ok(ToolResult::ok(format!("Typed: {text}")))
    }
}

pub struct ClickTool {
    driver: Arc<dyn DesktopDriver>,
}

impl ClickTool {
    pub fn new(driver: Arc<dyn DesktopDriver>) -> Self {
        Self { driver }
    }
}

#[async_trait]
impl Tool for ClickTool {
    fn name(&self) -> &str {
        "click-at"
    }

    fn description(&self) -> &str {
        "Left-click at screen coordinates (x, y); without coordinates clicks at the current mouse position."
    }

    fn parameters_schema(&self) -> Value {
        coords_schema(false)
    }

    fn requires_confirmation(&self) -> bool {
        true
    }

    async fn execute(&self, args: &ToolArgs) -> Result<ToolResult, String> {
        let at = coords(args)?;
        self.driver.click(at).await?;
        let summary = match at {
            Some((x, y)) => format!("Clicked at ({x}, {y})"),
            None => "Clicked at current position".to_string(),
        };
        Ok(ToolResult::ok(summary))
    }
}

pub struct MoveMouseTool {
    driver: Arc<dyn DesktopDriver>,
}

impl MoveMouseTool {
    pub fn new(driver: Arc<dyn DesktopDriver>) -> Self {
        Self { driver }
    }
}

#[async_trait]
impl Tool for MoveMouseTool {
    fn name(&self) -> &str {
        "move-mouse"
    }

    fn description(&self) -> &str {
        "Move the mouse cursor to screen coordinates (x, y)."
    }

    fn parameters_schema(&self) -> Value {
        coords_schema(true)
    }

    async fn execute(&self, args: &ToolArgs) -> Result<ToolResult, String> {
        let (x, y) = coords(args)?.ok_or("Both x and y are required")?;
        self.driver.move_mouse(x, y).await?;
        Ok(ToolResult::ok(format!("Moved mouse to ({x}, {y})")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(v: Value) -> ToolArgs {
        v.as_object().cloned().unwrap()
    }

    #[tokio::test]
    async fn test_type_text_records_and_summarises() {
        let driver = Arc::new(DryRunDriver::default());
        let tool = TypeTextTool::new(driver.clone());
        let result = tool
            .execute(&args(json!({"text": "Hello Professor"})))
            .await
            .unwrap();
        assert_eq!(result.summary, "Typed: Hello Professor");
        assert_eq!(driver.actions(), vec![DesktopAction::Type("Hello Professor".into())]);
    }

    #[tokio::test]
    async fn test_click_without_coords_uses_current_position() {
        let driver = Arc::new(DryRunDriver::default());
        let tool = ClickTool::new(driver.clone());
        let result = tool.execute(&ToolArgs::new()).await.unwrap();
        assert_eq!(result.summary, "Clicked at current position");
        assert_eq!(driver.actions(), vec![DesktopAction::Click(None)]);
    }

    #[tokio::test]
    async fn test_click_with_single_coord_fails() {
        let driver = Arc::new(DryRunDriver::default());
        let tool = ClickTool::new(driver.clone());
        assert!(tool.execute(&args(json!({"x": 5}))).await.is_err());
        assert!(driver.actions().is_empty());
    }

    #[tokio::test]
    async fn test_move_mouse() {
        let driver = Arc::new(DryRunDriver::default());
        let tool = MoveMouseTool::new(driver.clone());
        let result = tool.execute(&args(json!({"x": 1000, "y": 500}))).await.unwrap();
        assert_eq!(result.summary, "Moved mouse to (1000, 500)");
        assert_eq!(driver.actions(), vec![DesktopAction::Move(1000, 500)]);
    }
}
