//! read-screen：截屏 + OCR
//!
//! 截图与识别都走外部命令（默认 scrot + tesseract），结果截断到 max_chars。

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;

use crate::config::ScreenSection;
use crate::intent::ToolArgs;
use crate::tools::command::run_command;
use crate::tools::{Tool, ToolResult};

/// 屏幕文字读取
#[async_trait]
pub trait ScreenReader: Send + Sync {
    async fn read_text(&self) -> Result<String, String>;
}

/// 截屏命令写入临时 PNG，再由 OCR 命令从 stdout 输出文字
pub struct CommandScreenReader {
    capture_command: Vec<String>,
    ocr_command: Vec<String>,
    langs: String,
    image_path: PathBuf,
    timeout: Duration,
}

impl CommandScreenReader {
    pub fn new(cfg: &ScreenSection, timeout_secs: u64) -> Self {
        Self {
            capture_command: cfg.capture_command.clone(),
            ocr_command: cfg.ocr_command.clone(),
            langs: cfg.ocr_langs.join("+"),
            image_path: std::env::temp_dir().join("jarvis-screen.png"),
            timeout: Duration::from_secs(timeout_secs),
        }
    }
}

#[async_trait]
impl ScreenReader for CommandScreenReader {
    async fn read_text(&self) -> Result<String, String> {
        let path = self.image_path.to_string_lossy().to_string();
        run_command(&self.capture_command, &[("path", &path)], self.timeout).await?;
        let text = run_command(
            &self.ocr_command,
            &[("path", &path), ("langs", &self.langs)],
            self.timeout,
        )
        .await?;
        if let Err(e) = std::fs::remove_file(&self.image_path) {
            tracing::debug!("failed to remove screenshot: {}", e);
        }
        Ok(text)
    }
}

pub struct ReadScreenTool {
    reader: Arc<dyn ScreenReader>,
    max_chars: usize,
}

impl ReadScreenTool {
    pub fn new(reader: Arc<dyn ScreenReader>, max_chars: usize) -> Self {
        Self { reader, max_chars }
    }
}

#[async_trait]
impl Tool for ReadScreenTool {
    fn name(&self) -> &str {
        "read-screen"
    }

    fn description(&self) -> &str {
        "Capture the screen and return the visible text via OCR."
    }

    async fn execute(&self, _args: &ToolArgs) -> Result<ToolResult, String> {
        let raw = self.reader.read_text().await?;
        let text: String = raw
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .collect::<Vec<_>>()
            .join("\n");
        if text.is_empty() {
            return Ok(ToolResult::ok("No text detected."));
        }
        let truncated: String = text.chars().take(self.max_chars).collect();
        Ok(ToolResult::ok(format!("Screen OCR:\n{truncated}"))
            .with_payload(json!({ "chars": text.chars().count() })))
    }
}

/// 固定返回一段文字的屏幕读取器（--mock 与测试使用）
pub struct StaticScreenReader(pub String);

#[async_trait]
impl ScreenReader for StaticScreenReader {
    async fn read_text(&self) -> Result<String, String> {
        Ok(self.0.clone())
    }
}
