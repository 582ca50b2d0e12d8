//! 输出：控制台显示与 TTS 播报，emit 即发即忘

use std::sync::{Arc, Mutex};

use crate::config::TtsSection;
use crate::tools::command::spawn_detached;

pub trait SpeechOutput: Send + Sync {
    fn emit(&self, text: &str);
}

/// 打印到 stdout，带助手名前缀
#[derive(Debug, Clone)]
pub struct ConsoleOutput {
    speaker: String,
}

impl ConsoleOutput {
    pub fn new(speaker: impl Into<String>) -> Self {
        Self {
            speaker: speaker.into(),
        }
    }
}

impl SpeechOutput for ConsoleOutput {
    fn emit(&self, text: &str) {
        println!("{}: {}", self.speaker, text);
    }
}

/// 调用外部 TTS 命令播报（{text}、{rate} 占位），不等待结束
#[derive(Debug, Clone)]
pub struct CommandTts {
    command: Vec<String>,
    rate: String,
}

impl CommandTts {
    pub fn new(cfg: &TtsSection) -> Self {
        Self {
            command: cfg.command.clone(),
            rate: cfg.rate.to_string(),
        }
    }
}

impl SpeechOutput for CommandTts {
    fn emit(&self, text: &str) {
        if text.trim().is_empty() {
            return;
        }
        spawn_detached(&self.command, &[("rate", &self.rate), ("text", text)]);
    }
}

/// 同时输出到多个目标
#[derive(Default, Clone)]
pub struct FanOutput {
    sinks: Vec<Arc<dyn SpeechOutput>>,
}

impl FanOutput {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, sink: Arc<dyn SpeechOutput>) -> Self {
        self.sinks.push(sink);
        self
    }

    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }
}

impl SpeechOutput for FanOutput {
    fn emit(&self, text: &str) {
        for sink in &self.sinks {
            sink.emit(text);
        }
    }
}

/// 记录所有输出（测试用）
#[derive(Debug, Default)]
pub struct RecordingOutput {
    lines: Mutex<Vec<String>>,
}

impl RecordingOutput {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().map(|l| l.clone()).unwrap_or_default()
    }

    pub fn last(&self) -> Option<String> {
        self.lines().pop()
    }
}

impl SpeechOutput for RecordingOutput {
    fn emit(&self, text: &str) {
        if let Ok(mut lines) = self.lines.lock() {
            lines.push(text.to_string());
        }
    }
}
