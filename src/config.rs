//! 应用配置：从 config/default.toml 与环境变量加载，启动时读取一次
//!
//! 加载顺序：先读 TOML 文件，再用环境变量 `JARVIS__*` 覆盖（双下划线表示嵌套，如 `JARVIS__LLM__MODEL=llama3`）。

use std::collections::HashMap;
use std::path::PathBuf;

use serde::Deserialize;

use crate::intent::ArgKind;

/// 应用配置根（对应 config/default.toml 的顶层）
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub app: AppSection,
    pub llm: LlmSection,
    pub confirmation: ConfirmationSection,
    pub tools: ToolsSection,
    pub context: ContextSection,
    pub memory: MemorySection,
    pub audio: AudioSection,
    pub tts: TtsSection,
    /// 意图规则，顺序即优先级；为空时使用内置规则
    pub intents: Vec<IntentRuleConfig>,
}

/// [app] 段：助手名、会话保留轮数、记忆检索条数、是否语音模式
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppSection {
    pub name: String,
    /// 覆盖 config/prompts/system.txt
    pub system_prompt: Option<String>,
    pub max_context_turns: usize,
    /// 每轮注入 ModelTurn 的相似记忆条数（0 关闭）
    pub recall_k: usize,
    pub use_voice_loop: bool,
}

impl Default for AppSection {
    fn default() -> Self {
        Self {
            name: "Jarvis".to_string(),
            system_prompt: None,
            max_context_turns: 12,
            recall_k: 3,
            use_voice_loop: false,
        }
    }
}

/// [llm] 段：后端选择（ollama / openai / mock / none）与生成参数
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LlmSection {
    pub provider: String,
    pub model: String,
    pub base_url: Option<String>,
    pub temperature: f32,
    pub max_tokens: u32,
    /// 是否把工具 schema 发给后端，允许后端发起 tool call
    pub enable_tools: bool,
    pub timeouts: LlmTimeoutsSection,
}

impl Default for LlmSection {
    fn default() -> Self {
        Self {
            provider: "ollama".to_string(),
            model: "llama3:8b-instruct-q4_0".to_string(),
            base_url: None,
            temperature: 0.6,
            max_tokens: 512,
            enable_tools: true,
            timeouts: LlmTimeoutsSection::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LlmTimeoutsSection {
    pub request: u64,
}

impl Default for LlmTimeoutsSection {
    fn default() -> Self {
        Self { request: 60 }
    }
}

/// [confirmation] 段
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ConfirmationSection {
    /// 等待 yes/no 的秒数，超时视为拒绝
    pub timeout_secs: u64,
}

impl Default for ConfirmationSection {
    fn default() -> Self {
        Self { timeout_secs: 10 }
    }
}

/// [tools] 段：超时、风险标记覆盖、各工具参数
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ToolsSection {
    /// 单次工具调用超时（秒）
    pub tool_timeout_secs: u64,
    /// 工具名 -> 是否需要确认，覆盖工具默认值
    pub risk: HashMap<String, bool>,
    pub desktop: DesktopSection,
    pub screen: ScreenSection,
    pub webcam: WebcamSection,
}

impl Default for ToolsSection {
    fn default() -> Self {
        Self {
            tool_timeout_secs: 30,
            risk: HashMap::new(),
            desktop: DesktopSection::default(),
            screen: ScreenSection::default(),
            webcam: WebcamSection::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DesktopSection {
    /// 每个字符之间的间隔（毫秒）
    pub type_delay_ms: u64,
}

impl Default for DesktopSection {
    fn default() -> Self {
        Self { type_delay_ms: 10 }
    }
}

/// [tools.screen] 段：截图与 OCR 命令模板（{path}、{langs} 占位）
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ScreenSection {
    pub capture_command: Vec<String>,
    pub ocr_command: Vec<String>,
    pub ocr_langs: Vec<String>,
    pub max_chars: usize,
}

impl Default for ScreenSection {
    fn default() -> Self {
        Self {
            capture_command: strings(&["scrot", "-o", "{path}"]),
            ocr_command: strings(&["tesseract", "{path}", "-", "-l", "{langs}"]),
            ocr_langs: strings(&["eng"]),
            max_chars: 2000,
        }
    }
}

/// [tools.webcam] 段：抓帧命令模板（{device}、{path} 占位）
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WebcamSection {
    pub enabled: bool,
    pub device: String,
    pub capture_command: Vec<String>,
    pub output_dir: Option<PathBuf>,
}

impl Default for WebcamSection {
    fn default() -> Self {
        Self {
            enabled: true,
            device: "/dev/video0".to_string(),
            capture_command: strings(&[
                "ffmpeg", "-y", "-loglevel", "error", "-f", "v4l2", "-i", "{device}", "-frames:v",
                "1", "{path}",
            ]),
            output_dir: None,
        }
    }
}

/// [context] 段
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct ContextSection {
    /// 每次调用语言后端前先运行的观察工具（必须是无需确认的工具，如 read-screen）
    pub observers: Vec<String>,
}

/// [memory] 段：后端（memory / sqlite / none）
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MemorySection {
    pub backend: String,
    pub db_path: PathBuf,
    pub max_entries: usize,
}

impl Default for MemorySection {
    fn default() -> Self {
        Self {
            backend: "memory".to_string(),
            db_path: PathBuf::from("./jarvis_memory.db"),
            max_entries: 10_000,
        }
    }
}

/// [audio] 段：语音识别命令，每输出一行即一条 Utterance
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AudioSection {
    pub stt_command: Vec<String>,
}

/// [tts] 段：播报命令模板（{text}、{rate} 占位）；语音模式下总是开启
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TtsSection {
    pub enabled: bool,
    pub rate: u32,
    pub command: Vec<String>,
}

impl Default for TtsSection {
    fn default() -> Self {
        Self {
            enabled: false,
            rate: 180,
            command: strings(&["espeak", "-s", "{rate}", "{text}"]),
        }
    }
}

/// [[intents]] 一条规则：pattern 命中后调用 tool，或 shutdown = true 表示退出
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct IntentRuleConfig {
    pub pattern: String,
    #[serde(default)]
    pub tool: Option<String>,
    #[serde(default)]
    pub shutdown: bool,
    #[serde(default)]
    pub args: Vec<ArgSpecConfig>,
}

/// 规则参数：取第 group 个捕获组，或使用常量 value；按 kind 转换类型
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct ArgSpecConfig {
    pub name: String,
    #[serde(default)]
    pub group: Option<usize>,
    #[serde(default)]
    pub value: Option<String>,
    #[serde(default)]
    pub kind: ArgKind,
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

/// 从 config 目录加载配置，环境变量 JARVIS__* 可覆盖
///
/// 1. 按顺序查找 config/default.toml、../config/default.toml、default.toml，找到则作为第一源
/// 2. 若传入 config_path，则追加该文件（可覆盖前面的键）；文件必须存在
/// 3. 最后叠加环境变量 JARVIS__*（双下划线表示嵌套键）
pub fn load_config(config_path: Option<PathBuf>) -> Result<AppConfig, config::ConfigError> {
    let mut builder = config::Config::builder();

    let default_names = ["config/default", "../config/default", "default"];
    for name in default_names {
        let path = format!("{}.toml", name);
        if std::path::Path::new(&path).exists() {
            builder = builder.add_source(config::File::with_name(name).required(false));
            break;
        }
    }

    if let Some(ref path) = config_path {
        builder = builder.add_source(config::File::from(path.clone()).required(true));
    }

    builder = builder.add_source(
        config::Environment::with_prefix("JARVIS")
            .separator("__")
            .try_parsing(true),
    );

    let c = builder.build()?;
    c.try_deserialize()
}

/// 启动时加载配置
///
/// 显式指定的文件读不到或解析失败直接报错，避免丢掉其中的 [tools.risk] 等设置；
/// 只有隐式查找 default.toml 出错时才退回内置默认值。
pub fn load_config_or_default(config_path: Option<PathBuf>) -> Result<AppConfig, config::ConfigError> {
    let explicit = config_path.is_some();
    match load_config(config_path) {
        Ok(cfg) => Ok(cfg),
        Err(e) if explicit => Err(e),
        Err(e) => {
            tracing::warn!("Config load failed ({}), using defaults", e);
            Ok(AppConfig::default())
        }
    }
}

/// 系统提示词：配置 > config/prompts/system.txt > 内置
pub fn load_system_prompt(cfg: &AppConfig) -> String {
    if let Some(prompt) = &cfg.app.system_prompt {
        return prompt.clone();
    }
    ["config/prompts/system.txt", "../config/prompts/system.txt"]
        .into_iter()
        .find_map(|p| std::fs::read_to_string(p).ok())
        .unwrap_or_else(|| {
            format!(
                "You are {}, a helpful local desktop assistant. You can read the screen, \
                 capture webcam frames, type text, click and move the mouse through tools. \
                 Be concise and natural; your replies may be spoken aloud.",
                cfg.app.name
            )
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_without_file() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.confirmation.timeout_secs, 10);
        assert_eq!(cfg.app.max_context_turns, 12);
        assert_eq!(cfg.llm.provider, "ollama");
        assert!(cfg.intents.is_empty());
    }

    #[test]
    fn test_explicit_file_parse_error_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.toml");
        std::fs::write(
            &path,
            r#"
[confirmation]
timeout_secs = "ten"

[tools.risk]
move-mouse = true
"#,
        )
        .unwrap();
        assert!(load_config_or_default(Some(path)).is_err());
    }

    #[test]
    fn test_explicit_missing_file_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.toml");
        assert!(load_config_or_default(Some(missing)).is_err());
    }

    #[test]
    fn test_load_explicit_file_with_intents() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("jarvis.toml");
        std::fs::write(
            &path,
            r#"
[confirmation]
timeout_secs = 3

[tools.risk]
move-mouse = true

[[intents]]
pattern = '^type\s*:\s*(.*)$'
tool = "type-text"
args = [{ name = "text", group = 1 }]

[[intents]]
pattern = '^(exit|quit)$'
shutdown = true
"#,
        )
        .unwrap();

        let cfg = load_config(Some(path)).unwrap();
        assert_eq!(cfg.confirmation.timeout_secs, 3);
        assert_eq!(cfg.tools.risk.get("move-mouse"), Some(&true));
        assert_eq!(cfg.intents.len(), 2);
        assert_eq!(cfg.intents[0].tool.as_deref(), Some("type-text"));
        assert_eq!(cfg.intents[0].args[0].group, Some(1));
        assert_eq!(cfg.intents[0].args[0].kind, ArgKind::Text);
        assert!(cfg.intents[1].shutdown);
        // 未出现的段保持默认
        assert_eq!(cfg.tools.screen.max_chars, 2000);
    }
}
