//! 助手构建器：由 AppConfig 组装工具库、路由规则、语言后端、记忆库与输出
//!
//! 真实环境下使用外部命令（xdotool / scrot + tesseract / ffmpeg / espeak）；
//! mock 模式与测试可注入替身，不碰桌面与模型服务。

use std::sync::Arc;
use std::time::Duration;

use crate::config::{load_system_prompt, AppConfig};
use crate::core::{AssistantError, Orchestrator, OrchestratorSettings};
use crate::intent::{default_rules, rules_from_config, IntentRouter, IntentRule};
use crate::io::{CommandTts, ConsoleOutput, FanOutput, SpeechOutput};
use crate::llm::{create_backend_from_config, LanguageBackend, MockBackend};
use crate::memory::{InMemoryStore, MemoryStore, NoopMemoryStore, SessionContext, SqliteMemoryStore};
use crate::tools::{
    ClickTool, CommandScreenReader, CommandWebcam, DesktopDriver, DryRunDriver, HelpTool,
    MemoryStatsTool, MoveMouseTool, ReadScreenTool, RecallMemoryTool, RecentMemoriesTool,
    RiskPolicy, ScreenReader, StaticScreenReader, ToolExecutor, ToolRegistry, TypeTextTool,
    WebcamCapture, WebcamTool, XdotoolDriver,
};

const MOCK_SCREEN_TEXT: &str = "Mock screen: Inbox (3 unread), Calendar: standup at 10:00";

pub struct AssistantBuilder {
    config: AppConfig,
    mock: bool,
    voice: bool,
    system_prompt: Option<String>,
    desktop: Option<Arc<dyn DesktopDriver>>,
    screen: Option<Arc<dyn ScreenReader>>,
    webcam: Option<Arc<dyn WebcamCapture>>,
    memory: Option<Arc<dyn MemoryStore>>,
    output: Option<Arc<dyn SpeechOutput>>,
    /// Some(None) 表示显式不使用后端
    backend: Option<Option<Arc<dyn LanguageBackend>>>,
}

impl AssistantBuilder {
    pub fn new(config: AppConfig) -> Self {
        Self {
            config,
            mock: false,
            voice: false,
            system_prompt: None,
            desktop: None,
            screen: None,
            webcam: None,
            memory: None,
            output: None,
            backend: None,
        }
    }

    /// mock：桌面操作只记录，屏幕返回固定文本，后端（若配置）换成 Mock
    pub fn mock(mut self, enable: bool) -> Self {
        self.mock = enable;
        self
    }

    /// 语音模式下总是启用 TTS
    pub fn voice(mut self, enable: bool) -> Self {
        self.voice = enable;
        self
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }

    pub fn with_desktop_driver(mut self, driver: Arc<dyn DesktopDriver>) -> Self {
        self.desktop = Some(driver);
        self
    }

    pub fn with_screen_reader(mut self, reader: Arc<dyn ScreenReader>) -> Self {
        self.screen = Some(reader);
        self
    }

    pub fn with_webcam(mut self, webcam: Arc<dyn WebcamCapture>) -> Self {
        self.webcam = Some(webcam);
        self
    }

    pub fn with_memory(mut self, memory: Arc<dyn MemoryStore>) -> Self {
        self.memory = Some(memory);
        self
    }

    pub fn with_output(mut self, output: Arc<dyn SpeechOutput>) -> Self {
        self.output = Some(output);
        self
    }

    pub fn with_backend(mut self, backend: Arc<dyn LanguageBackend>) -> Self {
        self.backend = Some(Some(backend));
        self
    }

    pub fn without_backend(mut self) -> Self {
        self.backend = Some(None);
        self
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// 按 max_context_turns 创建会话上下文
    pub fn new_session(&self) -> SessionContext {
        SessionContext::new(self.config.app.max_context_turns)
    }

    fn build_memory(&self) -> Result<Arc<dyn MemoryStore>, AssistantError> {
        if let Some(memory) = &self.memory {
            return Ok(Arc::clone(memory));
        }
        let cfg = &self.config.memory;
        let store: Arc<dyn MemoryStore> = match cfg.backend.trim().to_lowercase().as_str() {
            "memory" => Arc::new(InMemoryStore::new(cfg.max_entries)),
            "sqlite" => Arc::new(
                SqliteMemoryStore::open(&cfg.db_path, cfg.max_entries)
                    .map_err(|e| AssistantError::Memory(format!("{e:#}")))?,
            ),
            "none" | "" => Arc::new(NoopMemoryStore),
            other => {
                return Err(AssistantError::Config(format!("unknown memory backend: {other}")));
            }
        };
        tracing::info!(backend = store.stats().backend, "memory store ready");
        Ok(store)
    }

    /// 统一的工具注册表
    pub fn build_tool_registry(&self, memory: Arc<dyn MemoryStore>) -> ToolRegistry {
        let cfg = &self.config.tools;
        let timeout = cfg.tool_timeout_secs;

        let desktop: Arc<dyn DesktopDriver> = match &self.desktop {
            Some(d) => Arc::clone(d),
            None if self.mock => Arc::new(DryRunDriver::default()),
            None => Arc::new(XdotoolDriver::new(cfg.desktop.type_delay_ms, timeout)),
        };
        let screen: Arc<dyn ScreenReader> = match &self.screen {
            Some(s) => Arc::clone(s),
            None if self.mock => Arc::new(StaticScreenReader(MOCK_SCREEN_TEXT.to_string())),
            None => Arc::new(CommandScreenReader::new(&cfg.screen, timeout)),
        };

        let mut tools = ToolRegistry::new();
        tools.register(ReadScreenTool::new(screen, cfg.screen.max_chars));
        tools.register(TypeTextTool::new(Arc::clone(&desktop)));
        tools.register(ClickTool::new(Arc::clone(&desktop)));
        tools.register(MoveMouseTool::new(desktop));

        let webcam: Option<Arc<dyn WebcamCapture>> = match &self.webcam {
            Some(w) => Some(Arc::clone(w)),
            None if cfg.webcam.enabled && !self.mock => {
                Some(Arc::new(CommandWebcam::new(&cfg.webcam, timeout)))
            }
            None => None,
        };
        if let Some(webcam) = webcam {
            tools.register(WebcamTool::new(webcam));
        }

        if memory.enabled() {
            tools.register(RecallMemoryTool::new(Arc::clone(&memory), self.config.app.recall_k.max(1)));
            tools.register(RecentMemoriesTool::new(Arc::clone(&memory)));
            tools.register(MemoryStatsTool::new(memory));
        }

        let mut names = tools.tool_names();
        names.push("help".to_string());
        names.sort();
        tools.register(HelpTool::new(&self.config.app.name, &names));

        tracing::info!(tools = ?tools.tool_names(), "tool library ready");
        tools
    }

    fn build_backend(&self) -> Result<Option<Arc<dyn LanguageBackend>>, AssistantError> {
        if let Some(backend) = &self.backend {
            return Ok(backend.clone());
        }
        let provider = self.config.llm.provider.trim().to_lowercase();
        if self.mock && !matches!(provider.as_str(), "" | "none") {
            tracing::info!("mock mode: using Mock language backend");
            return Ok(Some(Arc::new(MockBackend::new())));
        }
        let system_prompt = self
            .system_prompt
            .clone()
            .unwrap_or_else(|| load_system_prompt(&self.config));
        create_backend_from_config(&self.config, &system_prompt)
    }

    fn build_output(&self) -> Arc<dyn SpeechOutput> {
        if let Some(output) = &self.output {
            return Arc::clone(output);
        }
        let mut fan = FanOutput::new().with(Arc::new(ConsoleOutput::new(&self.config.app.name)));
        if self.config.tts.enabled || self.voice {
            fan = fan.with(Arc::new(CommandTts::new(&self.config.tts)));
        }
        Arc::new(fan)
    }

    /// 路由规则：配置了 [[intents]] 时原样使用；否则用内置规则，并跳过工具未注册的条目
    /// （如 mock 模式或 webcam 关闭时的 capture-webcam-frame）
    fn build_rules(&self, registry: &ToolRegistry) -> Result<Vec<IntentRule>, AssistantError> {
        if !self.config.intents.is_empty() {
            return rules_from_config(&self.config.intents);
        }
        let (kept, skipped): (Vec<_>, Vec<_>) = default_rules()?
            .into_iter()
            .partition(|rule| rule.tool_name().map_or(true, |tool| registry.contains(tool)));
        for rule in &skipped {
            tracing::debug!(tool = ?rule.tool_name(), "built-in intent rule skipped: tool not registered");
        }
        Ok(kept)
    }

    /// 组装编排器；自定义规则引用未注册工具、观察者配置错误都在这里报错
    pub fn build(self) -> Result<Orchestrator, AssistantError> {
        let memory = self.build_memory()?;
        let registry = self.build_tool_registry(Arc::clone(&memory));
        let risk = RiskPolicy::from_registry(&registry, &self.config.tools.risk);

        let router = IntentRouter::new(self.build_rules(&registry)?, risk);
        for tool in router.referenced_tools() {
            if !registry.contains(tool) {
                return Err(AssistantError::Config(format!(
                    "intent rule references unknown tool: {tool}"
                )));
            }
        }

        for observer in &self.config.context.observers {
            if !registry.contains(observer) {
                return Err(AssistantError::Config(format!("unknown observer tool: {observer}")));
            }
            if router.risk().is_risky(observer) {
                return Err(AssistantError::Config(format!(
                    "observer tool must not require confirmation: {observer}"
                )));
            }
        }

        let backend = self.build_backend()?;
        let output = self.build_output();
        let settings = OrchestratorSettings {
            confirm_timeout: Duration::from_secs(self.config.confirmation.timeout_secs.max(1)),
            enable_tools: self.config.llm.enable_tools,
            observers: self.config.context.observers.clone(),
            recall_k: self.config.app.recall_k,
        };
        let executor = ToolExecutor::new(registry, self.config.tools.tool_timeout_secs.max(1));

        Ok(Orchestrator::new(router, executor, backend, memory, output, settings))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::IntentRuleConfig;

    #[test]
    fn test_mock_build_registers_tools() {
        let orch = AssistantBuilder::new(AppConfig::default())
            .mock(true)
            .build()
            .unwrap();
        let names = orch.executor().tool_names();
        for tool in [
            "read-screen",
            "type-text",
            "click-at",
            "move-mouse",
            "help",
            "recall-memory",
            "recent-memories",
            "memory-stats",
        ] {
            assert!(names.contains(&tool.to_string()), "{tool}");
        }
        assert!(!names.contains(&"capture-webcam-frame".to_string()));
        assert!(orch.router().risk().is_risky("type-text"));
        assert!(orch.router().risk().is_risky("click-at"));
        assert!(!orch.router().risk().is_risky("read-screen"));
        assert!(orch.has_backend());
    }

    #[test]
    fn test_risk_override_from_config() {
        let mut cfg = AppConfig::default();
        cfg.tools.risk.insert("move-mouse".into(), true);
        cfg.tools.risk.insert("click-at".into(), false);
        let orch = AssistantBuilder::new(cfg).mock(true).build().unwrap();
        assert!(orch.router().risk().is_risky("move-mouse"));
        assert!(!orch.router().risk().is_risky("click-at"));
    }

    #[test]
    fn test_rule_with_unknown_tool_is_config_error() {
        let mut cfg = AppConfig::default();
        cfg.intents.push(IntentRuleConfig {
            pattern: "^launch (.*)$".into(),
            tool: Some("launch-app".into()),
            shutdown: false,
            args: vec![],
        });
        let err = AssistantBuilder::new(cfg).mock(true).build().err().unwrap();
        assert!(matches!(err, AssistantError::Config(_)));
    }

    #[test]
    fn test_builtin_webcam_rule_dropped_without_webcam() {
        let mut cfg = AppConfig::default();
        cfg.tools.webcam.enabled = false;
        let orch = AssistantBuilder::new(cfg)
            .without_backend()
            .with_memory(Arc::new(NoopMemoryStore))
            .build()
            .unwrap();
        assert!(!orch.executor().contains("capture-webcam-frame"));
        assert!(!orch.router().referenced_tools().contains(&"capture-webcam-frame"));
        assert!(orch.router().referenced_tools().contains(&"type-text"));
    }

    #[test]
    fn test_mock_build_keeps_webcam_rule_when_webcam_injected() {
        struct FixedWebcam;

        #[async_trait::async_trait]
        impl WebcamCapture for FixedWebcam {
            async fn capture_frame(&self) -> Result<std::path::PathBuf, String> {
                Err("no camera in tests".into())
            }
        }

        let orch = AssistantBuilder::new(AppConfig::default())
            .mock(true)
            .with_webcam(Arc::new(FixedWebcam))
            .build()
            .unwrap();
        assert!(orch.router().referenced_tools().contains(&"capture-webcam-frame"));
    }

    #[test]
    fn test_risky_observer_is_rejected() {
        let mut cfg = AppConfig::default();
        cfg.context.observers = vec!["type-text".into()];
        let err = AssistantBuilder::new(cfg).mock(true).build().err().unwrap();
        assert!(matches!(err, AssistantError::Config(_)));
    }

    #[test]
    fn test_without_backend_and_noop_memory() {
        let mut cfg = AppConfig::default();
        cfg.memory.backend = "none".into();
        let orch = AssistantBuilder::new(cfg)
            .mock(true)
            .without_backend()
            .build()
            .unwrap();
        assert!(!orch.has_backend());
        assert!(!orch.executor().contains("recall-memory"));
        assert!(!orch.executor().contains("memory-stats"));
        assert!(!orch.router().referenced_tools().contains(&"memory-stats"));
    }
}
