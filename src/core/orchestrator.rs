//! 编排循环：获取输入 → 路由 → 确认 / 执行 / 生成 → 输出 → 记录
//!
//! 一次只处理一条 Utterance；handle_turn 不返回错误，所有失败都在本轮内转成用户可见的回复。
//! 只有 Shutdown 意图、输入关闭或取消信号会结束 run。

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::core::{AssistantError, ConfirmationOutcome, LoopState, ToolError, TurnTrace};
use crate::intent::{Intent, IntentRouter, ModelPrompt, RouteContext, ToolArgs, ToolCall, Utterance};
use crate::io::{InputSource, SpeechOutput};
use crate::llm::{BackendReply, LanguageBackend};
use crate::memory::{ConversationTurn, MemoryStore, SessionContext};
use crate::tools::{ToolExecutor, ToolResult};

pub const MSG_NOT_UNDERSTOOD: &str = "Sorry, I didn't understand that.";
pub const MSG_BACKEND_UNAVAILABLE: &str =
    "Sorry, I can't reach my language model right now. Please try again in a moment.";
pub const MSG_CANCELLED: &str = "Action cancelled";
pub const MSG_GOODBYE: &str = "Goodbye.";
const MSG_EMPTY_REPLY: &str = "I don't have anything to add.";

/// 运行参数（来自配置）
#[derive(Debug, Clone)]
pub struct OrchestratorSettings {
    pub confirm_timeout: Duration,
    /// 是否把工具列表交给后端
    pub enable_tools: bool,
    /// 每次 Generating 前运行的非风险工具，结果写入观察
    pub observers: Vec<String>,
    pub recall_k: usize,
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self {
            confirm_timeout: Duration::from_secs(10),
            enable_tools: true,
            observers: Vec::new(),
            recall_k: 3,
        }
    }
}

/// run 结束的原因
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunExit {
    Shutdown,
    InputClosed,
    Cancelled,
}

pub struct Orchestrator {
    router: IntentRouter,
    executor: ToolExecutor,
    backend: Option<Arc<dyn LanguageBackend>>,
    memory: Arc<dyn MemoryStore>,
    output: Arc<dyn SpeechOutput>,
    settings: OrchestratorSettings,
}

/// 一次工具调用的结局
enum CallOutcome {
    Cancelled,
    Done(ToolResult),
}

impl Orchestrator {
    pub fn new(
        router: IntentRouter,
        executor: ToolExecutor,
        backend: Option<Arc<dyn LanguageBackend>>,
        memory: Arc<dyn MemoryStore>,
        output: Arc<dyn SpeechOutput>,
        settings: OrchestratorSettings,
    ) -> Self {
        Self {
            router,
            executor,
            backend,
            memory,
            output,
            settings,
        }
    }

    pub fn router(&self) -> &IntentRouter {
        &self.router
    }

    pub fn executor(&self) -> &ToolExecutor {
        &self.executor
    }

    pub fn memory(&self) -> &Arc<dyn MemoryStore> {
        &self.memory
    }

    pub fn settings(&self) -> &OrchestratorSettings {
        &self.settings
    }

    pub fn has_backend(&self) -> bool {
        self.backend.is_some()
    }

    /// 直接输出一句话（启动问候等）
    pub fn say(&self, text: &str) {
        self.output.emit(text);
    }

    /// 主循环：逐条读取输入并处理，直到 Shutdown、输入关闭或 token 被取消
    pub async fn run(
        &self,
        session: &mut SessionContext,
        input: &mut dyn InputSource,
        shutdown: CancellationToken,
    ) -> RunExit {
        tracing::info!(channel = ?input.channel(), "orchestrator loop started");
        loop {
            tracing::debug!(state = ?LoopState::Listening, "loop state");
            let line = tokio::select! {
                _ = shutdown.cancelled() => return RunExit::Cancelled,
                line = input.next_line() => line,
            };
            let Some(line) = line else {
                tracing::info!("input closed, leaving loop");
                return RunExit::InputClosed;
            };
            if line.trim().is_empty() {
                continue;
            }
            let utterance = Utterance::new(line.trim(), input.channel());

            let turn = tokio::select! {
                _ = shutdown.cancelled() => return RunExit::Cancelled,
                turn = self.handle_turn(session, utterance, &mut *input) => turn,
            };
            if matches!(turn.intent, Intent::Shutdown) {
                return RunExit::Shutdown;
            }
        }
    }

    /// 处理一条 Utterance，返回已提交的 ConversationTurn；不会失败
    pub async fn handle_turn(
        &self,
        session: &mut SessionContext,
        utterance: Utterance,
        input: &mut dyn InputSource,
    ) -> ConversationTurn {
        let mut trace = TurnTrace::new();
        trace.enter(LoopState::Listening);
        trace.enter(LoopState::Routing);

        let recalled = if self.settings.recall_k > 0 && self.memory.enabled() {
            self.memory.search(&utterance.text, self.settings.recall_k)
        } else {
            Vec::new()
        };
        let intent = self.router.route(
            &utterance,
            &RouteContext {
                observations: session.observations(),
                recalled: &recalled,
            },
        );
        tracing::info!(kind = intent.kind(), text = %utterance.text, "routed");

        let (tool_result, response) = match &intent {
            Intent::Shutdown => (None, MSG_GOODBYE.to_string()),
            Intent::Unknown { tool, reason } => (
                None,
                format!("Sorry, I couldn't work out what to do with {tool}: {reason}."),
            ),
            Intent::DirectTool(call) => {
                match self.run_tool_call(call, session, input, &mut trace).await {
                    CallOutcome::Cancelled => (None, MSG_CANCELLED.to_string()),
                    CallOutcome::Done(result) => {
                        let summary = result.summary.clone();
                        (Some(result), summary)
                    }
                }
            }
            Intent::ModelTurn(prompt) => {
                self.generate(prompt.clone(), session, input, &mut trace).await
            }
        };

        trace.enter(LoopState::Responding);
        self.output.emit(&response);

        let turn = ConversationTurn::new(utterance, intent, tool_result, response, trace.into_states());
        if let Err(e) = self.memory.append(&turn) {
            tracing::warn!("memory append failed: {}", e);
        }
        session.commit(turn.clone());
        tracing::debug!(state = ?LoopState::Idle, "loop state");
        turn
    }

    /// Confirming（风险工具）→ Executing；任何失败都转成 success=false 的 ToolResult
    async fn run_tool_call(
        &self,
        call: &ToolCall,
        session: &mut SessionContext,
        input: &mut dyn InputSource,
        trace: &mut TurnTrace,
    ) -> CallOutcome {
        if call.risky {
            trace.enter(LoopState::Confirming);
            let outcome = self.confirm(call, input).await;
            tracing::info!(tool = %call.name, ?outcome, "confirmation");
            if !outcome.approved() {
                if outcome == ConfirmationOutcome::TimedOut {
                    tracing::info!("{}", AssistantError::ConfirmationTimeout);
                }
                return CallOutcome::Cancelled;
            }
        }

        trace.enter(LoopState::Executing);
        let result = self.execute(&call.name, &call.args).await;
        record_observation(session, &call.name, &result);
        CallOutcome::Done(result)
    }

    async fn execute(&self, name: &str, args: &ToolArgs) -> ToolResult {
        match self.executor.invoke(name, args).await {
            Ok(result) => result,
            Err(e) => {
                tracing::warn!("{}", AssistantError::ToolInvocation(e.clone()));
                ToolResult::failure(e.to_string())
            }
        }
    }

    /// 发出 yes/no 提示并在超时内等待一行回复
    async fn confirm(&self, call: &ToolCall, input: &mut dyn InputSource) -> ConfirmationOutcome {
        self.output
            .emit(&format!("I'm about to run {}. Proceed? (yes/no)", call.describe()));
        match tokio::time::timeout(self.settings.confirm_timeout, input.next_line()).await {
            Ok(Some(reply)) if is_affirmative(&reply) => ConfirmationOutcome::Approved,
            Ok(_) => ConfirmationOutcome::Declined,
            Err(_) => ConfirmationOutcome::TimedOut,
        }
    }

    /// 刷新观察工具的结果
    async fn refresh_observers(&self, session: &mut SessionContext) {
        for name in &self.settings.observers {
            if self.router.risk().is_risky(name) {
                tracing::warn!(tool = %name, "risky tool cannot be an observer, skipped");
                continue;
            }
            let result = self.execute(name, &ToolArgs::new()).await;
            record_observation(session, name, &result);
        }
    }

    /// Generating：后端回复或一层嵌套工具调用，之后不带工具再问一次以组织最终回复
    async fn generate(
        &self,
        mut prompt: ModelPrompt,
        session: &mut SessionContext,
        input: &mut dyn InputSource,
        trace: &mut TurnTrace,
    ) -> (Option<ToolResult>, String) {
        let Some(backend) = self.backend.clone() else {
            tracing::info!("{}", AssistantError::RoutingAmbiguous);
            return (None, MSG_NOT_UNDERSTOOD.to_string());
        };

        trace.enter(LoopState::Generating);
        if !self.settings.observers.is_empty() {
            self.refresh_observers(session).await;
            for (label, content) in session.observations() {
                prompt.upsert_context(label.clone(), content.clone());
            }
        }

        let specs = self.executor.specs();
        let tools = (self.settings.enable_tools && !specs.is_empty()).then_some(specs.as_slice());
        let rendered = prompt.render();

        let reply = match backend.generate(&rendered, tools, session.history()).await {
            Ok(reply) => reply,
            Err(e) => {
                tracing::warn!(backend = backend.name(), "{}", e);
                return (None, MSG_BACKEND_UNAVAILABLE.to_string());
            }
        };

        let (name, args) = match reply {
            BackendReply::Reply(text) => return (None, non_empty(text)),
            BackendReply::ToolCall { name, args } => (name, args),
        };
        tracing::info!(tool = %name, "backend requested tool call");

        if !self.executor.contains(&name) {
            let err = ToolError::UnknownTool(name);
            tracing::warn!("{}", AssistantError::ToolInvocation(err.clone()));
            let result = ToolResult::failure(err.to_string());
            let summary = result.summary.clone();
            return (Some(result), summary);
        }

        let risky = self.router.risk().is_risky(&name);
        let call = ToolCall::new(name, args, risky);
        let result = match self.run_tool_call(&call, session, input, trace).await {
            CallOutcome::Cancelled => return (None, MSG_CANCELLED.to_string()),
            CallOutcome::Done(result) => result,
        };

        trace.enter(LoopState::Generating);
        let follow_up = format!(
            "{rendered}\n\n## Tool result ({})\n{}{}\n\nAnswer the user briefly using this result.",
            call.name,
            if result.success { "" } else { "FAILED: " },
            result.summary
        );
        let response = match backend.generate(&follow_up, None, session.history()).await {
            Ok(BackendReply::Reply(text)) if !text.trim().is_empty() => text,
            Ok(_) => result.summary.clone(),
            Err(e) => {
                tracing::warn!(backend = backend.name(), "follow-up failed: {}", e);
                result.summary.clone()
            }
        };
        (Some(result), response)
    }
}

fn non_empty(text: String) -> String {
    if text.trim().is_empty() {
        MSG_EMPTY_REPLY.to_string()
    } else {
        text
    }
}

/// 屏幕与摄像头的成功结果作为观察保存，供后续 ModelTurn 注入
fn record_observation(session: &mut SessionContext, tool: &str, result: &ToolResult) {
    let label = match tool {
        "read-screen" => "Screen",
        "capture-webcam-frame" => "Webcam",
        _ => return,
    };
    if result.success {
        session.observe(label, result.summary.clone());
    }
}

/// 肯定回复：y / yes / yeah / sure / ok / confirm / do it
pub fn is_affirmative(reply: &str) -> bool {
    let normalized = reply
        .trim()
        .trim_end_matches(['.', '!'])
        .to_lowercase();
    matches!(
        normalized.as_str(),
        "y" | "yes" | "yeah" | "yep" | "sure" | "ok" | "okay" | "confirm" | "do it" | "go ahead"
    )
}
