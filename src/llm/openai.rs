//! OpenAI 兼容 API 后端
//!
//! 通过 async_openai 调用任意 OpenAI 兼容端点（可配置 base_url）。工具调用走文本模式：
//! 把工具列表与调用格式拼进 system prompt，再用 parse_backend_output 解析回复。
//! 每次请求受 [llm.timeouts] request 限制，超时按 BackendUnavailable 处理。

use std::time::Duration;

use async_openai::config::OpenAIConfig;
use async_openai::types::chat::{
    ChatCompletionRequestAssistantMessageArgs, ChatCompletionRequestMessage,
    ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs,
    CreateChatCompletionRequestArgs,
};
use async_openai::Client;
use async_trait::async_trait;

use crate::core::AssistantError;
use crate::llm::{build_messages, parse_backend_output, BackendReply, ChatMessage, ChatRole, LanguageBackend};
use crate::memory::ConversationTurn;
use crate::tools::{tool_call_schema_json, ToolSpec};

/// OpenAI 兼容后端：持有 Client、model 名与 system prompt
pub struct OpenAiBackend {
    client: Client<OpenAIConfig>,
    model: String,
    system_prompt: String,
    temperature: f32,
    max_tokens: u32,
    timeout: Duration,
}

impl OpenAiBackend {
    pub fn new(
        base_url: Option<&str>,
        model: &str,
        api_key: Option<&str>,
        system_prompt: impl Into<String>,
        temperature: f32,
        max_tokens: u32,
        timeout: Duration,
    ) -> Self {
        let api_key = api_key
            .map(String::from)
            .or_else(|| std::env::var("OPENAI_API_KEY").ok())
            .unwrap_or_else(|| "sk-placeholder".to_string());

        let config = if let Some(url) = base_url {
            OpenAIConfig::new().with_api_base(url).with_api_key(api_key)
        } else {
            OpenAIConfig::new().with_api_key(api_key)
        };

        Self {
            client: Client::with_config(config),
            model: model.to_string(),
            system_prompt: system_prompt.into(),
            temperature,
            max_tokens,
            timeout,
        }
    }

    fn to_openai_messages(
        messages: &[ChatMessage],
    ) -> Result<Vec<ChatCompletionRequestMessage>, AssistantError> {
        let invalid = |e: async_openai::error::OpenAIError| {
            AssistantError::BackendUnavailable(format!("invalid request: {e}"))
        };
        messages
            .iter()
            .map(|m| {
                Ok(match m.role {
                    ChatRole::System => ChatCompletionRequestMessage::System(
                        ChatCompletionRequestSystemMessageArgs::default()
                            .content(m.content.clone())
                            .build()
                            .map_err(invalid)?,
                    ),
                    ChatRole::User => ChatCompletionRequestMessage::User(
                        ChatCompletionRequestUserMessageArgs::default()
                            .content(m.content.clone())
                            .build()
                            .map_err(invalid)?,
                    ),
                    ChatRole::Assistant => ChatCompletionRequestMessage::Assistant(
                        ChatCompletionRequestAssistantMessageArgs::default()
                            .content(m.content.clone())
                            .build()
                            .map_err(invalid)?,
                    ),
                })
            })
            .collect()
    }
}

/// 文本模式下附加到 system prompt 的工具说明
pub fn tools_instruction(tools: &[ToolSpec]) -> String {
    let mut out = String::from(
        "\n\n## Tools\nIf an action is needed, reply with ONLY a JSON object of the form \
         {\"tool\": \"<name>\", \"args\": {...}} and nothing else. Otherwise reply in plain text.\n\
         Call format schema:\n",
    );
    out.push_str(&tool_call_schema_json());
    out.push_str("\nAvailable tools:\n");
    for t in tools {
        out.push_str(&format!("- {}: {} (parameters: {})\n", t.name, t.description, t.parameters));
    }
    out
}

#[async_trait]
impl LanguageBackend for OpenAiBackend {
    fn name(&self) -> &str {
        "openai"
    }

    async fn generate(
        &self,
        prompt: &str,
        tools: Option<&[ToolSpec]>,
        history: &[ConversationTurn],
    ) -> Result<BackendReply, AssistantError> {
        let tools = tools.filter(|t| !t.is_empty());
        let system = match tools {
            Some(t) => format!("{}{}", self.system_prompt, tools_instruction(t)),
            None => self.system_prompt.clone(),
        };
        let messages = build_messages(&system, history, prompt);

        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages(Self::to_openai_messages(&messages)?)
            .temperature(self.temperature)
            .max_completion_tokens(self.max_tokens)
            .build()
            .map_err(|e| AssistantError::BackendUnavailable(format!("invalid request: {e}")))?;

        let response = tokio::time::timeout(self.timeout, self.client.chat().create(request))
            .await
            .map_err(|_| {
                AssistantError::BackendUnavailable(format!(
                    "request timed out after {}s",
                    self.timeout.as_secs_f32()
                ))
            })?
            .map_err(|e| AssistantError::BackendUnavailable(e.to_string()))?;

        let content = response
            .choices
            .first()
            .and_then(|c| c.message.content.clone())
            .unwrap_or_default();

        // 未提供工具时不解析 JSON，原样作为回复
        Ok(match tools {
            Some(_) => parse_backend_output(&content),
            None => BackendReply::Reply(content.trim().to_string()),
        })
    }
}
