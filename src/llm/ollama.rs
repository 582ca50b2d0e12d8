//! Ollama 原生 /api/chat 客户端
//!
//! 非流式请求；tools 非空时走原生 function calling，响应中的 message.tool_calls 取第一条。
//! 连接失败、超时、非 2xx 一律映射为 BackendUnavailable。

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::core::AssistantError;
use crate::intent::ToolArgs;
use crate::llm::{build_messages, BackendReply, ChatMessage, LanguageBackend};
use crate::memory::ConversationTurn;
use crate::tools::ToolSpec;

pub const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";

pub struct OllamaBackend {
    http: reqwest::Client,
    base_url: String,
    model: String,
    system_prompt: String,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    stream: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<ToolDef<'a>>,
    options: ChatOptions,
}

#[derive(Debug, Serialize)]
struct ChatOptions {
    temperature: f32,
    num_predict: u32,
}

#[derive(Debug, Serialize)]
struct ToolDef<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    function: FunctionDef<'a>,
}

#[derive(Debug, Serialize)]
struct FunctionDef<'a> {
    name: &'a str,
    description: &'a str,
    parameters: &'a Value,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: String,
    #[serde(default)]
    tool_calls: Vec<ResponseToolCall>,
}

#[derive(Debug, Deserialize)]
struct ResponseToolCall {
    function: ResponseFunction,
}

#[derive(Debug, Deserialize)]
struct ResponseFunction {
    name: String,
    #[serde(default)]
    arguments: Value,
}

impl OllamaBackend {
    pub fn new(
        base_url: Option<&str>,
        model: &str,
        system_prompt: impl Into<String>,
        temperature: f32,
        max_tokens: u32,
        request_timeout_secs: u64,
    ) -> Result<Self, AssistantError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(request_timeout_secs.max(1)))
            .build()
            .map_err(|e| AssistantError::Config(format!("http client: {e}")))?;
        Ok(Self {
            http,
            base_url: base_url
                .unwrap_or(DEFAULT_OLLAMA_URL)
                .trim_end_matches('/')
                .to_string(),
            model: model.to_string(),
            system_prompt: system_prompt.into(),
            temperature,
            max_tokens,
        })
    }

    fn request<'a>(
        &'a self,
        prompt: &str,
        tools: Option<&'a [ToolSpec]>,
        history: &[ConversationTurn],
    ) -> ChatRequest<'a> {
        let tools = tools
            .unwrap_or_default()
            .iter()
            .map(|t| ToolDef {
                kind: "function",
                function: FunctionDef {
                    name: &t.name,
                    description: &t.description,
                    parameters: &t.parameters,
                },
            })
            .collect();
        ChatRequest {
            model: &self.model,
            messages: build_messages(&self.system_prompt, history, prompt),
            stream: false,
            tools,
            options: ChatOptions {
                temperature: self.temperature,
                num_predict: self.max_tokens,
            },
        }
    }
}

/// 取第一条 tool call，否则取文本回复；arguments 可能是对象，也可能是 JSON 字符串
fn into_reply(message: ResponseMessage) -> Result<BackendReply, AssistantError> {
    if let Some(call) = message.tool_calls.into_iter().next() {
        let args: ToolArgs = match call.function.arguments {
            Value::Object(map) => map,
            Value::Null => ToolArgs::new(),
            Value::String(s) if s.trim().is_empty() => ToolArgs::new(),
            Value::String(s) => serde_json::from_str(&s).map_err(|e| {
                AssistantError::BackendUnavailable(format!("malformed tool arguments: {e}"))
            })?,
            other => {
                return Err(AssistantError::BackendUnavailable(format!(
                    "malformed tool arguments: {other}"
                )))
            }
        };
        return Ok(BackendReply::ToolCall {
            name: call.function.name,
            args,
        });
    }
    Ok(BackendReply::Reply(message.content.trim().to_string()))
}

#[async_trait]
impl LanguageBackend for OllamaBackend {
    fn name(&self) -> &str {
        "ollama"
    }

    async fn generate(
        &self,
        prompt: &str,
        tools: Option<&[ToolSpec]>,
        history: &[ConversationTurn],
    ) -> Result<BackendReply, AssistantError> {
        let url = format!("{}/api/chat", self.base_url);
        let body = self.request(prompt, tools, history);
        tracing::debug!(model = %self.model, tools = body.tools.len(), "ollama request");

        let resp = self
            .http
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| AssistantError::BackendUnavailable(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(AssistantError::BackendUnavailable(format!(
                "ollama returned {status}: {}",
                text.chars().take(200).collect::<String>()
            )));
        }

        let parsed: ChatResponse = resp
            .json()
            .await
            .map_err(|e| AssistantError::BackendUnavailable(format!("invalid response: {e}")))?;
        into_reply(parsed.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn backend(url: &str) -> OllamaBackend {
        OllamaBackend::new(Some(url), "llama3", "You are Jarvis.", 0.6, 256, 2).unwrap()
    }

    #[test]
    fn test_request_body_shape() {
        let b = backend("http://localhost:11434/");
        assert_eq!(b.base_url, "http://localhost:11434");
        let specs = vec![ToolSpec {
            name: "read-screen".into(),
            description: "OCR the screen".into(),
            parameters: json!({"type": "object", "properties": {}}),
        }];
        let body = serde_json::to_value(b.request("hi", Some(&specs), &[])).unwrap();
        assert_eq!(body["stream"], false);
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][1]["content"], "hi");
        assert_eq!(body["tools"][0]["type"], "function");
        assert_eq!(body["tools"][0]["function"]["name"], "read-screen");
        assert_eq!(body["options"]["num_predict"], 256);

        let body = serde_json::to_value(b.request("hi", None, &[])).unwrap();
        assert!(body.get("tools").is_none());
    }

    #[test]
    fn test_parse_tool_call_response() {
        let resp: ChatResponse = serde_json::from_value(json!({
            "model": "llama3",
            "message": {
                "role": "assistant",
                "content": "",
                "tool_calls": [{"function": {"name": "click-at", "arguments": {"x": 1, "y": 2}}}]
            },
            "done": true
        }))
        .unwrap();
        match into_reply(resp.message).unwrap() {
            BackendReply::ToolCall { name, args } => {
                assert_eq!(name, "click-at");
                assert_eq!(args["y"], 2);
            }
            other => panic!("expected tool call, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_text_response() {
        let resp: ChatResponse = serde_json::from_value(json!({
            "message": {"role": "assistant", "content": " Hello! "}
        }))
        .unwrap();
        assert_eq!(
            into_reply(resp.message).unwrap(),
            BackendReply::Reply("Hello!".into())
        );
    }

    #[test]
    fn test_string_arguments_are_decoded() {
        let msg = ResponseMessage {
            content: String::new(),
            tool_calls: vec![ResponseToolCall {
                function: ResponseFunction {
                    name: "type-text".into(),
                    arguments: Value::String(r#"{"text": "hi"}"#.into()),
                },
            }],
        };
        match into_reply(msg).unwrap() {
            BackendReply::ToolCall { args, .. } => assert_eq!(args["text"], "hi"),
            other => panic!("expected tool call, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_unreachable_server_is_backend_unavailable() {
        let b = backend("http://127.0.0.1:9");
        let err = b.generate("hi", None, &[]).await.unwrap_err();
        assert!(matches!(err, AssistantError::BackendUnavailable(_)));
    }
}
