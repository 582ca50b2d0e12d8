//! 语言后端层：后端抽象与实现（Ollama / OpenAI 兼容 / Mock）

pub mod mock;
pub mod ollama;
pub mod openai;
pub mod traits;

use std::sync::Arc;
use std::time::Duration;

pub use mock::{MockBackend, MockCall};
pub use ollama::{OllamaBackend, DEFAULT_OLLAMA_URL};
pub use openai::OpenAiBackend;
pub use traits::{build_messages, parse_backend_output, BackendReply, ChatMessage, ChatRole, LanguageBackend};

use crate::config::AppConfig;
use crate::core::AssistantError;

/// 按 [llm] provider 创建后端；"none" 或空表示不使用语言后端
pub fn create_backend_from_config(
    cfg: &AppConfig,
    system_prompt: &str,
) -> Result<Option<Arc<dyn LanguageBackend>>, AssistantError> {
    let llm = &cfg.llm;
    let provider = llm.provider.trim().to_lowercase();
    let backend: Arc<dyn LanguageBackend> = match provider.as_str() {
        "" | "none" => {
            tracing::warn!("No language backend configured; unmatched utterances will not be understood");
            return Ok(None);
        }
        "ollama" => Arc::new(OllamaBackend::new(
            llm.base_url.as_deref(),
            &llm.model,
            system_prompt,
            llm.temperature,
            llm.max_tokens,
            llm.timeouts.request,
        )?),
        "openai" => Arc::new(OpenAiBackend::new(
            llm.base_url.as_deref(),
            &llm.model,
            None,
            system_prompt,
            llm.temperature,
            llm.max_tokens,
            Duration::from_secs(llm.timeouts.request.max(1)),
        )),
        "mock" => Arc::new(MockBackend::new()),
        other => {
            return Err(AssistantError::Config(format!("unknown llm provider: {other}")));
        }
    };
    tracing::info!(provider = %provider, model = %llm.model, "language backend ready");
    Ok(Some(backend))
}
