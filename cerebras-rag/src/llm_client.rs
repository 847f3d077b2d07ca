//! LLM client integration using siumai
//!
//! The assistant talks to an OpenAI-compatible gateway. Everything above this
//! module sees the [`ChatModel`] trait only.

use crate::types::{RagError, RagResult};
use async_trait::async_trait;
use cerebras_rag_core::LlmConfig;
use futures::stream::{BoxStream, StreamExt};
use siumai::prelude::*;
use std::time::Instant;
use tracing::{debug, info};

/// Speaker of a prompt message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptRole {
    System,
    User,
    Assistant,
}

/// Provider-neutral chat message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptMessage {
    pub role: PromptRole,
    pub content: String,
}

impl PromptMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: PromptRole::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: PromptRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: PromptRole::Assistant,
            content: content.into(),
        }
    }
}

/// Text deltas from a streaming completion
pub type TextStream = BoxStream<'static, RagResult<String>>;

/// A chat completion backend
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Run a completion and return the full text
    async fn complete(&self, messages: Vec<PromptMessage>) -> RagResult<String>;

    /// Run a completion and return text deltas as they arrive
    async fn stream(&self, messages: Vec<PromptMessage>) -> RagResult<TextStream>;

    fn model_name(&self) -> &str;
}

/// [`ChatModel`] backed by a siumai OpenAI-compatible client
pub struct SiumaiChatModel {
    client: Box<dyn LlmClient>,
    config: LlmConfig,
}

impl SiumaiChatModel {
    /// Build a client for `config`; `base_url` overrides the configured gateway
    pub async fn new(config: LlmConfig, api_key: &str, base_url: Option<&str>) -> RagResult<Self> {
        let base_url = base_url.unwrap_or(&config.base_url).to_string();

        let mut builder = LlmBuilder::new()
            .openai()
            .api_key(api_key)
            .model(&config.model)
            .temperature(config.temperature)
            .base_url(&base_url);

        if config.max_tokens > 0 {
            builder = builder.max_tokens(config.max_tokens);
        }

        let client = builder
            .build()
            .await
            .map_err(|e| RagError::Llm(format!("Failed to build LLM client: {}", e)))?;

        info!(
            "Created LLM client for model: {} via {}",
            config.model, base_url
        );

        Ok(Self {
            client: Box::new(client),
            config,
        })
    }

    fn to_chat_messages(messages: Vec<PromptMessage>) -> Vec<ChatMessage> {
        messages
            .into_iter()
            .map(|m| match m.role {
                PromptRole::System => ChatMessage::system(m.content).build(),
                PromptRole::User => ChatMessage::user(m.content).build(),
                PromptRole::Assistant => ChatMessage::assistant(m.content).build(),
            })
            .collect()
    }
}

#[async_trait]
impl ChatModel for SiumaiChatModel {
    async fn complete(&self, messages: Vec<PromptMessage>) -> RagResult<String> {
        let start_time = Instant::now();

        debug!("Generating response with {} messages", messages.len());

        let response = self
            .client
            .chat(Self::to_chat_messages(messages))
            .await
            .map_err(|e| RagError::Llm(format!("LLM generation failed: {}", e)))?;

        match response.content_text() {
            Some(content) => {
                info!(
                    "Generated response in {:?} ({} chars)",
                    start_time.elapsed(),
                    content.len()
                );
                Ok(content.to_string())
            }
            None => Err(RagError::Llm("No text content in LLM response".to_string())),
        }
    }

    async fn stream(&self, messages: Vec<PromptMessage>) -> RagResult<TextStream> {
        debug!("Streaming response with {} messages", messages.len());

        let events = self
            .client
            .chat_stream(Self::to_chat_messages(messages), None)
            .await
            .map_err(|e| RagError::Llm(format!("Failed to start LLM stream: {}", e)))?;

        let deltas = events.filter_map(|event| async move {
            match event {
                Ok(ChatStreamEvent::ContentDelta { delta, .. }) => Some(Ok(delta)),
                Ok(_) => None,
                Err(e) => Some(Err(RagError::Llm(format!("LLM stream failed: {}", e)))),
            }
        });

        Ok(deltas.boxed())
    }

    fn model_name(&self) -> &str {
        &self.config.model
    }
}
