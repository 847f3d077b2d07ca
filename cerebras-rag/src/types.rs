//! Type definitions for the RAG system
//!
//! This module defines the core types used throughout the RAG pipeline.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A chunk of documentation as stored in the vector index
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentChunk {
    /// Vector id assigned by the ingestion step
    pub id: String,
    /// Raw chunk text
    pub text: String,
    /// Source path or URL
    pub source: Option<String>,
    /// Document title
    pub title: Option<String>,
    /// Position of the chunk within its document
    pub chunk_index: Option<u64>,
    /// Remaining metadata from the index
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
}

impl DocumentChunk {
    pub fn title_or_default(&self) -> &str {
        self.title.as_deref().unwrap_or("Untitled")
    }

    pub fn source_or_default(&self) -> &str {
        self.source.as_deref().unwrap_or("Unknown source")
    }
}

/// Search result with similarity or relevance score
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub chunk: DocumentChunk,
    /// Similarity score from the index, replaced by the relevance score after reranking
    pub score: f32,
}

/// A claim-to-source link
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Citation {
    /// Position of the cited chunk in the retrieval batch
    pub source_id: usize,
    /// Verbatim quote from the cited chunk
    pub quote: String,
}

/// How an answer was produced
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GenerationMode {
    /// Parsed from the model's structured JSON output
    Structured,
    /// Structured output was requested but could not be parsed
    Unstructured,
    /// Plain completion without citations
    Plain,
}

/// A response to one question
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuotedAnswer {
    pub answer: String,
    pub citations: Vec<Citation>,
    pub mode: GenerationMode,
}

impl QuotedAnswer {
    pub fn plain(answer: impl Into<String>) -> Self {
        Self {
            answer: answer.into(),
            citations: Vec::new(),
            mode: GenerationMode::Plain,
        }
    }
}

/// Selects the conversation thread a call reads from and appends to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThreadConfig {
    pub thread_id: String,
}

impl ThreadConfig {
    pub fn new(thread_id: impl Into<String>) -> Self {
        Self {
            thread_id: thread_id.into(),
        }
    }
}

/// Per-call options for asking a question
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AskOptions {
    pub use_citations: bool,
    pub use_reranking: bool,
    /// Falls back to the configured default thread when unset
    pub thread: Option<ThreadConfig>,
}

impl Default for AskOptions {
    fn default() -> Self {
        Self {
            use_citations: true,
            use_reranking: false,
            thread: None,
        }
    }
}

impl AskOptions {
    pub fn with_thread(mut self, thread_id: impl Into<String>) -> Self {
        self.thread = Some(ThreadConfig::new(thread_id));
        self
    }
}

/// Events emitted by the streaming answer path
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AnswerEvent {
    Status {
        message: String,
    },
    Answer {
        content: String,
    },
    Citation {
        source_id: usize,
        quote: String,
        title: String,
        url: String,
    },
    Warning {
        message: String,
    },
    Error {
        message: String,
    },
}

impl AnswerEvent {
    pub fn status(message: impl Into<String>) -> Self {
        Self::Status {
            message: message.into(),
        }
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self::Warning {
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Error { .. })
    }
}

/// Connection state of the vector index
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum IndexState {
    Ready { vector_count: u64 },
    AlreadyInitialized,
    NotFound,
    Empty,
    Unreachable,
}

/// Result of connecting to the vector index
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VectorStoreStatus {
    pub success: bool,
    pub message: String,
    pub state: IndexState,
}

/// Author of a conversation message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Assistant,
}

impl MessageRole {
    /// Speaker label used when history is rendered into a prompt
    pub fn label(&self) -> &'static str {
        match self {
            MessageRole::User => "Human",
            MessageRole::Assistant => "Assistant",
        }
    }
}

/// Message in a conversation thread
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationMessage {
    pub role: MessageRole,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

impl ConversationMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: content.into(),
            timestamp: Utc::now(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Assistant,
            content: content.into(),
            timestamp: Utc::now(),
        }
    }
}

/// Conversation thread
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationThread {
    pub thread_id: String,
    pub messages: Vec<ConversationMessage>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ConversationThread {
    pub fn new(thread_id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            thread_id: thread_id.into(),
            messages: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }
}

/// Error types for the RAG system
#[derive(Debug, thiserror::Error)]
pub enum RagError {
    #[error("Embedding error: {0}")]
    Embedding(String),

    #[error("Retrieval error: {0}")]
    Retrieval(String),

    #[error("Rerank error: {0}")]
    Rerank(String),

    #[error("LLM error: {0}")]
    Llm(String),

    #[error("Malformed structured output: {0}")]
    MalformedOutput(String),

    #[error("Memory error: {0}")]
    Memory(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Core error: {0}")]
    Core(Box<cerebras_rag_core::CoreError>),
}

impl From<cerebras_rag_core::CoreError> for RagError {
    fn from(err: cerebras_rag_core::CoreError) -> Self {
        RagError::Core(Box::new(err))
    }
}

pub type RagResult<T> = Result<T, RagError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_answer_events_serialize_with_type_tag() {
        let event = AnswerEvent::Citation {
            source_id: 2,
            quote: "Use a bearer token".to_string(),
            title: "Authentication".to_string(),
            url: "https://inference-docs.cerebras.ai/auth".to_string(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "citation");
        assert_eq!(json["source_id"], 2);

        let json = serde_json::to_value(AnswerEvent::status("working")).unwrap();
        assert_eq!(json, serde_json::json!({"type": "status", "message": "working"}));
    }

    #[test]
    fn test_chunk_defaults() {
        let chunk = DocumentChunk {
            id: "a".to_string(),
            text: "text".to_string(),
            source: None,
            title: None,
            chunk_index: None,
            metadata: HashMap::new(),
        };
        assert_eq!(chunk.title_or_default(), "Untitled");
        assert_eq!(chunk.source_or_default(), "Unknown source");
    }

    #[test]
    fn test_ask_options_default() {
        let options = AskOptions::default();
        assert!(options.use_citations);
        assert!(!options.use_reranking);
        assert!(options.thread.is_none());

        let options = options.with_thread("cli_session");
        assert_eq!(options.thread.unwrap().thread_id, "cli_session");
    }
}
