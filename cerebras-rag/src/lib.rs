//! Cerebras RAG - documentation question answering with citations
//!
//! Retrieves Cerebras API documentation chunks from a hosted vector index,
//! optionally reranks them and asks an LLM for an answer that cites its
//! sources. Conversation threads give follow-up questions their context.

pub mod agent;
pub mod citations;
pub mod context;
pub mod embeddings;
pub mod generation;
mod http;
pub mod llm_client;
pub mod memory;
mod patterns;
pub mod reranker;
pub mod retriever;
pub mod token_counter;
pub mod types;
pub mod vector_store;

pub use agent::{AgentServices, DocsAgent};
pub use context::{clean_snippet, format_context};
pub use embeddings::{CohereEmbedder, Embedder};
pub use generation::{AnswerGenerator, NO_DOCUMENTS_ANSWER, NO_HISTORY_ANSWER};
pub use llm_client::{ChatModel, PromptMessage, PromptRole, SiumaiChatModel, TextStream};
pub use memory::{
    is_conversation_history_question, ConversationStore, FileConversationStore, HistoryPolicy,
    InMemoryConversationStore,
};
pub use reranker::{CohereReranker, RerankResult, Reranker};
pub use retriever::{DocumentRetriever, Retrieval};
pub use types::*;
pub use vector_store::{IndexStats, PineconeIndex, VectorIndex};

// Credential checks and configuration live in the core crate
pub use cerebras_rag_core::{
    check_prerequisites, AssistantConfig, Credentials, PrerequisiteReport,
};
