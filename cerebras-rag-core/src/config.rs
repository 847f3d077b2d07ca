//! Configuration management
//!
//! Defaults, TOML file I/O, validation and the environment credentials the
//! assistant needs before it touches the network.

use crate::error::{CoreError, CoreResult, ErrorContext};
use crate::logging::LoggingConfig;
use crate::types::{
    AssistantConfig, EmbeddingConfig, GenerationConfig, LlmConfig, MemoryConfig, RetrievalConfig,
    VectorStoreConfig,
};
use crate::validation_error;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::info;

pub const LLM_API_KEY_VAR: &str = "OPENROUTER_API_KEY";
pub const VECTOR_DB_API_KEY_VAR: &str = "PINECONE_API_KEY";
pub const EMBEDDINGS_API_KEY_VAR: &str = "COHERE_API_KEY";
pub const LLM_BASE_URL_VAR: &str = "OPENROUTER_BASE_URL";
pub const THREAD_ID_VAR: &str = "CEREBRAS_RAG_THREAD_ID";

/// A credential that must be present in the environment
#[derive(Debug, Clone, Copy)]
pub struct RequiredCredential {
    pub name: &'static str,
    pub purpose: &'static str,
}

pub const REQUIRED_CREDENTIALS: [RequiredCredential; 3] = [
    RequiredCredential {
        name: LLM_API_KEY_VAR,
        purpose: "for the LLM gateway",
    },
    RequiredCredential {
        name: VECTOR_DB_API_KEY_VAR,
        purpose: "for the vector database",
    },
    RequiredCredential {
        name: EMBEDDINGS_API_KEY_VAR,
        purpose: "for embeddings and reranking",
    },
];

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            model: "qwen/qwen3-32b".to_string(),
            base_url: "https://openrouter.ai/api/v1".to_string(),
            temperature: 0.2,
            max_tokens: 2048,
        }
    }
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            model: "embed-english-v3.0".to_string(),
            base_url: "https://api.cohere.com".to_string(),
        }
    }
}

impl Default for VectorStoreConfig {
    fn default() -> Self {
        Self {
            index_name: "cerebras-docs".to_string(),
            namespace: String::new(),
            control_plane_url: "https://api.pinecone.io".to_string(),
            text_key: "text".to_string(),
        }
    }
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: 6,
            rerank_candidates: 12,
            rerank_top_n: 4,
            rerank_model: "rerank-english-v3.0".to_string(),
        }
    }
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            verify_citations: false,
            structured_fallback: false,
        }
    }
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            max_history_messages: 100,
            max_context_tokens: 4000,
            persist_dir: None,
            default_thread_id: "1".to_string(),
        }
    }
}

impl Default for AssistantConfig {
    fn default() -> Self {
        Self {
            llm: LlmConfig::default(),
            embedding: EmbeddingConfig::default(),
            vector_store: VectorStoreConfig::default(),
            retrieval: RetrievalConfig::default(),
            generation: GenerationConfig::default(),
            memory: MemoryConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl AssistantConfig {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> CoreResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| CoreError::Config {
            message: format!("Failed to read config file: {}", e),
            source: Some(Box::new(e)),
            context: ErrorContext::new("config")
                .with_operation("read_file")
                .with_suggestion("Check if the config file exists and is readable"),
        })?;

        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> CoreResult<Self> {
        toml::from_str(content).map_err(|e| CoreError::Config {
            message: format!("Failed to parse config: {}", e),
            source: Some(Box::new(e)),
            context: ErrorContext::new("config")
                .with_operation("parse_toml")
                .with_suggestion("Check TOML syntax in config file"),
        })
    }

    /// Save configuration to a TOML file, creating parent directories
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> CoreResult<()> {
        let path = path.as_ref();
        let content = toml::to_string_pretty(self).map_err(|e| CoreError::Config {
            message: format!("Failed to serialize config: {}", e),
            source: Some(Box::new(e)),
            context: ErrorContext::new("config").with_operation("serialize_toml"),
        })?;

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        std::fs::write(path, content).map_err(|e| CoreError::Config {
            message: format!("Failed to write config file: {}", e),
            source: Some(Box::new(e)),
            context: ErrorContext::new("config")
                .with_operation("write_file")
                .with_suggestion("Check if the directory exists and is writable"),
        })?;

        Ok(())
    }

    /// Load from an explicit path, else the first default location that
    /// exists, else built-in defaults.
    pub fn load(explicit: Option<&Path>) -> CoreResult<Self> {
        if let Some(path) = explicit {
            info!("Loading configuration from {:?}", path);
            return Self::from_file(path);
        }

        for path in default_config_paths() {
            if path.exists() {
                info!("Loading configuration from {:?}", path);
                return Self::from_file(&path);
            }
        }

        info!("No configuration file found, using defaults");
        Ok(Self::default())
    }

    /// Validate configuration
    pub fn validate(&self) -> CoreResult<()> {
        if self.llm.model.trim().is_empty() {
            return Err(validation_error!("LLM model must not be empty", "llm.model", "config"));
        }
        if !(0.0..=2.0).contains(&self.llm.temperature) {
            return Err(validation_error!(
                "LLM temperature must be between 0.0 and 2.0",
                "llm.temperature",
                "config"
            ));
        }
        if self.embedding.model.trim().is_empty() {
            return Err(validation_error!(
                "Embedding model must not be empty",
                "embedding.model",
                "config"
            ));
        }
        if self.vector_store.index_name.trim().is_empty() {
            return Err(validation_error!(
                "Vector store index name must not be empty",
                "vector_store.index_name",
                "config"
            ));
        }
        if self.retrieval.top_k == 0 {
            return Err(validation_error!(
                "Retrieval top_k must be greater than 0",
                "retrieval.top_k",
                "config"
            ));
        }
        if self.retrieval.rerank_top_n == 0 {
            return Err(validation_error!(
                "Retrieval rerank_top_n must be greater than 0",
                "retrieval.rerank_top_n",
                "config"
            ));
        }
        if self.memory.default_thread_id.trim().is_empty() {
            return Err(validation_error!(
                "Default thread id must not be empty",
                "memory.default_thread_id",
                "config"
            ));
        }

        Ok(())
    }
}

/// Candidate config file locations, in lookup order
pub fn default_config_paths() -> Vec<PathBuf> {
    [
        dirs::config_dir().map(|d| d.join("cerebras-rag").join("config.toml")),
        dirs::home_dir().map(|d| d.join(".cerebras-rag").join("config.toml")),
        Some(PathBuf::from("cerebras-rag.toml")),
    ]
    .into_iter()
    .flatten()
    .collect()
}

/// Outcome of the credential check
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PrerequisiteReport {
    pub ok: bool,
    /// Names of the absent variables, in declaration order
    pub missing: Vec<String>,
}

impl PrerequisiteReport {
    /// Missing names annotated with what they are for
    pub fn describe_missing(&self) -> Vec<String> {
        self.missing
            .iter()
            .map(|name| {
                match REQUIRED_CREDENTIALS.iter().find(|c| c.name == name) {
                    Some(cred) => format!("{} ({})", cred.name, cred.purpose),
                    None => name.clone(),
                }
            })
            .collect()
    }
}

/// Check the process environment for the three required credentials
pub fn check_prerequisites() -> PrerequisiteReport {
    check_prerequisites_with(|name| std::env::var(name).ok())
}

/// Same as [`check_prerequisites`] with an injectable lookup. Empty values
/// count as missing.
pub fn check_prerequisites_with<F>(lookup: F) -> PrerequisiteReport
where
    F: Fn(&str) -> Option<String>,
{
    let missing: Vec<String> = REQUIRED_CREDENTIALS
        .iter()
        .filter(|cred| lookup(cred.name).map_or(true, |v| v.trim().is_empty()))
        .map(|cred| cred.name.to_string())
        .collect();

    PrerequisiteReport {
        ok: missing.is_empty(),
        missing,
    }
}

/// Credentials resolved from the environment
#[derive(Clone)]
pub struct Credentials {
    pub llm_api_key: String,
    pub vector_db_api_key: String,
    pub embeddings_api_key: String,
    pub llm_base_url: Option<String>,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("llm_api_key", &"<redacted>")
            .field("vector_db_api_key", &"<redacted>")
            .field("embeddings_api_key", &"<redacted>")
            .field("llm_base_url", &self.llm_base_url)
            .finish()
    }
}

impl Credentials {
    pub fn from_env() -> CoreResult<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> CoreResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let report = check_prerequisites_with(&lookup);
        if !report.ok {
            return Err(CoreError::MissingCredentials {
                missing: report.missing,
                context: ErrorContext::new("config")
                    .with_operation("load_credentials")
                    .with_suggestion("Export the variables or add them to a .env file"),
            });
        }

        let get = |name: &str| lookup(name).unwrap_or_default();
        Ok(Self {
            llm_api_key: get(LLM_API_KEY_VAR),
            vector_db_api_key: get(VECTOR_DB_API_KEY_VAR),
            embeddings_api_key: get(EMBEDDINGS_API_KEY_VAR),
            llm_base_url: lookup(LLM_BASE_URL_VAR).filter(|v| !v.trim().is_empty()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_prerequisites_all_present() {
        let vars = env(&[
            (LLM_API_KEY_VAR, "a"),
            (VECTOR_DB_API_KEY_VAR, "b"),
            (EMBEDDINGS_API_KEY_VAR, "c"),
        ]);
        let report = check_prerequisites_with(|n| vars.get(n).cloned());
        assert!(report.ok);
        assert!(report.missing.is_empty());
    }

    #[test]
    fn test_prerequisites_report_exactly_the_missing_ones() {
        let vars = env(&[(VECTOR_DB_API_KEY_VAR, "b"), (EMBEDDINGS_API_KEY_VAR, "  ")]);
        let report = check_prerequisites_with(|n| vars.get(n).cloned());

        assert!(!report.ok);
        assert_eq!(
            report.missing,
            vec![LLM_API_KEY_VAR.to_string(), EMBEDDINGS_API_KEY_VAR.to_string()]
        );
        assert_eq!(
            report.describe_missing()[0],
            "OPENROUTER_API_KEY (for the LLM gateway)"
        );
    }

    #[test]
    fn test_credentials_from_lookup() {
        let vars = env(&[
            (LLM_API_KEY_VAR, "llm"),
            (VECTOR_DB_API_KEY_VAR, "pc"),
            (EMBEDDINGS_API_KEY_VAR, "co"),
            (LLM_BASE_URL_VAR, "http://localhost:8080/v1"),
        ]);
        let creds = Credentials::from_lookup(|n| vars.get(n).cloned()).unwrap();
        assert_eq!(creds.llm_api_key, "llm");
        assert_eq!(creds.llm_base_url.as_deref(), Some("http://localhost:8080/v1"));
        assert!(!format!("{:?}", creds).contains("llm\""));

        let err = Credentials::from_lookup(|_| None).unwrap_err();
        assert!(matches!(err, CoreError::MissingCredentials { ref missing, .. } if missing.len() == 3));
    }

    #[test]
    fn test_validate_rejects_zero_top_k() {
        let mut config = AssistantConfig::default();
        assert!(config.validate().is_ok());

        config.retrieval.top_k = 0;
        assert!(matches!(
            config.validate(),
            Err(CoreError::Validation { field: Some(ref f), .. }) if f == "retrieval.top_k"
        ));
    }

    #[test]
    fn test_unbounded_caps_survive_toml_round_trip() {
        let mut config = AssistantConfig::default();
        config.memory.max_history_messages = 0;
        config.llm.max_tokens = 0;

        let text = toml::to_string_pretty(&config).unwrap();
        let loaded = AssistantConfig::from_toml_str(&text).unwrap();

        assert_eq!(loaded.memory.max_history_messages, 0);
        assert_eq!(loaded.llm.max_tokens, 0);
        assert!(loaded.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config = AssistantConfig::from_toml_str(
            r#"
            [retrieval]
            top_k = 8

            [memory]
            max_history_messages = 10
            "#,
        )
        .unwrap();

        assert_eq!(config.retrieval.top_k, 8);
        assert_eq!(config.retrieval.rerank_top_n, 4);
        assert_eq!(config.memory.max_history_messages, 10);
        assert_eq!(config.vector_store.index_name, "cerebras-docs");
    }
}
