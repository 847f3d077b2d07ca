//! Unified error handling
//!
//! Structured error types carrying a context with recovery suggestions

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub type CoreResult<T> = Result<T, CoreError>;

/// Error context providing additional information for debugging and recovery
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorContext {
    /// Unique error ID for tracking
    pub error_id: String,
    /// Timestamp when error occurred
    pub timestamp: DateTime<Utc>,
    /// Component where error originated
    pub component: String,
    /// Operation being performed when error occurred
    pub operation: Option<String>,
    /// Recovery suggestions
    pub recovery_suggestions: Vec<String>,
}

impl ErrorContext {
    pub fn new(component: &str) -> Self {
        Self {
            error_id: uuid::Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            component: component.to_string(),
            operation: None,
            recovery_suggestions: Vec::new(),
        }
    }

    pub fn with_operation(mut self, operation: &str) -> Self {
        self.operation = Some(operation.to_string());
        self
    }

    pub fn with_suggestion(mut self, suggestion: &str) -> Self {
        self.recovery_suggestions.push(suggestion.to_string());
        self
    }
}

/// Main error type shared by the assistant crates
#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Configuration error: {message}")]
    Config {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
        context: ErrorContext,
    },

    #[error("Missing credentials: {}", missing.join(", "))]
    MissingCredentials {
        missing: Vec<String>,
        context: ErrorContext,
    },

    #[error("Validation error: {message}")]
    Validation {
        message: String,
        field: Option<String>,
        context: ErrorContext,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl CoreError {
    /// Get the error context
    pub fn context(&self) -> Option<&ErrorContext> {
        match self {
            CoreError::Config { context, .. } => Some(context),
            CoreError::MissingCredentials { context, .. } => Some(context),
            CoreError::Validation { context, .. } => Some(context),
            CoreError::Io(_) => None,
        }
    }
}

/// Convenience macros for creating errors with context
#[macro_export]
macro_rules! config_error {
    ($msg:expr, $component:expr) => {
        $crate::CoreError::Config {
            message: $msg.to_string(),
            source: None,
            context: $crate::ErrorContext::new($component)
                .with_suggestion("Check your configuration file")
                .with_suggestion("Run 'cerebras-rag config --init' to create a default config"),
        }
    };
}

#[macro_export]
macro_rules! validation_error {
    ($msg:expr, $field:expr, $component:expr) => {
        $crate::CoreError::Validation {
            message: $msg.to_string(),
            field: Some($field.to_string()),
            context: $crate::ErrorContext::new($component)
                .with_suggestion("Check the field value and format"),
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_credentials_message_lists_names() {
        let err = CoreError::MissingCredentials {
            missing: vec!["PINECONE_API_KEY".to_string(), "COHERE_API_KEY".to_string()],
            context: ErrorContext::new("test"),
        };

        assert_eq!(
            err.to_string(),
            "Missing credentials: PINECONE_API_KEY, COHERE_API_KEY"
        );
    }

    #[test]
    fn test_macros_attach_context() {
        let err = validation_error!("top_k must be positive", "retrieval.top_k", "config");
        match &err {
            CoreError::Validation { field, context, .. } => {
                assert_eq!(field.as_deref(), Some("retrieval.top_k"));
                assert_eq!(context.component, "config");
                assert!(!context.recovery_suggestions.is_empty());
            }
            other => panic!("Expected Validation error, got {other:?}"),
        }

        let err = config_error!("log_file_path must be set", "logging");
        let context = err.context().unwrap();
        assert_eq!(context.component, "logging");
        assert!(!context.error_id.is_empty());
    }
}
