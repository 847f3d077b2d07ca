//! Token counting utilities
//!
//! Used to fit prior conversation into the prompt budget. Models unknown to
//! tiktoken-rs are counted with the cl100k_base encoding, which is close
//! enough for budgeting.

use crate::types::{RagError, RagResult};
use tiktoken_rs::{cl100k_base, get_bpe_from_model, CoreBPE};
use tracing::debug;

/// Per-message overhead for role markers and separators
const MESSAGE_OVERHEAD_TOKENS: usize = 4;

/// Token counter for a model
pub struct TokenCounter {
    encoder: CoreBPE,
}

impl TokenCounter {
    /// Create a counter for `model_name`, falling back to cl100k_base
    pub fn new(model_name: &str) -> RagResult<Self> {
        let encoder = match get_bpe_from_model(model_name) {
            Ok(encoder) => encoder,
            Err(_) => {
                debug!(
                    "No tokenizer registered for {}, using cl100k_base",
                    model_name
                );
                cl100k_base().map_err(|e| {
                    RagError::Config(format!("Failed to load cl100k_base encoder: {}", e))
                })?
            }
        };

        Ok(Self { encoder })
    }

    /// Count tokens in a text string
    pub fn count_tokens(&self, text: &str) -> usize {
        self.encoder.encode_with_special_tokens(text).len()
    }

    /// Count tokens a chat message occupies in a prompt
    pub fn count_message_tokens(&self, content: &str) -> usize {
        self.count_tokens(content) + MESSAGE_OVERHEAD_TOKENS
    }
}
