//! Cerebras RAG Core - configuration, errors and logging
//!
//! Shared foundations for the documentation assistant crates

pub mod config;
pub mod error;
pub mod logging;
pub mod types;

pub use config::*;
pub use error::*;
pub use logging::*;
pub use types::*;

// Re-export commonly used external types
pub use tracing;
