pub mod ollama;

pub use ollama::{LlmConfig, OllamaClient};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("missing base url")]
    MissingBaseUrl,
    #[error("http error: {0}")]
    Http(String),
    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

/// Text-completion capability used by the pipeline. Whatever comes back is
/// untrusted and always goes through `crate::parse`.
pub trait LlmOracle {
    fn invoke(&self, prompt: &str) -> Result<String, LlmError>;

    /// Startup availability check. Implementations without a remote side are
    /// always available.
    fn probe(&self) -> Result<(), LlmError> {
        Ok(())
    }
}
