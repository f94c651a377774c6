use thiserror::Error;

#[derive(Debug, Error)]
pub enum TouchlineError {
    // LLM errors
    #[error("LLM request failed: {0}")]
    LlmRequest(String),

    #[error("LLM streaming error: {0}")]
    LlmStream(String),

    #[error("LLM response parse error: {0}")]
    LlmParse(String),

    // Collaborator errors
    #[error("Provider error: {provider}: {message}")]
    Provider { provider: String, message: String },

    #[error("Provider timeout after {timeout_secs}s: {provider}")]
    ProviderTimeout { provider: String, timeout_secs: u64 },

    // Workflow errors
    #[error("Invalid workflow graph: {0}")]
    InvalidGraph(String),

    #[error("Routing fault: {0}")]
    Routing(String),

    #[error("Answer generation failed: {0}")]
    Generation(String),

    #[error("Step failed: {step}: {message}")]
    Step { step: String, message: String },

    #[error("Workflow invariant violated: {0}")]
    InvariantViolation(String),

    #[error("Workflow cancelled")]
    Cancelled,

    // Config errors
    #[error("Config error: {0}")]
    Config(String),

    #[error("Config file not found: {0}")]
    ConfigNotFound(String),

    // I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // JSON errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl TouchlineError {
    /// True for errors that indicate a bug in the graph or a step rather
    /// than a failing collaborator or a bad request.
    pub fn is_internal_defect(&self) -> bool {
        matches!(
            self,
            TouchlineError::InvariantViolation(_)
                | TouchlineError::InvalidGraph(_)
                | TouchlineError::Step { .. }
        )
    }

    /// Transient collaborator failures that retrieval steps absorb.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            TouchlineError::Provider { .. }
                | TouchlineError::ProviderTimeout { .. }
                | TouchlineError::LlmRequest(_)
                | TouchlineError::LlmStream(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, TouchlineError>;
