use plait_llm::LlmError;
use thiserror::Error;

/// Error type for chain specification, assembly, and execution.
#[derive(Debug, Error)]
pub enum ChainError {
    #[error("invalid chain specification: {0}")]
    Spec(String),

    #[error("invalid chain input: {0}")]
    Input(String),

    #[error("output parse failed: {0}")]
    OutputParse(String),

    #[error(transparent)]
    Llm(#[from] LlmError),
}
