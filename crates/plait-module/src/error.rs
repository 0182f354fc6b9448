use plait_trace::TraceError;
use thiserror::Error;

/// Top-level error type for the composition core.
///
/// The core recovers nothing itself; every failure surfaces to the caller of
/// the top-level dispatch.
#[derive(Debug, Error)]
pub enum ModuleError {
    #[error("no attribute '{0}' in the parameter or child registries")]
    AttributeNotFound(String),

    #[error("module '{0}' is missing the required forward implementation")]
    ForwardNotImplemented(String),

    #[error("invalid configuration: {0}")]
    Configuration(String),

    #[error("snapshot io failed: {0}")]
    SnapshotIo(String),

    #[error("malformed snapshot: {0}")]
    SnapshotFormat(String),

    #[error(transparent)]
    Trace(#[from] TraceError),

    #[error(transparent)]
    External(Box<dyn std::error::Error + Send + Sync>),
}

impl ModuleError {
    /// Wrap a leaf-collaborator failure for pass-through to the caller.
    pub fn external(error: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        Self::External(error.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attribute_not_found_names_the_missing_slot() {
        let error = ModuleError::AttributeNotFound("answer".to_string());
        assert_eq!(
            error.to_string(),
            "no attribute 'answer' in the parameter or child registries"
        );
    }

    #[test]
    fn external_errors_pass_through_their_message() {
        let error = ModuleError::external(std::io::Error::other("connection reset"));
        assert_eq!(error.to_string(), "connection reset");
    }
}
