use thiserror::Error;

/// Error taxonomy for the model-client layer.
#[derive(Debug, Error)]
pub enum LlmError {
    #[error("invalid configuration: {0}")]
    Configuration(String),

    #[error("http request failed: {0}")]
    Http(String),

    #[error("api error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("decode failed: {0}")]
    Decode(String),

    #[error("stream failed: {0}")]
    Stream(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_error_reports_status_and_message() {
        let error = LlmError::Api {
            status: 429,
            message: "rate limited".to_string(),
        };
        assert_eq!(error.to_string(), "api error (status 429): rate limited");
    }
}
