use crate::errors::ChainError;
use crate::spec::OutputSpec;
use serde_json::Value;

/// Parse a completed model response per the output specification.
pub fn parse(output: OutputSpec, content: &str) -> Result<Value, ChainError> {
    match output {
        OutputSpec::String => Ok(Value::String(content.to_string())),
        OutputSpec::Json => {
            let body = strip_code_fence(content);
            serde_json::from_str(body)
                .map_err(|err| ChainError::OutputParse(format!("invalid json output: {err}")))
        }
    }
}

/// Models often wrap JSON in a markdown code fence; strip one if present.
fn strip_code_fence(content: &str) -> &str {
    let trimmed = content.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    let rest = rest.strip_suffix("```").unwrap_or(rest);
    rest.trim()
}
