use crate::errors::ChainError;
use serde_json::{Map, Value, json};

const CHAT_ROLES: [&str; 4] = ["system", "human", "ai", "placeholder"];
const DEFAULT_MODEL: &str = "gpt-3.5-turbo";

/// One turn of a chat prompt template: a role and a template string.
#[derive(Clone, Debug, PartialEq)]
pub struct ChatTurn {
    pub role: String,
    pub template: String,
}

/// Prompt half of a chain specification.
///
/// A text prompt must contain at least one `{placeholder}`; a chat prompt is
/// a sequence of turns whose roles are restricted to
/// `system | human | ai | placeholder`.
#[derive(Clone, Debug, PartialEq)]
pub enum PromptSpec {
    Text(String),
    Chat(Vec<ChatTurn>),
}

impl PromptSpec {
    fn validate(&self) -> Result<(), ChainError> {
        match self {
            Self::Text(template) => {
                if template.is_empty() {
                    return Err(ChainError::Spec("text prompt is empty".to_string()));
                }
                if !template.contains('{') || !template.contains('}') {
                    return Err(ChainError::Spec(
                        "text prompt is missing placeholders".to_string(),
                    ));
                }
                Ok(())
            }
            Self::Chat(turns) => {
                for turn in turns {
                    if !CHAT_ROLES.contains(&turn.role.as_str()) {
                        return Err(ChainError::Spec(format!(
                            "invalid role in message: {}",
                            turn.role
                        )));
                    }
                }
                Ok(())
            }
        }
    }

    fn chat_from_value(data: &Value) -> Result<Self, ChainError> {
        let Value::Array(entries) = data else {
            return Err(ChainError::Spec(
                "'messages' must be an array of [role, template] pairs".to_string(),
            ));
        };
        let mut turns = Vec::with_capacity(entries.len());
        for entry in entries {
            let pair = entry.as_array().filter(|pair| pair.len() == 2);
            let (role, template) = match pair {
                Some(pair) => (pair[0].as_str(), pair[1].as_str()),
                None => (None, None),
            };
            let (Some(role), Some(template)) = (role, template) else {
                return Err(ChainError::Spec(format!(
                    "malformed message entry: {entry}"
                )));
            };
            turns.push(ChatTurn {
                role: role.to_string(),
                template: template.to_string(),
            });
        }
        Ok(Self::Chat(turns))
    }
}

/// Model half of a chain specification.
#[derive(Clone, Debug, PartialEq)]
pub struct LlmSpec {
    pub model: String,
    pub api_key: Option<String>,
    pub temperature: f64,
    pub top_p: Option<f64>,
    pub max_tokens: Option<u32>,
    pub n: u32,
}

impl Default for LlmSpec {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            api_key: None,
            temperature: 1.0,
            top_p: None,
            max_tokens: None,
            n: 1,
        }
    }
}

impl LlmSpec {
    fn from_value(data: &Value) -> Result<Self, ChainError> {
        let Value::Object(map) = data else {
            return Err(ChainError::Spec("'llm' must be an object".to_string()));
        };
        let defaults = Self::default();
        Ok(Self {
            model: match map.get("model") {
                Some(value) => value
                    .as_str()
                    .ok_or_else(|| ChainError::Spec("'llm.model' must be a string".to_string()))?
                    .to_string(),
                None => defaults.model,
            },
            api_key: map
                .get("api_key")
                .and_then(Value::as_str)
                .map(str::to_string),
            temperature: map
                .get("temperature")
                .and_then(Value::as_f64)
                .unwrap_or(defaults.temperature),
            top_p: map.get("top_p").and_then(Value::as_f64),
            max_tokens: map
                .get("max_tokens")
                .and_then(Value::as_u64)
                .map(|tokens| tokens as u32),
            n: map
                .get("n")
                .and_then(Value::as_u64)
                .map(|n| n as u32)
                .unwrap_or(defaults.n),
        })
    }

    fn to_value(&self) -> Value {
        let mut map = Map::new();
        map.insert("model".to_string(), json!(self.model));
        if let Some(api_key) = &self.api_key {
            map.insert("api_key".to_string(), json!(api_key));
        }
        map.insert("temperature".to_string(), json!(self.temperature));
        if let Some(top_p) = self.top_p {
            map.insert("top_p".to_string(), json!(top_p));
        }
        if let Some(max_tokens) = self.max_tokens {
            map.insert("max_tokens".to_string(), json!(max_tokens));
        }
        map.insert("n".to_string(), json!(self.n));
        Value::Object(map)
    }
}

/// Output-parser half of a chain specification.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OutputSpec {
    #[default]
    String,
    Json,
}

impl OutputSpec {
    fn from_value(data: &Value) -> Result<Self, ChainError> {
        let kind = data
            .get("type")
            .and_then(Value::as_str)
            .unwrap_or("string");
        match kind {
            "string" => Ok(Self::String),
            "json" => Ok(Self::Json),
            other => Err(ChainError::Spec(format!("invalid output type: {other}"))),
        }
    }

    fn to_value(self) -> Value {
        let kind = match self {
            Self::String => "string",
            Self::Json => "json",
        };
        json!({ "type": kind })
    }
}

/// Complete declarative specification of one chain.
///
/// Document form is flattened: the top level carries either `"text"` or
/// `"messages"` (exactly one), plus required `"llm"` and `"output"` keys.
#[derive(Clone, Debug, PartialEq)]
pub struct ChainSpec {
    pub prompt: PromptSpec,
    pub llm: LlmSpec,
    pub output: OutputSpec,
}

impl ChainSpec {
    pub fn from_value(data: &Value) -> Result<Self, ChainError> {
        let Value::Object(map) = data else {
            return Err(ChainError::Spec(
                "chain specification must be an object".to_string(),
            ));
        };
        for key in ["llm", "output"] {
            if !map.contains_key(key) {
                return Err(ChainError::Spec(format!(
                    "missing required key '{key}'"
                )));
            }
        }

        let prompt = match (map.get("text"), map.get("messages")) {
            (Some(_), Some(_)) => {
                return Err(ChainError::Spec(
                    "specification cannot contain both 'text' and 'messages'".to_string(),
                ));
            }
            (Some(text), None) => {
                let template = text.as_str().ok_or_else(|| {
                    ChainError::Spec("'text' must be a string".to_string())
                })?;
                PromptSpec::Text(template.to_string())
            }
            (None, Some(messages)) => PromptSpec::chat_from_value(messages)?,
            (None, None) => {
                return Err(ChainError::Spec(
                    "specification must contain either 'text' or 'messages'".to_string(),
                ));
            }
        };

        let spec = Self {
            prompt,
            llm: LlmSpec::from_value(&map["llm"])?,
            output: OutputSpec::from_value(&map["output"])?,
        };
        spec.prompt.validate()?;
        Ok(spec)
    }

    pub fn to_value(&self) -> Value {
        let mut map = Map::new();
        match &self.prompt {
            PromptSpec::Text(template) => {
                map.insert("text".to_string(), json!(template));
            }
            PromptSpec::Chat(turns) => {
                let messages: Vec<Value> = turns
                    .iter()
                    .map(|turn| json!([turn.role, turn.template]))
                    .collect();
                map.insert("messages".to_string(), Value::Array(messages));
            }
        }
        map.insert("llm".to_string(), self.llm.to_value());
        map.insert("output".to_string(), self.output.to_value());
        Value::Object(map)
    }
}
