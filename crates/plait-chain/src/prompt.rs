use crate::errors::ChainError;
use crate::spec::{ChatTurn, PromptSpec};
use plait_llm::ChatMessage;
use serde_json::Value;

/// Render a prompt specification against one input object.
pub fn render(prompt: &PromptSpec, inputs: &Value) -> Result<Vec<ChatMessage>, ChainError> {
    match prompt {
        PromptSpec::Text(template) => {
            let content = render_template(template, inputs)?;
            Ok(vec![ChatMessage::user(content)])
        }
        PromptSpec::Chat(turns) => {
            let mut messages = Vec::with_capacity(turns.len());
            for turn in turns {
                if turn.role == "placeholder" {
                    messages.extend(splice_conversation(turn, inputs)?);
                } else {
                    messages.push(ChatMessage::new(
                        wire_role(&turn.role),
                        render_template(&turn.template, inputs)?,
                    ));
                }
            }
            Ok(messages)
        }
    }
}

fn wire_role(role: &str) -> &str {
    match role {
        "human" => "user",
        "ai" => "assistant",
        other => other,
    }
}

/// Expand a `placeholder` turn: its template names one input variable
/// holding a conversation — an array of `[role, text]` pairs.
fn splice_conversation(turn: &ChatTurn, inputs: &Value) -> Result<Vec<ChatMessage>, ChainError> {
    let variable = turn
        .template
        .trim()
        .strip_prefix('{')
        .and_then(|rest| rest.strip_suffix('}'))
        .ok_or_else(|| {
            ChainError::Spec(format!(
                "placeholder turn must name one variable, got '{}'",
                turn.template
            ))
        })?;

    let Some(Value::Array(entries)) = inputs.get(variable) else {
        return Err(ChainError::Input(format!(
            "conversation variable '{variable}' is missing or not an array"
        )));
    };

    let mut messages = Vec::with_capacity(entries.len());
    for entry in entries {
        let pair = entry.as_array().filter(|pair| pair.len() == 2);
        let (role, text) = match pair {
            Some(pair) => (pair[0].as_str(), pair[1].as_str()),
            None => (None, None),
        };
        let (Some(role), Some(text)) = (role, text) else {
            return Err(ChainError::Input(format!(
                "malformed conversation entry: {entry}"
            )));
        };
        messages.push(ChatMessage::new(wire_role(role), text));
    }
    Ok(messages)
}

/// Substitute `{name}` placeholders from the input object. `{{` and `}}`
/// escape literal braces.
pub fn render_template(template: &str, inputs: &Value) -> Result<String, ChainError> {
    let mut rendered = String::with_capacity(template.len());
    let mut chars = template.chars().peekable();

    while let Some(ch) = chars.next() {
        match ch {
            '{' if chars.peek() == Some(&'{') => {
                chars.next();
                rendered.push('{');
            }
            '}' if chars.peek() == Some(&'}') => {
                chars.next();
                rendered.push('}');
            }
            '{' => {
                let mut name = String::new();
                loop {
                    match chars.next() {
                        Some('}') => break,
                        Some(ch) => name.push(ch),
                        None => {
                            return Err(ChainError::Spec(format!(
                                "unterminated placeholder in template: {{{name}"
                            )));
                        }
                    }
                }
                let value = inputs.get(&name).ok_or_else(|| {
                    ChainError::Input(format!("missing prompt variable '{name}'"))
                })?;
                match value {
                    Value::String(text) => rendered.push_str(text),
                    other => rendered.push_str(&other.to_string()),
                }
            }
            '}' => {
                return Err(ChainError::Spec(
                    "unmatched '}' in template".to_string(),
                ));
            }
            other => rendered.push(other),
        }
    }
    Ok(rendered)
}
