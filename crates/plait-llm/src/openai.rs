use crate::errors::LlmError;
use crate::provider::{DeltaStream, ModelProvider};
use crate::sse::SseDecoder;
use crate::types::{CompletionRequest, CompletionResponse, StreamDelta, TokenUsage};
use async_trait::async_trait;
use futures::StreamExt;
use futures::stream::{self, BoxStream};
use serde::Deserialize;
use serde_json::Value;
use std::collections::VecDeque;

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Adapter for OpenAI-compatible chat-completions endpoints.
pub struct OpenAiProvider {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl OpenAiProvider {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: api_key.into(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Build from `OPENAI_API_KEY` (and optionally `OPENAI_BASE_URL`).
    pub fn from_env() -> Option<Self> {
        let api_key = std::env::var("OPENAI_API_KEY").ok()?;
        let mut provider = Self::new(api_key);
        if let Ok(base_url) = std::env::var("OPENAI_BASE_URL") {
            provider.base_url = base_url;
        }
        Some(provider)
    }

    fn body(&self, request: &CompletionRequest, streaming: bool) -> Result<Value, LlmError> {
        let mut body = serde_json::to_value(request)
            .map_err(|err| LlmError::Decode(format!("encode request failed: {err}")))?;
        if streaming {
            body["stream"] = Value::Bool(true);
        }
        Ok(body)
    }

    async fn post(&self, body: &Value) -> Result<reqwest::Response, LlmError> {
        let response = self
            .http
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(body)
            .send()
            .await
            .map_err(|err| LlmError::Http(err.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(LlmError::Api {
                status: status.as_u16(),
                message,
            });
        }
        Ok(response)
    }
}

#[derive(Deserialize)]
struct WireMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct WireChoice {
    message: Option<WireMessage>,
    delta: Option<WireMessage>,
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct WireUsage {
    prompt_tokens: u64,
    completion_tokens: u64,
    total_tokens: u64,
}

#[derive(Deserialize)]
struct WireResponse {
    model: Option<String>,
    choices: Vec<WireChoice>,
    usage: Option<WireUsage>,
}

fn parse_delta(payload: &str) -> Result<Option<StreamDelta>, LlmError> {
    let chunk: WireResponse = serde_json::from_str(payload)
        .map_err(|err| LlmError::Decode(format!("decode stream chunk failed: {err}")))?;
    let Some(choice) = chunk.choices.into_iter().next() else {
        return Ok(None);
    };
    let content = choice
        .delta
        .and_then(|delta| delta.content)
        .unwrap_or_default();
    if content.is_empty() && choice.finish_reason.is_none() {
        return Ok(None);
    }
    Ok(Some(StreamDelta {
        content,
        finish_reason: choice.finish_reason,
    }))
}

struct StreamState {
    bytes: BoxStream<'static, reqwest::Result<bytes::Bytes>>,
    decoder: SseDecoder,
    pending: VecDeque<String>,
    done: bool,
}

#[async_trait]
impl ModelProvider for OpenAiProvider {
    fn name(&self) -> &str {
        "openai"
    }

    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        let body = self.body(&request, false)?;
        let response = self.post(&body).await?;
        let wire: WireResponse = response
            .json()
            .await
            .map_err(|err| LlmError::Decode(format!("decode response failed: {err}")))?;

        let choice = wire
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| LlmError::Decode("response carried no choices".to_string()))?;
        let content = choice
            .message
            .and_then(|message| message.content)
            .unwrap_or_default();

        Ok(CompletionResponse {
            content,
            model: wire.model.unwrap_or(request.model),
            finish_reason: choice.finish_reason,
            usage: wire.usage.map(|usage| TokenUsage {
                input_tokens: usage.prompt_tokens,
                output_tokens: usage.completion_tokens,
                total_tokens: usage.total_tokens,
            }),
        })
    }

    async fn stream(&self, request: CompletionRequest) -> Result<DeltaStream, LlmError> {
        let body = self.body(&request, true)?;
        let response = self.post(&body).await?;

        let state = StreamState {
            bytes: response.bytes_stream().boxed(),
            decoder: SseDecoder::new(),
            pending: VecDeque::new(),
            done: false,
        };

        let deltas = stream::unfold(state, |mut state| async move {
            loop {
                if let Some(payload) = state.pending.pop_front() {
                    if payload == "[DONE]" {
                        state.done = true;
                        state.pending.clear();
                        return None;
                    }
                    match parse_delta(&payload) {
                        Ok(Some(delta)) => return Some((Ok(delta), state)),
                        Ok(None) => continue,
                        Err(err) => {
                            state.done = true;
                            return Some((Err(err), state));
                        }
                    }
                }
                if state.done {
                    return None;
                }
                match state.bytes.next().await {
                    Some(Ok(chunk)) => {
                        let text = String::from_utf8_lossy(&chunk).into_owned();
                        state.pending.extend(state.decoder.feed(&text));
                    }
                    Some(Err(err)) => {
                        state.done = true;
                        return Some((Err(LlmError::Stream(err.to_string())), state));
                    }
                    None => return None,
                }
            }
        });

        Ok(Box::pin(deltas))
    }
}
