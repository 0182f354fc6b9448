use crate::errors::LlmError;
use crate::types::{CompletionRequest, CompletionResponse, StreamDelta};
use async_trait::async_trait;
use futures::stream::{self, Stream};
use std::collections::VecDeque;
use std::pin::Pin;
use std::sync::Mutex;

pub type DeltaStream = Pin<Box<dyn Stream<Item = Result<StreamDelta, LlmError>> + Send>>;

/// Provider adapter contract.
#[async_trait]
pub trait ModelProvider: Send + Sync {
    fn name(&self) -> &str;

    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError>;

    async fn stream(&self, request: CompletionRequest) -> Result<DeltaStream, LlmError>;
}

#[derive(Default)]
struct Script {
    responses: VecDeque<CompletionResponse>,
    streams: VecDeque<Vec<StreamDelta>>,
    requests: Vec<CompletionRequest>,
}

/// Provider that replays scripted responses, for tests and offline runs.
///
/// `complete` pops from the response script, `stream` from the delta script;
/// an exhausted script is a configuration error. Every received request is
/// recorded for assertions.
#[derive(Default)]
pub struct ScriptedProvider {
    script: Mutex<Script>,
}

impl ScriptedProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_response(&self, response: CompletionResponse) {
        let mut script = self.script.lock().expect("script mutex poisoned");
        script.responses.push_back(response);
    }

    pub fn push_stream(&self, deltas: Vec<StreamDelta>) {
        let mut script = self.script.lock().expect("script mutex poisoned");
        script.streams.push_back(deltas);
    }

    pub fn requests(&self) -> Vec<CompletionRequest> {
        let script = self.script.lock().expect("script mutex poisoned");
        script.requests.clone()
    }
}

#[async_trait]
impl ModelProvider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        let mut script = self.script.lock().expect("script mutex poisoned");
        script.requests.push(request);
        script
            .responses
            .pop_front()
            .ok_or_else(|| LlmError::Configuration("scripted responses exhausted".to_string()))
    }

    async fn stream(&self, request: CompletionRequest) -> Result<DeltaStream, LlmError> {
        let mut script = self.script.lock().expect("script mutex poisoned");
        script.requests.push(request);
        let deltas = script
            .streams
            .pop_front()
            .ok_or_else(|| LlmError::Configuration("scripted streams exhausted".to_string()))?;
        Ok(Box::pin(stream::iter(deltas.into_iter().map(Ok))))
    }
}
