use crate::errors::LlmError;
use crate::provider::{DeltaStream, ModelProvider};
use crate::types::{CompletionRequest, CompletionResponse, StreamDelta};
use futures::StreamExt;
use std::sync::Arc;
use tokio::runtime::Runtime;

/// Synchronous facade over an async provider adapter.
///
/// The composition core dispatches synchronously; this client owns a
/// current-thread runtime and drives the provider's futures to completion on
/// the calling thread.
pub struct ChatClient {
    runtime: Arc<Runtime>,
    provider: Arc<dyn ModelProvider>,
}

impl ChatClient {
    pub fn new(provider: Arc<dyn ModelProvider>) -> Result<Self, LlmError> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|err| LlmError::Configuration(format!("runtime build failed: {err}")))?;
        Ok(Self {
            runtime: Arc::new(runtime),
            provider,
        })
    }

    pub fn provider_name(&self) -> String {
        self.provider.name().to_string()
    }

    pub fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        self.runtime.block_on(self.provider.complete(request))
    }

    /// Start a streaming completion; the returned iterator drives the
    /// underlying stream one delta at a time.
    pub fn stream(&self, request: CompletionRequest) -> Result<BlockingDeltas, LlmError> {
        let stream = self.runtime.block_on(self.provider.stream(request))?;
        Ok(BlockingDeltas {
            runtime: self.runtime.clone(),
            stream,
        })
    }

    /// Sequential batch of independent requests; output order matches input
    /// order, one response per request.
    pub fn batch(
        &self,
        requests: Vec<CompletionRequest>,
    ) -> Result<Vec<CompletionResponse>, LlmError> {
        requests
            .into_iter()
            .map(|request| self.complete(request))
            .collect()
    }
}

/// Blocking iterator over a provider delta stream.
pub struct BlockingDeltas {
    runtime: Arc<Runtime>,
    stream: DeltaStream,
}

impl Iterator for BlockingDeltas {
    type Item = Result<StreamDelta, LlmError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.runtime.block_on(self.stream.next())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::ScriptedProvider;
    use crate::types::ChatMessage;

    fn request(text: &str) -> CompletionRequest {
        CompletionRequest::new("test-model", vec![ChatMessage::user(text)])
    }

    #[test]
    fn complete_blocks_on_the_provider() {
        let provider = Arc::new(ScriptedProvider::new());
        provider.push_response(CompletionResponse::text("pong", "test-model"));

        let client = ChatClient::new(provider).expect("client should build");
        let response = client.complete(request("ping")).expect("completion");
        assert_eq!(response.content, "pong");
    }

    #[test]
    fn stream_yields_deltas_as_a_blocking_iterator() {
        let provider = Arc::new(ScriptedProvider::new());
        provider.push_stream(vec![
            StreamDelta::content("a"),
            StreamDelta::content("b"),
        ]);

        let client = ChatClient::new(provider).expect("client should build");
        let deltas: Vec<StreamDelta> = client
            .stream(request("go"))
            .expect("stream should start")
            .collect::<Result<Vec<_>, _>>()
            .expect("deltas should be ok");
        assert_eq!(deltas.len(), 2);
        assert_eq!(deltas[1].content, "b");
    }

    #[test]
    fn batch_preserves_request_order() {
        let provider = Arc::new(ScriptedProvider::new());
        provider.push_response(CompletionResponse::text("r1", "test-model"));
        provider.push_response(CompletionResponse::text("r2", "test-model"));
        provider.push_response(CompletionResponse::text("r3", "test-model"));

        let client = ChatClient::new(provider).expect("client should build");
        let responses = client
            .batch(vec![request("a"), request("b"), request("c")])
            .expect("batch should succeed");
        let contents: Vec<&str> = responses.iter().map(|r| r.content.as_str()).collect();
        assert_eq!(contents, vec!["r1", "r2", "r3"]);
    }
}
