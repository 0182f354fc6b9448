use crate::errors::ChainError;
use crate::output;
use crate::prompt;
use crate::spec::{ChainSpec, OutputSpec};
use plait_llm::{ChatClient, CompletionRequest, CompletionResponse};
use serde_json::Value;
use std::sync::Arc;

/// One executable `[Prompt] -> [LLM] -> [Output Parser]` pipeline.
pub struct Chain {
    spec: ChainSpec,
    client: Arc<ChatClient>,
}

/// Result of one synchronous chain invocation: the raw model response plus
/// the parsed output value.
#[derive(Debug)]
pub struct ChainOutcome {
    pub response: CompletionResponse,
    pub output: Value,
}

impl Chain {
    pub fn new(spec: ChainSpec, client: Arc<ChatClient>) -> Self {
        Self { spec, client }
    }

    pub fn from_value(data: &Value, client: Arc<ChatClient>) -> Result<Self, ChainError> {
        Ok(Self::new(ChainSpec::from_value(data)?, client))
    }

    pub fn spec(&self) -> &ChainSpec {
        &self.spec
    }

    pub fn client(&self) -> Arc<ChatClient> {
        self.client.clone()
    }

    pub fn to_value(&self) -> Value {
        self.spec.to_value()
    }

    fn request(&self, inputs: &Value) -> Result<CompletionRequest, ChainError> {
        let messages = prompt::render(&self.spec.prompt, inputs)?;
        let llm = &self.spec.llm;
        let mut request = CompletionRequest::new(llm.model.clone(), messages);
        request.temperature = Some(llm.temperature);
        request.top_p = llm.top_p;
        request.max_tokens = llm.max_tokens;
        if llm.n != 1 {
            request.n = Some(llm.n);
        }
        Ok(request)
    }

    pub fn invoke(&self, inputs: &Value) -> Result<ChainOutcome, ChainError> {
        let response = self.client.complete(self.request(inputs)?)?;
        let output = output::parse(self.spec.output, &response.content)?;
        Ok(ChainOutcome { response, output })
    }

    /// Start a streaming invocation.
    ///
    /// String output streams text chunks as they arrive. JSON output cannot
    /// be parsed incrementally, so the stream is drained first and the parsed
    /// document yielded as a single item.
    pub fn stream(&self, inputs: &Value) -> Result<ChainStream, ChainError> {
        let deltas = self.client.stream(self.request(inputs)?)?;
        match self.spec.output {
            OutputSpec::String => Ok(ChainStream::Text(Box::new(deltas))),
            OutputSpec::Json => {
                let mut content = String::new();
                for delta in deltas {
                    content.push_str(&delta?.content);
                }
                let parsed = output::parse(OutputSpec::Json, &content)?;
                Ok(ChainStream::Json(Some(parsed)))
            }
        }
    }

    /// Run one invocation per input object; output order matches input order.
    pub fn batch(&self, inputs: &[Value]) -> Result<Vec<ChainOutcome>, ChainError> {
        inputs.iter().map(|input| self.invoke(input)).collect()
    }
}

/// Iterator over the chunks of one streaming chain invocation.
pub enum ChainStream {
    Text(Box<dyn Iterator<Item = Result<plait_llm::StreamDelta, plait_llm::LlmError>> + Send>),
    Json(Option<Value>),
}

impl Iterator for ChainStream {
    type Item = Result<Value, ChainError>;

    fn next(&mut self) -> Option<Self::Item> {
        match self {
            // Finish-only deltas carry no text and are dropped.
            Self::Text(deltas) => loop {
                match deltas.next()? {
                    Ok(delta) if delta.content.is_empty() => continue,
                    Ok(delta) => return Some(Ok(Value::String(delta.content))),
                    Err(err) => return Some(Err(ChainError::Llm(err))),
                }
            },
            Self::Json(parsed) => parsed.take().map(Ok),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use plait_llm::{ScriptedProvider, StreamDelta};
    use serde_json::json;

    fn scripted_chain(document: Value) -> (Chain, Arc<ScriptedProvider>) {
        let provider = Arc::new(ScriptedProvider::new());
        let client =
            Arc::new(ChatClient::new(provider.clone()).expect("client should build"));
        let chain = Chain::from_value(&document, client).expect("chain spec should parse");
        (chain, provider)
    }

    fn text_document() -> Value {
        json!({
            "text": "Translate: {phrase}",
            "llm": { "model": "gpt-4o-mini", "temperature": 0.2, "max_tokens": 50 },
            "output": { "type": "string" },
        })
    }

    #[test]
    fn invoke_renders_the_prompt_and_applies_model_knobs() {
        let (chain, provider) = scripted_chain(text_document());
        provider.push_response(CompletionResponse::text("Bonjour", "gpt-4o-mini"));

        let outcome = chain
            .invoke(&json!({"phrase": "Hello"}))
            .expect("invoke should succeed");
        assert_eq!(outcome.output, json!("Bonjour"));
        assert_eq!(outcome.response.content, "Bonjour");

        let requests = provider.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].model, "gpt-4o-mini");
        assert_eq!(requests[0].temperature, Some(0.2));
        assert_eq!(requests[0].max_tokens, Some(50));
        assert_eq!(requests[0].messages[0].content, "Translate: Hello");
    }

    #[test]
    fn json_output_is_parsed_from_the_response() {
        let (chain, provider) = scripted_chain(json!({
            "text": "Rate: {item}",
            "llm": {},
            "output": { "type": "json" },
        }));
        provider.push_response(CompletionResponse::text(
            r#"{"rating": 5}"#,
            "gpt-3.5-turbo",
        ));

        let outcome = chain
            .invoke(&json!({"item": "apples"}))
            .expect("invoke should succeed");
        assert_eq!(outcome.output["rating"], 5);
    }

    #[test]
    fn text_stream_yields_content_chunks_and_skips_finish_markers() {
        let (chain, provider) = scripted_chain(text_document());
        provider.push_stream(vec![
            StreamDelta::content("Bon"),
            StreamDelta::content("jour"),
            StreamDelta::finish("stop"),
        ]);

        let chunks: Vec<Value> = chain
            .stream(&json!({"phrase": "Hello"}))
            .expect("stream should start")
            .collect::<Result<Vec<_>, _>>()
            .expect("chunks should be ok");
        assert_eq!(chunks, vec![json!("Bon"), json!("jour")]);
    }

    #[test]
    fn json_stream_drains_and_yields_one_parsed_document() {
        let (chain, provider) = scripted_chain(json!({
            "text": "Rate: {item}",
            "llm": {},
            "output": { "type": "json" },
        }));
        provider.push_stream(vec![
            StreamDelta::content("{\"rating\""),
            StreamDelta::content(": 5}"),
            StreamDelta::finish("stop"),
        ]);

        let chunks: Vec<Value> = chain
            .stream(&json!({"item": "apples"}))
            .expect("stream should start")
            .collect::<Result<Vec<_>, _>>()
            .expect("chunks should be ok");
        assert_eq!(chunks, vec![json!({"rating": 5})]);
    }

    #[test]
    fn batch_preserves_input_order() {
        let (chain, provider) = scripted_chain(text_document());
        provider.push_response(CompletionResponse::text("one", "gpt-4o-mini"));
        provider.push_response(CompletionResponse::text("two", "gpt-4o-mini"));

        let outcomes = chain
            .batch(&[json!({"phrase": "1"}), json!({"phrase": "2"})])
            .expect("batch should succeed");
        let outputs: Vec<&Value> = outcomes.iter().map(|o| &o.output).collect();
        assert_eq!(outputs, vec![&json!("one"), &json!("two")]);
    }

    #[test]
    fn missing_prompt_variable_fails_before_the_provider_is_called() {
        let (chain, provider) = scripted_chain(text_document());
        let error = chain.invoke(&json!({})).expect_err("missing variable");
        assert!(matches!(error, ChainError::Input(_)));
        assert!(provider.requests().is_empty());
    }
}
