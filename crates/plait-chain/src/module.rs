use crate::chain::Chain;
use crate::errors::ChainError;
use plait_llm::ChatClient;
use plait_module::{CallContext, Module, ModuleError, ModuleNode, Output, OutputStream};
use serde_json::{Map, Value};
use std::sync::Arc;

/// A chain wrapped as a composable tree leaf.
///
/// Inputs are JSON objects of prompt variables. The chain specification is
/// the module's persisted form, so a saved tree can be reloaded with updated
/// prompts and model knobs without code changes.
pub struct ChainModule {
    node: ModuleNode,
    chain: Chain,
}

impl ChainModule {
    pub fn new(chain: Chain) -> Self {
        Self {
            node: ModuleNode::new(),
            chain,
        }
    }

    pub fn from_value(data: &Value, client: Arc<ChatClient>) -> Result<Self, ChainError> {
        Ok(Self::new(Chain::from_value(data, client)?))
    }

    pub fn shared(chain: Chain) -> Arc<dyn Module> {
        Arc::new(Self::new(chain))
    }

    pub fn chain(&self) -> &Chain {
        &self.chain
    }

    fn object_input(input: &Value) -> Result<(), ModuleError> {
        if input.is_object() {
            Ok(())
        } else {
            Err(ModuleError::Configuration(
                "chain input must be an object of prompt variables".to_string(),
            ))
        }
    }
}

impl Module for ChainModule {
    fn node(&self) -> &ModuleNode {
        &self.node
    }

    fn type_name(&self) -> &'static str {
        "ChainModule"
    }

    fn forward(&self, input: Value, ctx: &CallContext) -> Result<Output, ModuleError> {
        Self::object_input(&input)?;
        let outcome = self.chain.invoke(&input).map_err(ModuleError::external)?;
        if let Some(sink) = ctx.sink() {
            let result = serde_json::to_value(&outcome.response)
                .unwrap_or_else(|_| Value::String(outcome.response.content.clone()));
            sink.on_model_end(&result);
        }
        Ok(outcome.output.into())
    }

    fn forward_stream(&self, input: Value, _ctx: &CallContext) -> Result<OutputStream, ModuleError> {
        Self::object_input(&input)?;
        let stream = self.chain.stream(&input).map_err(ModuleError::external)?;
        Ok(Box::new(
            stream.map(|chunk| chunk.map_err(ModuleError::external)),
        ))
    }

    fn forward_batch(
        &self,
        inputs: Vec<Value>,
        _ctx: &CallContext,
    ) -> Result<Vec<Value>, ModuleError> {
        for input in &inputs {
            Self::object_input(input)?;
        }
        let outcomes = self.chain.batch(&inputs).map_err(ModuleError::external)?;
        Ok(outcomes.into_iter().map(|outcome| outcome.output).collect())
    }

    fn snapshot(&self) -> Map<String, Value> {
        match self.chain.to_value() {
            Value::Object(map) => map,
            _ => Map::new(),
        }
    }

    fn restore(&self, data: &Value) -> Result<Arc<dyn Module>, ModuleError> {
        let module =
            Self::from_value(data, self.chain.client()).map_err(ModuleError::external)?;
        Ok(Arc::new(module))
    }
}
