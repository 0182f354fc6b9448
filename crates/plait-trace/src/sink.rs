use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::{Arc, Mutex};

/// Identity passed to a backend factory when a sink is built for one dispatch.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TraceOptions {
    pub module_name: Option<String>,
    pub tags: Vec<String>,
    pub session_id: Option<String>,
    pub user_id: Option<String>,
}

impl TraceOptions {
    pub fn for_module(module_name: impl Into<String>) -> Self {
        Self {
            module_name: Some(module_name.into()),
            ..Self::default()
        }
    }
}

/// Observer contract for one dispatch.
///
/// `on_chain_start`/`on_chain_end` bracket the module's business logic.
/// `on_model_end` is reported by leaf modules after the underlying model
/// call completes. The agent hooks only fire when a sink wraps an agentic
/// collaborator; tree dispatch itself never emits them.
pub trait TraceSink: Send + Sync {
    fn on_chain_start(&self, module_name: &str, inputs: &Value);

    fn on_chain_end(&self, outputs: &Value);

    fn on_model_end(&self, result: &Value);

    fn on_text(&self, _text: &str) {}

    fn on_agent_action(&self, _log: &str) {}

    fn on_agent_finish(&self, _log: &str) {}
}

/// One recorded hook invocation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum SinkEvent {
    ChainStart { module_name: String, inputs: Value },
    ChainEnd { outputs: Value },
    ModelEnd { result: Value },
    Text { text: String },
    AgentAction { log: String },
    AgentFinish { log: String },
}

/// Sink that records every hook invocation, for assertions in tests.
#[derive(Clone, Default)]
pub struct BufferedSink {
    inner: Arc<Mutex<Vec<SinkEvent>>>,
}

impl BufferedSink {
    pub fn snapshot(&self) -> Vec<SinkEvent> {
        let guard = self.inner.lock().expect("buffered sink mutex poisoned");
        guard.clone()
    }

    fn record(&self, event: SinkEvent) {
        let mut guard = self.inner.lock().expect("buffered sink mutex poisoned");
        guard.push(event);
    }
}

impl TraceSink for BufferedSink {
    fn on_chain_start(&self, module_name: &str, inputs: &Value) {
        self.record(SinkEvent::ChainStart {
            module_name: module_name.to_string(),
            inputs: inputs.clone(),
        });
    }

    fn on_chain_end(&self, outputs: &Value) {
        self.record(SinkEvent::ChainEnd {
            outputs: outputs.clone(),
        });
    }

    fn on_model_end(&self, result: &Value) {
        self.record(SinkEvent::ModelEnd {
            result: result.clone(),
        });
    }

    fn on_text(&self, text: &str) {
        self.record(SinkEvent::Text {
            text: text.to_string(),
        });
    }

    fn on_agent_action(&self, log: &str) {
        self.record(SinkEvent::AgentAction {
            log: log.to_string(),
        });
    }

    fn on_agent_finish(&self, log: &str) {
        self.record(SinkEvent::AgentFinish {
            log: log.to_string(),
        });
    }
}
