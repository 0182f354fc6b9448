use crate::sink::{TraceOptions, TraceSink};
use serde_json::Value;

const BOLD: &str = "\x1b[1m";
const RESET: &str = "\x1b[0m";

/// Sink that prints dispatch lifecycle to stdout.
pub struct ConsoleSink {
    prefix: String,
}

impl ConsoleSink {
    pub fn new(options: &TraceOptions) -> Self {
        let mut prefix = String::new();
        if let Some(session_id) = &options.session_id {
            prefix.push_str(&format!("[session_id={session_id}] "));
        }
        if let Some(module_name) = &options.module_name {
            prefix.push_str(&format!("[module={module_name}] "));
        }
        Self { prefix }
    }
}

impl TraceSink for ConsoleSink {
    fn on_chain_start(&self, module_name: &str, inputs: &Value) {
        println!("\n{BOLD}> {}Entering new {module_name} chain...{RESET}", self.prefix);
        println!("inputs: {inputs}");
    }

    fn on_chain_end(&self, outputs: &Value) {
        println!("\n{BOLD}> {}Finished chain.{RESET}", self.prefix);
        println!("outputs: {outputs}");
    }

    fn on_model_end(&self, result: &Value) {
        println!("\n{BOLD}> {}Finished LLM.{RESET}", self.prefix);
        println!("{result}");
    }

    fn on_text(&self, text: &str) {
        print!("{text}");
    }

    fn on_agent_action(&self, log: &str) {
        println!("{log}");
    }

    fn on_agent_finish(&self, log: &str) {
        println!("{log}");
    }
}
