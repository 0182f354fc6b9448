use crate::console::ConsoleSink;
use crate::sink::{TraceOptions, TraceSink};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, OnceLock};

/// Backend identifier for the builtin stdout sink.
pub const CONSOLE_BACKEND: &str = "console";

#[derive(Debug, thiserror::Error)]
pub enum TraceError {
    #[error("trace backend '{0}' is not supported")]
    UnsupportedBackend(String),

    #[error("trace backend '{0}' failed to build: {1}")]
    Backend(String, String),
}

/// Factory for an externally provided trace backend.
pub trait SinkFactory: Send + Sync {
    fn backend_id(&self) -> &'static str;

    fn build(&self, options: &TraceOptions) -> Result<Arc<dyn TraceSink>, TraceError>;
}

static SINK_FACTORIES: OnceLock<Mutex<HashMap<&'static str, Arc<dyn SinkFactory>>>> =
    OnceLock::new();

fn factories() -> &'static Mutex<HashMap<&'static str, Arc<dyn SinkFactory>>> {
    SINK_FACTORIES.get_or_init(|| Mutex::new(HashMap::new()))
}

/// Register a factory for a non-builtin backend identifier.
///
/// Hosted observability integrations call this during initialization; the
/// identifier then becomes valid for `Module::set_trace`.
pub fn register_backend(factory: Arc<dyn SinkFactory>) {
    let mut registry = factories().lock().expect("sink factory registry poisoned");
    registry.insert(factory.backend_id(), factory);
}

/// Build the sink for one dispatch.
///
/// An unrecognized backend identifier is a configuration error, never a
/// silent no-op.
pub fn build_sink(backend: &str, options: &TraceOptions) -> Result<Arc<dyn TraceSink>, TraceError> {
    if backend == CONSOLE_BACKEND {
        return Ok(Arc::new(ConsoleSink::new(options)));
    }

    let factory = {
        let registry = factories().lock().expect("sink factory registry poisoned");
        registry.get(backend).cloned()
    };
    match factory {
        Some(factory) => factory.build(options),
        None => Err(TraceError::UnsupportedBackend(backend.to_string())),
    }
}
