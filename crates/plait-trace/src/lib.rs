//! Trace sinks for plait module dispatch.
//!
//! A sink observes one dispatch: it is built per call from the module's
//! configured backend identifier and receives synchronous lifecycle hooks
//! bracketing the business logic, plus model-call and free-text events
//! reported by leaf modules.

pub mod builder;
pub mod console;
pub mod sink;

pub use builder::{CONSOLE_BACKEND, SinkFactory, TraceError, build_sink, register_backend};
pub use console::ConsoleSink;
pub use sink::{BufferedSink, SinkEvent, TraceOptions, TraceSink};
