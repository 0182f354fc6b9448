//! Model-client layer for plait chains.
//!
//! Providers implement an async adapter contract; [`client::ChatClient`]
//! bridges it to the synchronous dispatch contract of the composition core
//! by driving a current-thread runtime.

pub mod client;
pub mod errors;
pub mod openai;
pub mod provider;
pub mod sse;
pub mod types;

pub use client::{BlockingDeltas, ChatClient};
pub use errors::LlmError;
pub use openai::OpenAiProvider;
pub use provider::{DeltaStream, ModelProvider, ScriptedProvider};
pub use types::{ChatMessage, CompletionRequest, CompletionResponse, StreamDelta, TokenUsage};
