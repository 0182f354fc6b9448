//! Declarative LLM chain: the leaf executable collaborator for plait trees.
//!
//! A chain is specified as a document — prompt, model knobs, output parser —
//! and executes as `[Prompt] -> [LLM] -> [Output Parser]`.
//! [`module::ChainModule`] wraps a chain as a composable tree leaf with
//! streaming, batch, and persistence support.

pub mod chain;
pub mod errors;
pub mod module;
pub mod output;
pub mod prompt;
pub mod spec;

pub use chain::{Chain, ChainOutcome, ChainStream};
pub use errors::ChainError;
pub use module::ChainModule;
pub use spec::{ChainSpec, ChatTurn, LlmSpec, OutputSpec, PromptSpec};
