//! Composition core for multi-step AI pipelines.
//!
//! A pipeline is a rooted tree of named modules. Each module owns an ordered
//! registry of child modules and an ordered registry of scalar parameters.
//! Cross-cutting execution modes (streaming, tracing) are set once at the
//! root and propagated to every descendant; dispatch re-enters the same
//! machinery for every nested child call, so business logic never forwards
//! flags by hand. One leaf per tree — the one reached by following the
//! last-registered child at every level — is designated to stream partial
//! output to the caller.

pub mod error;
pub mod module;
pub mod node;
pub mod parameter;
pub mod persist;

pub use error::ModuleError;
pub use module::{CallContext, Module, Output, OutputStream};
pub use node::{Attachment, ModuleNode, NodeId};
pub use parameter::{Parameter, Scalar};
pub use persist::Snapshot;
