use crate::error::ModuleError;
use crate::node::{ModuleNode, NodeId};
use crate::persist;
use plait_trace::{TraceOptions, TraceSink, build_sink};
use serde_json::{Map, Value};
use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;

/// Finite, consume-once sequence of partial outputs from the designated leaf.
pub type OutputStream = Box<dyn Iterator<Item = Result<Value, ModuleError>> + Send>;

/// Result of one dispatch: a materialized value, or a stream of partial
/// values when the dispatched module is the tree's designated streaming leaf
/// (or a composite whose business logic returned such a stream unchanged).
pub enum Output {
    Value(Value),
    Stream(OutputStream),
}

impl Output {
    pub fn is_stream(&self) -> bool {
        matches!(self, Self::Stream(_))
    }

    pub fn into_value(self) -> Result<Value, ModuleError> {
        match self {
            Self::Value(value) => Ok(value),
            Self::Stream(_) => Err(ModuleError::Configuration(
                "expected a materialized value, found a stream".to_string(),
            )),
        }
    }

    pub fn into_stream(self) -> OutputStream {
        match self {
            Self::Stream(stream) => stream,
            Self::Value(value) => Box::new(std::iter::once(Ok(value))),
        }
    }
}

impl From<Value> for Output {
    fn from(value: Value) -> Self {
        Self::Value(value)
    }
}

/// Per-dispatch state threaded through the tree.
///
/// Carries the requested execution mode, the identity of the designated
/// streaming leaf, and the trace sink built for the module being dispatched.
/// Business logic receives the context in `forward` and re-enters dispatch
/// through [`Module::invoke_child`], so flags and observers stay in effect
/// for descendants without being forwarded by hand.
pub struct CallContext {
    streaming: bool,
    designated: Option<NodeId>,
    sink: Option<Arc<dyn TraceSink>>,
}

impl CallContext {
    fn root(streaming: bool, designated: Option<NodeId>) -> Self {
        Self {
            streaming,
            designated,
            sink: None,
        }
    }

    pub fn is_streaming(&self) -> bool {
        self.streaming
    }

    /// Whether `node` is the tree's designated streaming leaf.
    pub fn is_designated(&self, node: &ModuleNode) -> bool {
        self.designated == Some(node.id())
    }

    /// Sink built for the module currently being dispatched, if its subtree
    /// has a trace backend configured.
    pub fn sink(&self) -> Option<&Arc<dyn TraceSink>> {
        self.sink.as_ref()
    }
}

/// A unit of computation in a pipeline tree: a leaf wrapping an executable
/// collaborator, or a composite orchestrating children.
///
/// Implementations provide [`Module::node`] (registry storage),
/// [`Module::type_name`], and override `forward` with their business logic.
/// Composites invoke children through [`Module::invoke_child`] so each
/// nested call goes through the same dispatch machinery.
pub trait Module: Send + Sync {
    /// Registry and flag storage for this module.
    fn node(&self) -> &ModuleNode;

    /// Concrete type name, used as the display name when the module is
    /// dispatched without a parent-assigned edge name.
    fn type_name(&self) -> &'static str;

    /// Business logic. A module that never overrides this fails at call time
    /// rather than returning a default.
    fn forward(&self, input: Value, ctx: &CallContext) -> Result<Output, ModuleError> {
        let _ = (input, ctx);
        Err(ModuleError::ForwardNotImplemented(
            self.type_name().to_string(),
        ))
    }

    /// Streaming business logic, invoked only when this module is the
    /// designated leaf of a streaming dispatch. The default runs `forward`
    /// and yields its value once.
    fn forward_stream(&self, input: Value, ctx: &CallContext) -> Result<OutputStream, ModuleError> {
        let value = self.forward(input, ctx)?.into_value()?;
        Ok(Box::new(std::iter::once(Ok(value))))
    }

    /// Batch business logic over independent records. The default maps
    /// `forward` over the records in order.
    fn forward_batch(
        &self,
        inputs: Vec<Value>,
        ctx: &CallContext,
    ) -> Result<Vec<Value>, ModuleError> {
        inputs
            .into_iter()
            .map(|input| self.forward(input, ctx).and_then(Output::into_value))
            .collect()
    }

    /// Persisted form of this module. Empty by default: a module opts into
    /// persistence by overriding this together with [`Module::restore`].
    fn snapshot(&self) -> Map<String, Value> {
        Map::new()
    }

    /// Build a fresh instance of this concrete type from a saved snapshot.
    fn restore(&self, data: &Value) -> Result<Arc<dyn Module>, ModuleError> {
        let _ = data;
        Err(ModuleError::Configuration(format!(
            "module '{}' does not support restore",
            self.type_name()
        )))
    }

    /// Single-record synchronous dispatch.
    fn call(&self, input: Value) -> Result<Value, ModuleError> {
        dispatch(self, None, input, &CallContext::root(false, None))?.into_value()
    }

    /// Streaming dispatch. The first streaming call on a tree propagates the
    /// streaming flag and designates the streaming leaf; later calls reuse
    /// the designation. The result is a stream only when the designated leaf
    /// produced one.
    fn call_streaming(&self, input: Value) -> Result<Output, ModuleError> {
        let designated = ensure_designation(self);
        dispatch(self, None, input, &CallContext::root(true, Some(designated)))
    }

    /// Batch dispatch over an ordered sequence of independent records.
    /// Outputs preserve input order, one output per input.
    fn call_batch(&self, inputs: Vec<Value>) -> Result<Vec<Value>, ModuleError> {
        dispatch_batch(self, None, inputs, &CallContext::root(false, None))
    }

    /// Dispatch the child registered under `name`, re-entering the dispatch
    /// machinery so flags and observers apply transitively.
    fn invoke_child(&self, name: &str, input: Value, ctx: &CallContext) -> Result<Output, ModuleError> {
        let child = self.node().child(name)?;
        dispatch(&*child, Some(name), input, ctx)
    }

    /// Set the streaming flag on this module and every descendant.
    /// Pre-order, last-writer-wins, idempotent.
    fn set_streaming(&self, streaming: bool) {
        self.node().set_streaming_flag(streaming);
        propagate_from(self, &|node| node.set_streaming_flag(streaming));
    }

    /// Set the trace backend for this module and every descendant. The
    /// identifier is validated when a sink is built at dispatch time.
    fn set_trace(&self, backend: &str) {
        let backend = backend.to_string();
        self.node().set_trace_backend_flag(Some(backend.clone()));
        propagate_from(self, &|node| {
            node.set_trace_backend_flag(Some(backend.clone()))
        });
    }

    /// Serialize parameter values and child snapshots to a JSON file.
    fn save(&self, path: &Path) -> Result<(), ModuleError> {
        persist::save(self, path)
    }

    /// Restore parameter values and child specifications from a JSON file.
    /// Tree shape is defined by code: saved entries with no matching child
    /// are ignored, children without a saved entry are left untouched.
    fn load(&self, path: &Path) -> Result<(), ModuleError> {
        persist::load(self, path)
    }
}

fn build_node_sink(
    node: &ModuleNode,
    display_name: &str,
) -> Result<Option<Arc<dyn TraceSink>>, ModuleError> {
    match node.trace_backend() {
        Some(backend) => {
            let sink = build_sink(&backend, &TraceOptions::for_module(display_name))?;
            Ok(Some(sink))
        }
        None => Ok(None),
    }
}

fn dispatch<M: Module + ?Sized>(
    module: &M,
    edge_name: Option<&str>,
    input: Value,
    parent: &CallContext,
) -> Result<Output, ModuleError> {
    let node = module.node();
    let display_name = edge_name.unwrap_or_else(|| module.type_name());
    let ctx = CallContext {
        streaming: parent.streaming,
        designated: parent.designated,
        sink: build_node_sink(node, display_name)?,
    };

    if let Some(sink) = &ctx.sink {
        sink.on_chain_start(display_name, &input);
    }

    let output = if ctx.streaming && ctx.is_designated(node) {
        Output::Stream(module.forward_stream(input, &ctx)?)
    } else {
        module.forward(input, &ctx)?
    };

    if let Some(sink) = &ctx.sink {
        match &output {
            Output::Value(value) => sink.on_chain_end(value),
            Output::Stream(_) => sink.on_chain_end(&Value::String("<streaming>".to_string())),
        }
    }
    Ok(output)
}

fn dispatch_batch<M: Module + ?Sized>(
    module: &M,
    edge_name: Option<&str>,
    inputs: Vec<Value>,
    parent: &CallContext,
) -> Result<Vec<Value>, ModuleError> {
    let node = module.node();
    let display_name = edge_name.unwrap_or_else(|| module.type_name());
    let ctx = CallContext {
        streaming: parent.streaming,
        designated: parent.designated,
        sink: build_node_sink(node, display_name)?,
    };

    if let Some(sink) = &ctx.sink {
        sink.on_chain_start(display_name, &Value::Array(inputs.clone()));
    }
    let outputs = module.forward_batch(inputs, &ctx)?;
    if let Some(sink) = &ctx.sink {
        sink.on_chain_end(&Value::Array(outputs.clone()));
    }
    Ok(outputs)
}

/// Designate the streaming leaf for the tree rooted at `root`, once.
///
/// Propagates the streaming flag tree-wide, then descends by following the
/// last-registered child at each level until a childless module. A childless
/// root designates itself. The result is cached at the root, so designation
/// runs at most once per tree instance.
fn ensure_designation<M: Module + ?Sized>(root: &M) -> NodeId {
    if let Some(designated) = root.node().designated() {
        return designated;
    }

    root.set_streaming(true);

    let mut designated = root.node().id();
    let mut level = root.node().children();
    while let Some(last) = level.last().cloned() {
        designated = last.node().id();
        level = last.node().children();
    }

    root.node().set_designated(designated);
    designated
}

/// Apply `apply` to every proper descendant of `root`, pre-order, with a
/// visited set scoped to this one call. Shared instances are applied once;
/// true cycles cannot occur because attachment rejects them.
fn propagate_from<M: Module + ?Sized>(root: &M, apply: &dyn Fn(&ModuleNode)) {
    let mut visited: HashSet<NodeId> = HashSet::from([root.node().id()]);
    let mut stack = root.node().children();
    stack.reverse();
    while let Some(module) = stack.pop() {
        if !visited.insert(module.node().id()) {
            continue;
        }
        apply(module.node());
        let mut children = module.node().children();
        children.reverse();
        stack.append(&mut children);
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;

    /// Leaf that echoes its input, tagged with a label.
    pub(crate) struct Passthrough {
        node: ModuleNode,
        label: &'static str,
    }

    impl Passthrough {
        pub(crate) fn shared(label: &'static str) -> Arc<dyn Module> {
            Arc::new(Self {
                node: ModuleNode::new(),
                label,
            })
        }
    }

    impl Module for Passthrough {
        fn node(&self) -> &ModuleNode {
            &self.node
        }

        fn type_name(&self) -> &'static str {
            "Passthrough"
        }

        fn forward(&self, input: Value, _ctx: &CallContext) -> Result<Output, ModuleError> {
            Ok(serde_json::json!({ "label": self.label, "input": input }).into())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::Passthrough;
    use super::*;
    use serde_json::json;

    struct Bare {
        node: ModuleNode,
    }

    impl Module for Bare {
        fn node(&self) -> &ModuleNode {
            &self.node
        }

        fn type_name(&self) -> &'static str {
            "Bare"
        }
    }

    fn composite(children: &[(&str, Arc<dyn Module>)]) -> Arc<dyn Module> {
        struct Composite {
            node: ModuleNode,
        }
        impl Module for Composite {
            fn node(&self) -> &ModuleNode {
                &self.node
            }
            fn type_name(&self) -> &'static str {
                "Composite"
            }
            fn forward(&self, input: Value, ctx: &CallContext) -> Result<Output, ModuleError> {
                let mut current = input;
                let entries = self.node().child_entries();
                let last = entries.len().saturating_sub(1);
                for (index, (name, _)) in entries.iter().enumerate() {
                    let output = self.invoke_child(name, current, ctx)?;
                    if index == last {
                        return Ok(output);
                    }
                    current = output.into_value()?;
                }
                Ok(current.into())
            }
        }

        let module = Composite {
            node: ModuleNode::new(),
        };
        for (name, child) in children {
            module
                .node()
                .attach_child(*name, child.clone())
                .expect("attach should succeed");
        }
        Arc::new(module)
    }

    #[test]
    fn unoverridden_forward_fails_with_abstract_method_error() {
        let bare = Bare {
            node: ModuleNode::new(),
        };
        let error = bare.call(json!({})).expect_err("bare forward must fail");
        assert!(matches!(
            error,
            ModuleError::ForwardNotImplemented(name) if name == "Bare"
        ));
    }

    #[test]
    fn designation_follows_last_registered_child_to_a_leaf() {
        let leaf_a = Passthrough::shared("a");
        let leaf_b = Passthrough::shared("b");
        let inner = composite(&[("a", leaf_a.clone()), ("b", leaf_b.clone())]);
        let root = composite(&[("first", Passthrough::shared("x")), ("inner", inner.clone())]);

        let designated = ensure_designation(&*root);
        assert_eq!(designated, leaf_b.node().id());
        assert_ne!(designated, leaf_a.node().id());
        assert_ne!(designated, inner.node().id());
    }

    #[test]
    fn designation_is_memoized_per_tree() {
        let leaf = Passthrough::shared("only");
        let root = composite(&[("only", leaf.clone())]);

        let first = ensure_designation(&*root);
        // Attaching afterwards is unsupported during execution, but the cache
        // must hold regardless.
        root.node()
            .attach_child("late", Passthrough::shared("late"))
            .expect("attach should succeed");
        let second = ensure_designation(&*root);
        assert_eq!(first, second);
        assert_eq!(first, leaf.node().id());
    }

    #[test]
    fn childless_root_designates_itself() {
        let bare = Bare {
            node: ModuleNode::new(),
        };
        let designated = ensure_designation(&bare);
        assert_eq!(designated, bare.node().id());
    }

    #[test]
    fn streaming_flag_propagates_to_every_descendant() {
        let leaf = Passthrough::shared("leaf");
        let inner = composite(&[("leaf", leaf.clone())]);
        let root = composite(&[("inner", inner.clone())]);

        root.set_streaming(true);
        assert!(root.node().streaming());
        assert!(inner.node().streaming());
        assert!(leaf.node().streaming());

        root.set_streaming(false);
        assert!(!leaf.node().streaming());
    }

    #[test]
    fn batch_preserves_input_order() {
        let root = composite(&[("echo", Passthrough::shared("echo"))]);
        let outputs = root
            .call_batch(vec![json!(1), json!(2), json!(3)])
            .expect("batch should succeed");
        assert_eq!(outputs.len(), 3);
        for (index, output) in outputs.iter().enumerate() {
            assert_eq!(output["input"], json!(index as i64 + 1));
        }
    }

    #[test]
    fn sync_call_through_composite_materializes_a_value() {
        let root = composite(&[
            ("first", Passthrough::shared("first")),
            ("second", Passthrough::shared("second")),
        ]);
        let output = root.call(json!("in")).expect("call should succeed");
        assert_eq!(output["label"], json!("second"));
        assert_eq!(output["input"]["label"], json!("first"));
    }

    #[test]
    fn streaming_call_streams_only_from_the_designated_leaf() {
        let root = composite(&[
            ("first", Passthrough::shared("first")),
            ("second", Passthrough::shared("second")),
        ]);
        let output = root
            .call_streaming(json!("in"))
            .expect("streaming call should succeed");
        assert!(output.is_stream());

        let chunks: Vec<Value> = output
            .into_stream()
            .collect::<Result<Vec<_>, _>>()
            .expect("stream should yield values");
        // Default forward_stream yields the forward value once; the first
        // child executed synchronously despite the tree-wide flag.
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0]["label"], json!("second"));
        assert_eq!(chunks[0]["input"]["label"], json!("first"));
    }
}
