use crate::error::ModuleError;
use crate::module::Module;
use crate::parameter::Parameter;
use std::collections::HashSet;
use std::sync::{Arc, Mutex};

/// Identity of one module instance, keyed by the address of its node.
///
/// Stable for the lifetime of the module because every module owns exactly
/// one [`ModuleNode`] and is itself held behind an `Arc` once attached.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct NodeId(usize);

/// A slot resolved by name from a module's registries.
#[derive(Clone)]
pub enum Attachment {
    Parameter(Parameter),
    Child(Arc<dyn Module>),
}

impl std::fmt::Debug for Attachment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Attachment::Parameter(parameter) => {
                f.debug_tuple("Parameter").field(parameter).finish()
            }
            Attachment::Child(_) => f.debug_tuple("Child").finish(),
        }
    }
}

#[derive(Default)]
struct NodeState {
    children: Vec<(String, Arc<dyn Module>)>,
    parameters: Vec<(String, Parameter)>,
    streaming: bool,
    trace_backend: Option<String>,
    designated: Option<NodeId>,
}

/// Registry and flag state shared by every module implementation.
///
/// A name slot belongs to exactly one of the two registries: attaching a
/// value of the other kind under an existing name silently moves the slot.
/// That mirrors the attachment contract and is an aliasing hazard callers
/// should not rely on.
#[derive(Default)]
pub struct ModuleNode {
    state: Mutex<NodeState>,
}

impl ModuleNode {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn id(&self) -> NodeId {
        NodeId(self as *const Self as usize)
    }

    /// Attach a child module under `name`.
    ///
    /// Re-attaching under an existing name replaces the entry in place,
    /// keeping its registration position. Attachments that would place a
    /// module beneath itself are rejected.
    pub fn attach_child(
        &self,
        name: impl Into<String>,
        child: Arc<dyn Module>,
    ) -> Result<(), ModuleError> {
        let name = name.into();
        if self.id() == child.node().id() || subtree_ids(&child).contains(&self.id()) {
            return Err(ModuleError::Configuration(format!(
                "cannot attach '{name}': a module may not appear beneath itself"
            )));
        }

        let mut state = self.state.lock().expect("module node mutex poisoned");
        state.parameters.retain(|(slot, _)| slot != &name);
        if let Some(entry) = state.children.iter_mut().find(|(slot, _)| slot == &name) {
            entry.1 = child;
        } else {
            state.children.push((name, child));
        }
        Ok(())
    }

    /// Attach a parameter under `name`, evicting any child slot of that name.
    pub fn attach_parameter(&self, name: impl Into<String>, parameter: Parameter) {
        let name = name.into();
        let mut state = self.state.lock().expect("module node mutex poisoned");
        state.children.retain(|(slot, _)| slot != &name);
        if let Some(entry) = state.parameters.iter_mut().find(|(slot, _)| slot == &name) {
            entry.1 = parameter;
        } else {
            state.parameters.push((name, parameter));
        }
    }

    /// Resolve a name against both registries, parameters first.
    pub fn lookup(&self, name: &str) -> Result<Attachment, ModuleError> {
        let state = self.state.lock().expect("module node mutex poisoned");
        if let Some((_, parameter)) = state.parameters.iter().find(|(slot, _)| slot == name) {
            return Ok(Attachment::Parameter(parameter.clone()));
        }
        if let Some((_, child)) = state.children.iter().find(|(slot, _)| slot == name) {
            return Ok(Attachment::Child(child.clone()));
        }
        Err(ModuleError::AttributeNotFound(name.to_string()))
    }

    /// Resolve a name strictly as a child module.
    pub fn child(&self, name: &str) -> Result<Arc<dyn Module>, ModuleError> {
        let state = self.state.lock().expect("module node mutex poisoned");
        state
            .children
            .iter()
            .find(|(slot, _)| slot == name)
            .map(|(_, child)| child.clone())
            .ok_or_else(|| ModuleError::AttributeNotFound(name.to_string()))
    }

    /// Resolve a name strictly as a parameter.
    pub fn parameter(&self, name: &str) -> Result<Parameter, ModuleError> {
        let state = self.state.lock().expect("module node mutex poisoned");
        state
            .parameters
            .iter()
            .find(|(slot, _)| slot == name)
            .map(|(_, parameter)| parameter.clone())
            .ok_or_else(|| ModuleError::AttributeNotFound(name.to_string()))
    }

    /// Direct children in registration order.
    ///
    /// A module instance registered under several names at this level is
    /// yielded once. The deduplication is scoped to this one call; repeated
    /// sharing across levels or across calls is not deduplicated.
    pub fn children(&self) -> Vec<Arc<dyn Module>> {
        let state = self.state.lock().expect("module node mutex poisoned");
        let mut seen: HashSet<NodeId> = HashSet::new();
        let mut children = Vec::new();
        for (_, child) in &state.children {
            if seen.insert(child.node().id()) {
                children.push(child.clone());
            }
        }
        children
    }

    /// Child registry pairs in registration order, duplicates included.
    pub fn child_entries(&self) -> Vec<(String, Arc<dyn Module>)> {
        let state = self.state.lock().expect("module node mutex poisoned");
        state.children.clone()
    }

    /// Parameter registry pairs in registration order.
    pub fn parameter_entries(&self) -> Vec<(String, Parameter)> {
        let state = self.state.lock().expect("module node mutex poisoned");
        state.parameters.clone()
    }

    pub fn streaming(&self) -> bool {
        self.state.lock().expect("module node mutex poisoned").streaming
    }

    pub(crate) fn set_streaming_flag(&self, streaming: bool) {
        self.state.lock().expect("module node mutex poisoned").streaming = streaming;
    }

    pub fn trace_backend(&self) -> Option<String> {
        self.state
            .lock()
            .expect("module node mutex poisoned")
            .trace_backend
            .clone()
    }

    pub(crate) fn set_trace_backend_flag(&self, backend: Option<String>) {
        self.state
            .lock()
            .expect("module node mutex poisoned")
            .trace_backend = backend;
    }

    pub(crate) fn designated(&self) -> Option<NodeId> {
        self.state.lock().expect("module node mutex poisoned").designated
    }

    pub(crate) fn set_designated(&self, id: NodeId) {
        self.state.lock().expect("module node mutex poisoned").designated = Some(id);
    }
}

/// Identities of every module in `root`'s subtree, `root` included.
///
/// Iterative depth-first walk with a visited set, so shared instances are
/// visited once and the walk terminates on any already-linked shape.
fn subtree_ids(root: &Arc<dyn Module>) -> HashSet<NodeId> {
    let mut visited: HashSet<NodeId> = HashSet::new();
    let mut stack = vec![root.clone()];
    while let Some(module) = stack.pop() {
        if !visited.insert(module.node().id()) {
            continue;
        }
        stack.extend(module.node().children());
    }
    visited
}
