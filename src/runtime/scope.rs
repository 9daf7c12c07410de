//! Scope identities, the scope stack and the scoped action registry
//!
//! Every activation of a task owns one scope. Actions declared while that
//! scope is active live in its local registry and are visible only while the
//! scope is on the stack. The root scope holds the global actions and is
//! never removed.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::descriptor::{ActionDescriptor, Prompt};
use super::error::{Result, RuntimeError};

/// Opaque handle identifying one activation of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ScopeId(pub Uuid);

impl ScopeId {
    /// The root scope holding global actions.
    pub const ROOT: ScopeId = ScopeId(Uuid::nil());

    /// Allocate a fresh scope identity.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Whether this is the root scope.
    pub fn is_root(&self) -> bool {
        *self == Self::ROOT
    }
}

impl Default for ScopeId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ScopeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_root() {
            write!(f, "root")
        } else {
            write!(f, "{}", self.0)
        }
    }
}

/// Whether operations have real effects or only walk the scope tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TraversalMode {
    /// Normal execution driven by user input.
    #[default]
    Live,
    /// Static traversal: scope removal deferred, nothing spoken.
    Inspection,
}

/// Snapshot of visible actions, keyed by name.
pub type CombinedRegistry = BTreeMap<String, Arc<ActionDescriptor>>;

/// State kept for one active scope.
#[derive(Debug, Clone, Default)]
pub struct ScopeFrame {
    qualified_name: String,
    locals: BTreeMap<String, Arc<ActionDescriptor>>,
    prompt: Option<Prompt>,
}

impl ScopeFrame {
    fn new(qualified_name: impl Into<String>) -> Self {
        Self {
            qualified_name: qualified_name.into(),
            locals: BTreeMap::new(),
            prompt: None,
        }
    }

    /// Qualified name of the task owning the scope (empty for root).
    pub fn qualified_name(&self) -> &str {
        &self.qualified_name
    }

    /// Actions declared in this scope.
    pub fn locals(&self) -> &BTreeMap<String, Arc<ActionDescriptor>> {
        &self.locals
    }

    /// Prompt installed by the running task body, if any.
    pub fn prompt(&self) -> Option<&Prompt> {
        self.prompt.as_ref()
    }
}

/// Scope stack plus one local registry per stacked scope.
#[derive(Debug)]
pub struct ScopeRegistry {
    frames: HashMap<ScopeId, ScopeFrame>,
    stack: Vec<ScopeId>,
    max_depth: usize,
}

impl ScopeRegistry {
    /// Registry holding only the root scope.
    pub fn new(max_depth: usize) -> Self {
        let mut frames = HashMap::new();
        frames.insert(ScopeId::ROOT, ScopeFrame::default());
        Self {
            frames,
            stack: vec![ScopeId::ROOT],
            max_depth,
        }
    }

    /// Push a fresh scope for an activation of `qualified_name`.
    pub fn enter(&mut self, qualified_name: &str) -> Result<ScopeId> {
        if self.stack.len() > self.max_depth {
            return Err(RuntimeError::ScopeDepthExceeded(self.max_depth));
        }
        let scope = ScopeId::new();
        self.frames.insert(scope, ScopeFrame::new(qualified_name));
        self.stack.push(scope);
        tracing::debug!(
            scope = %scope,
            task = qualified_name,
            depth = self.stack.len(),
            "entered scope"
        );
        Ok(scope)
    }

    /// Pop `scope` and drop its registry.
    ///
    /// In inspection mode this is a no-op unless `force` is set, so the tree
    /// can still be walked after a task terminated.
    pub fn leave(&mut self, scope: ScopeId, mode: TraversalMode, force: bool) -> Result<()> {
        if mode == TraversalMode::Inspection && !force {
            return Ok(());
        }
        let top = self.top();
        if scope.is_root() || top != scope {
            return Err(RuntimeError::ScopeViolation {
                expected: scope,
                found: Some(top),
            });
        }
        self.stack.pop();
        self.frames.remove(&scope);
        tracing::debug!(scope = %scope, depth = self.stack.len(), "left scope");
        Ok(())
    }

    /// Insert `descriptor` into the local registry of `scope`, replacing an
    /// earlier declaration of the same name.
    pub fn declare(&mut self, scope: ScopeId, descriptor: Arc<ActionDescriptor>) -> Result<()> {
        let top = self.top();
        let frame = self
            .frames
            .get_mut(&scope)
            .ok_or(RuntimeError::ScopeViolation {
                expected: scope,
                found: Some(top),
            })?;
        if let Some(previous) = frame.locals.insert(descriptor.name().to_string(), descriptor) {
            tracing::debug!(scope = %scope, action = previous.name(), "redeclared action");
        }
        Ok(())
    }

    /// Insert `descriptor` into the root registry.
    pub fn declare_global(&mut self, descriptor: Arc<ActionDescriptor>) {
        self.frames
            .entry(ScopeId::ROOT)
            .or_default()
            .locals
            .insert(descriptor.name().to_string(), descriptor);
    }

    /// Install the prompt shown while `scope` waits for input.
    pub fn set_prompt(&mut self, scope: ScopeId, prompt: Prompt) {
        if let Some(frame) = self.frames.get_mut(&scope) {
            frame.prompt = Some(prompt);
        }
    }

    /// Root registry overlaid with every stacked scope, innermost last.
    pub fn combined(&self) -> CombinedRegistry {
        let mut combined = CombinedRegistry::new();
        for scope in &self.stack {
            if let Some(frame) = self.frames.get(scope) {
                for (name, descriptor) in &frame.locals {
                    combined.insert(name.clone(), descriptor.clone());
                }
            }
        }
        combined
    }

    /// Innermost scope.
    pub fn top(&self) -> ScopeId {
        self.stack.last().copied().unwrap_or(ScopeId::ROOT)
    }

    /// Number of stacked scopes, root included.
    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    /// Whether `scope` is on the stack.
    pub fn contains(&self, scope: ScopeId) -> bool {
        self.stack.contains(&scope)
    }

    /// Stacked scopes, root first.
    pub fn stack(&self) -> &[ScopeId] {
        &self.stack
    }

    /// Frame of an active scope.
    pub fn frame(&self, scope: ScopeId) -> Option<&ScopeFrame> {
        self.frames.get(&scope)
    }

    /// Local registry of an active scope.
    pub fn locals(&self, scope: ScopeId) -> Option<&BTreeMap<String, Arc<ActionDescriptor>>> {
        self.frames.get(&scope).map(ScopeFrame::locals)
    }

    /// Number of live scope frames, root included.
    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }

    /// Force-pop scopes until the stack is `depth` deep.
    pub fn unwind_to(&mut self, depth: usize) {
        let depth = depth.max(1);
        while self.stack.len() > depth {
            if let Some(scope) = self.stack.pop() {
                self.frames.remove(&scope);
                tracing::debug!(scope = %scope, "discarded scope");
            }
        }
    }
}
