//! Shared mutable state of one runtime
//!
//! The scope registry/stack and the last spoken message are the only state
//! shared across execution units. Everything that touches them receives the
//! [`RuntimeState`] by `&mut` together with the active [`TraversalMode`].

use std::sync::Arc;

use super::descriptor::{ActionDescriptor, ActionFn, Prompt, Signature};
use super::error::Result;
use super::scope::{ScopeId, ScopeRegistry, TraversalMode};

/// Scope registry, last-message cell and pending spoken output.
#[derive(Debug)]
pub struct RuntimeState {
    pub(crate) scopes: ScopeRegistry,
    last_message: String,
    outbox: Vec<String>,
}

impl RuntimeState {
    /// Fresh state holding only the root scope.
    pub fn new(max_scope_depth: usize) -> Self {
        Self {
            scopes: ScopeRegistry::new(max_scope_depth),
            last_message: String::new(),
            outbox: Vec::new(),
        }
    }

    /// Scope registry and stack.
    pub fn scopes(&self) -> &ScopeRegistry {
        &self.scopes
    }

    /// Text of the most recent `say`.
    pub fn last_message(&self) -> &str {
        &self.last_message
    }

    /// Record `text` as the last message and emit it.
    pub fn say(&mut self, text: String, mode: TraversalMode) {
        if mode == TraversalMode::Inspection {
            return;
        }
        self.last_message = text.clone();
        self.emit(text, mode);
    }

    /// Emit `text` without touching the last message.
    pub fn emit(&mut self, text: String, mode: TraversalMode) {
        if mode == TraversalMode::Inspection {
            return;
        }
        tracing::info!(text = %text, "agent says");
        self.outbox.push(text);
    }

    /// Drain spoken lines not yet collected by the driver.
    pub fn take_spoken(&mut self) -> Vec<String> {
        std::mem::take(&mut self.outbox)
    }

    /// Validate and insert a new action into `scope`.
    pub(crate) fn declare(
        &mut self,
        scope: ScopeId,
        signature: Signature,
        interactive: bool,
        prompt: Option<Prompt>,
        body: ActionFn,
    ) -> Result<Arc<ActionDescriptor>> {
        signature.validate()?;
        let qualified_name = match self.scopes.frame(scope).map(|frame| frame.qualified_name()) {
            Some(owner) if !owner.is_empty() => format!("{}::{}", owner, signature.name),
            _ => signature.name.clone(),
        };
        let descriptor = Arc::new(ActionDescriptor::new(
            signature,
            qualified_name,
            interactive,
            prompt,
            body,
        ));
        self.scopes.declare(scope, descriptor.clone())?;
        tracing::debug!(
            scope = %scope,
            action = descriptor.qualified_name(),
            interactive,
            "declared action"
        );
        Ok(descriptor)
    }
}
