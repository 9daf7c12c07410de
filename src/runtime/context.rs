//! Declaration surface handed to skill and task bodies

use std::sync::Arc;

use super::descriptor::{ActionDescriptor, Arguments, Prompt, Signature};
use super::error::Result;
use super::exit::ExitSignal;
use super::scope::{ScopeId, TraversalMode};
use super::state::RuntimeState;
use crate::interpreter::value::Value;

/// Context passed to a running action body.
///
/// Declarations go into the innermost active scope, which for a task body is
/// the task's own freshly entered scope.
pub struct ActionContext<'a> {
    state: &'a mut RuntimeState,
    mode: TraversalMode,
    exit: Option<ExitSignal>,
}

impl<'a> ActionContext<'a> {
    pub(crate) fn new(state: &'a mut RuntimeState, mode: TraversalMode) -> Self {
        Self {
            state,
            mode,
            exit: None,
        }
    }

    /// Speak `text` and remember it for `repeat`.
    pub fn say(&mut self, text: impl Into<String>) {
        self.state.say(text.into(), self.mode);
    }

    /// Speak the last message again.
    pub fn repeat(&mut self) {
        let text = self.state.last_message().to_string();
        self.state.emit(text, self.mode);
    }

    /// Ask the runtime to terminate `target` (the innermost active scope if
    /// `None`) once this body returns.
    ///
    /// The target task finishes with `value`; without one it finishes with
    /// whatever its own body returned. The calling body's return value is
    /// discarded when an exit is pending.
    pub fn request_exit(&mut self, value: Option<Value>, target: Option<ScopeId>) {
        let target = target.unwrap_or_else(|| self.state.scopes.top());
        self.exit = Some(ExitSignal::new(target, value));
    }

    /// Declare a skill visible while the current scope is active.
    pub fn declare_skill<F>(&mut self, signature: &str, body: F) -> Result<Arc<ActionDescriptor>>
    where
        F: Fn(&mut ActionContext<'_>, &Arguments) -> anyhow::Result<Value> + Send + Sync + 'static,
    {
        let scope = self.current_scope();
        self.state
            .declare(scope, Signature::parse(signature)?, false, None, Arc::new(body))
    }

    /// Declare a task visible while the current scope is active.
    pub fn declare_task<F>(
        &mut self,
        signature: &str,
        prompt: Option<Prompt>,
        body: F,
    ) -> Result<Arc<ActionDescriptor>>
    where
        F: Fn(&mut ActionContext<'_>, &Arguments) -> anyhow::Result<Value> + Send + Sync + 'static,
    {
        let scope = self.current_scope();
        self.state
            .declare(scope, Signature::parse(signature)?, true, prompt, Arc::new(body))
    }

    /// Replace the prompt of the current task activation.
    pub fn set_prompt(&mut self, prompt: Prompt) {
        let scope = self.current_scope();
        self.state.scopes.set_prompt(scope, prompt);
    }

    /// Innermost active scope.
    pub fn current_scope(&self) -> ScopeId {
        self.state.scopes.top()
    }

    /// Text of the most recent `say`.
    pub fn last_message(&self) -> &str {
        self.state.last_message()
    }

    /// Whether the body runs for real or during inspection.
    pub fn mode(&self) -> TraversalMode {
        self.mode
    }

    pub(crate) fn into_exit(self) -> Option<ExitSignal> {
        self.exit
    }
}
