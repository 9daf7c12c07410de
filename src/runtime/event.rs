//! Events exchanged between the runtime and its driver

use std::fmt;

use super::exit::ExitSignal;
use super::scope::{CombinedRegistry, ScopeId};
use crate::interpreter::value::Value;

/// Emitted when a task suspends waiting for its next action.
#[derive(Debug, Clone)]
pub struct PromptEvent {
    /// Prompt text, possibly empty.
    pub prompt: String,
    /// Actions the next input may invoke.
    pub registry: CombinedRegistry,
    /// Qualified name of the waiting task.
    pub qualified_name: String,
    /// Scope of the waiting task.
    pub scope: ScopeId,
}

impl PromptEvent {
    /// Names of the invocable actions, in order.
    pub fn action_names(&self) -> Vec<&str> {
        self.registry.keys().map(String::as_str).collect()
    }
}

/// Emitted when the outermost dialog ends.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExitEvent {
    /// Scope the final exit targeted.
    pub target: ScopeId,
    /// Result of the dialog; [`Value::None`] for an exit that carried none.
    pub value: Value,
}

impl From<ExitSignal> for ExitEvent {
    fn from(signal: ExitSignal) -> Self {
        Self {
            target: signal.target,
            value: signal.value.unwrap_or_default(),
        }
    }
}

/// What the driver receives after starting or resuming a dialog.
#[derive(Debug, Clone)]
pub enum DialogEvent {
    /// A task waits for exactly one action expression.
    Prompt(PromptEvent),
    /// The dialog finished.
    Exit(ExitEvent),
}

impl DialogEvent {
    /// The prompt, if the dialog is still running.
    pub fn as_prompt(&self) -> Option<&PromptEvent> {
        match self {
            DialogEvent::Prompt(prompt) => Some(prompt),
            DialogEvent::Exit(_) => None,
        }
    }

    /// The exit, if the dialog finished.
    pub fn as_exit(&self) -> Option<&ExitEvent> {
        match self {
            DialogEvent::Exit(exit) => Some(exit),
            DialogEvent::Prompt(_) => None,
        }
    }
}

impl fmt::Display for DialogEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DialogEvent::Prompt(prompt) => write!(f, "prompt in {}", prompt.qualified_name),
            DialogEvent::Exit(exit) => write!(f, "exit from {} with {}", exit.target, exit.value),
        }
    }
}
