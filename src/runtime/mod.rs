//! Runtime orchestrator and public API
//!
//! This module provides the main `Runtime` struct that owns the shared dialog
//! state and the stack of live execution units, and exposes the interface a
//! host application and its driver use.

use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use serde::{Deserialize, Serialize};

// Submodules
pub mod context;
pub mod descriptor;
pub mod error;
pub mod event;
pub mod exit;
pub mod inspect;
pub mod scope;
pub mod state;
pub mod unit;

use crate::interpreter::evaluator::{Invocation, resolve};
use crate::interpreter::parser::parse_action;
use crate::interpreter::value::Value;
use state::RuntimeState;
use unit::{Dispatcher, ExecutionUnit, Outcome, Step};

// Re-export commonly used types
pub use context::ActionContext;
pub use descriptor::{ActionDescriptor, Arguments, Parameter, Prompt, Signature};
pub use error::{Result, RuntimeError};
pub use event::{DialogEvent, ExitEvent, PromptEvent};
pub use exit::ExitSignal;
pub use inspect::{InspectedScope, InspectionReport};
pub use scope::{CombinedRegistry, ScopeId, TraversalMode};

/// Configuration for the dialog runtime
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Maximum number of nested task scopes (root excluded)
    pub max_scope_depth: usize,

    /// Enable debug tracing
    pub debug: bool,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            max_scope_depth: 64,
            debug: false,
        }
    }
}

impl RuntimeConfig {
    /// Load a configuration from a JSON file; missing fields take defaults.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let data = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        let config = serde_json::from_str(&data)
            .with_context(|| format!("Failed to parse config file: {:?}", path))?;
        Ok(config)
    }
}

/// The dialog runtime
///
/// Holds the scope registry/stack, the last-message cell and the live unit
/// stack of the single active dialog.
pub struct Runtime {
    config: RuntimeConfig,
    state: RuntimeState,
    units: Vec<ExecutionUnit>,
    dialog_scope: Option<ScopeId>,
}

impl Runtime {
    /// Create a runtime whose root registry holds the built-in actions.
    pub fn new(config: RuntimeConfig) -> Self {
        let mut state = RuntimeState::new(config.max_scope_depth);
        for descriptor in builtin_actions() {
            state.scopes.declare_global(descriptor);
        }
        Self {
            config,
            state,
            units: Vec::new(),
            dialog_scope: None,
        }
    }

    /// Get the current configuration
    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    /// Shared state: scopes and last message.
    pub fn state(&self) -> &RuntimeState {
        &self.state
    }

    /// Declare a global skill.
    pub fn declare_skill<F>(&mut self, signature: &str, body: F) -> Result<Arc<ActionDescriptor>>
    where
        F: Fn(&mut ActionContext<'_>, &Arguments) -> anyhow::Result<Value>
            + Send
            + Sync
            + 'static,
    {
        let signature = Signature::parse(signature)?;
        self.state
            .declare(ScopeId::ROOT, signature, false, None, Arc::new(body))
    }

    /// Declare a global task.
    pub fn declare_task<F>(
        &mut self,
        signature: &str,
        prompt: Option<Prompt>,
        body: F,
    ) -> Result<Arc<ActionDescriptor>>
    where
        F: Fn(&mut ActionContext<'_>, &Arguments) -> anyhow::Result<Value>
            + Send
            + Sync
            + 'static,
    {
        let signature = Signature::parse(signature)?;
        self.state
            .declare(ScopeId::ROOT, signature, true, prompt, Arc::new(body))
    }

    /// Start a dialog with `expression`, normally the top-level task.
    pub fn start(&mut self, expression: &str) -> Result<DialogEvent> {
        if self.is_active() {
            return Err(RuntimeError::DialogActive);
        }
        let invocation = self.resolve(expression)?;
        tracing::debug!(action = invocation.descriptor.qualified_name(), "starting dialog");
        self.units.push(ExecutionUnit::new(invocation));
        self.drive()
    }

    /// Hand the waiting task its next action expression.
    ///
    /// Parse, resolution and contract errors leave the dialog suspended at
    /// the same prompt.
    pub fn resume(&mut self, action: &str) -> Result<DialogEvent> {
        if !self.units.last().is_some_and(ExecutionUnit::is_awaiting_action) {
            return Err(RuntimeError::NoActiveDialog);
        }
        let invocation = self.resolve(action)?;
        tracing::debug!(action = invocation.descriptor.qualified_name(), "resuming dialog");
        self.units.push(ExecutionUnit::new(invocation));
        self.drive()
    }

    /// Prompt of the task currently waiting for input.
    pub fn current_prompt(&self) -> Option<PromptEvent> {
        let unit = self.units.last().filter(|unit| unit.is_awaiting_action())?;
        let scope = unit.scope()?;
        let descriptor = unit.descriptor();
        let prompt = self
            .state
            .scopes
            .frame(scope)
            .and_then(|frame| frame.prompt())
            .or_else(|| descriptor.prompt())
            .map(Prompt::render)
            .unwrap_or_default();
        Some(PromptEvent {
            prompt,
            registry: self.state.scopes.combined(),
            qualified_name: descriptor.qualified_name().to_string(),
            scope,
        })
    }

    /// Whether a dialog is running.
    pub fn is_active(&self) -> bool {
        !self.units.is_empty()
    }

    /// Number of stacked scopes, root included.
    pub fn scope_depth(&self) -> usize {
        self.state.scopes.depth()
    }

    /// Actions visible from the innermost scope.
    pub fn combined_registry(&self) -> CombinedRegistry {
        self.state.scopes.combined()
    }

    /// Text of the most recent `say`.
    pub fn last_message(&self) -> &str {
        self.state.last_message()
    }

    /// Drain spoken lines produced since the last call.
    pub fn take_spoken(&mut self) -> Vec<String> {
        self.state.take_spoken()
    }

    fn resolve(&self, text: &str) -> Result<Invocation> {
        let expr = parse_action(text)?;
        resolve(&expr, &self.state.scopes.combined())
    }

    fn drive(&mut self) -> Result<DialogEvent> {
        let step = Dispatcher::new(&mut self.state, &mut self.units, TraversalMode::Live).run(0);
        if self.dialog_scope.is_none() {
            self.dialog_scope = self.units.first().and_then(ExecutionUnit::activation);
        }

        match step {
            Ok(Step::Suspended) => self
                .current_prompt()
                .map(DialogEvent::Prompt)
                .ok_or_else(|| RuntimeError::Internal("suspended without a waiting task".into())),
            Ok(Step::Finished(Outcome::Value(value))) => {
                let target = self.dialog_scope.take().unwrap_or(ScopeId::ROOT);
                tracing::debug!(scope = %target, result = %value, "dialog finished");
                Ok(DialogEvent::Exit(ExitEvent { target, value }))
            }
            Ok(Step::Finished(Outcome::Exit(signal))) if signal.target.is_root() => {
                self.dialog_scope = None;
                tracing::debug!(result = ?signal.value, "dialog exited to root");
                Ok(DialogEvent::Exit(signal.into()))
            }
            Ok(Step::Finished(Outcome::Exit(signal))) => {
                let err = RuntimeError::DanglingExit(signal.target);
                self.abort(&err);
                Err(err)
            }
            Err(err) if err.is_recoverable() => {
                tracing::warn!(error = %err, "turn rejected");
                if let Err(fatal) = self.rollback() {
                    self.abort(&fatal);
                    return Err(fatal);
                }
                Err(err)
            }
            Err(err) => {
                self.abort(&err);
                Err(err)
            }
        }
    }

    /// Drop every unit above the task that received the failed turn, leaving
    /// the scopes they opened.
    fn rollback(&mut self) -> Result<()> {
        while let Some(unit) = self.units.last_mut() {
            if unit.is_awaiting_action() {
                break;
            }
            if let Some(scope) = unit.scope.take() {
                self.state.scopes.leave(scope, TraversalMode::Live, false)?;
            }
            self.units.pop();
        }
        if self.units.is_empty() {
            self.dialog_scope = None;
        }
        Ok(())
    }

    fn abort(&mut self, err: &RuntimeError) {
        tracing::error!(error = %err, "aborting dialog");
        self.units.clear();
        self.state.scopes.unwind_to(1);
        self.dialog_scope = None;
    }
}

impl Default for Runtime {
    fn default() -> Self {
        Self::new(RuntimeConfig::default())
    }
}

fn builtin_actions() -> Vec<Arc<ActionDescriptor>> {
    vec![Arc::new(ActionDescriptor::new(
        Signature::new("repeat"),
        "repeat".to_string(),
        false,
        None,
        Arc::new(|ctx: &mut ActionContext<'_>, _args: &Arguments| {
            ctx.repeat();
            Ok(Value::None)
        }),
    ))]
}
