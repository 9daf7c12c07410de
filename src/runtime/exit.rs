//! Exit signal channel
//!
//! An exit signal travels from the unit that raised it down the unit stack
//! until it reaches the unit owning the target scope. Every unit it passes
//! leaves its scope on the way; only the target consumes the carried value.

use serde::{Deserialize, Serialize};

use super::error::{Result, RuntimeError};
use super::scope::ScopeId;
use super::unit::{Dispatcher, Outcome, UnitState};
use crate::interpreter::value::Value;

/// Request to terminate the scope `target`, optionally with a value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExitSignal {
    /// Scope that consumes the signal.
    pub target: ScopeId,
    /// Result handed to the target task; `None` keeps the value its body
    /// returned.
    pub value: Option<Value>,
}

impl ExitSignal {
    /// Build a signal for `target`.
    pub fn new(target: ScopeId, value: Option<Value>) -> Self {
        Self { target, value }
    }
}

impl Dispatcher<'_> {
    /// Fail with `DanglingExit` unless `target` is on the scope stack.
    pub(super) fn ensure_active(&self, target: ScopeId) -> Result<()> {
        if self.state.scopes.contains(target) {
            Ok(())
        } else {
            Err(RuntimeError::DanglingExit(target))
        }
    }

    /// Move `signal` one unit down the stack.
    ///
    /// The top unit either owns the target scope, in which case it consumes
    /// the signal and finishes with the carried value, or it leaves its scope,
    /// is dropped, and the signal continues unchanged.
    ///
    /// A value that breaks the target's return contract is rejected before
    /// the scope is left; a task that was waiting at its prompt keeps waiting.
    pub(super) fn propagate(&mut self, signal: ExitSignal) -> Result<Outcome> {
        self.ensure_active(signal.target)?;
        let mode = self.mode;
        let Some(unit) = self.units.last_mut() else {
            return Ok(Outcome::Exit(signal));
        };

        if unit.scope == Some(signal.target) {
            let value = signal.value.unwrap_or_else(|| unit.result.clone());
            unit.descriptor().signature().check_return(&value)?;
            unit.state = UnitState::Unwinding;
            unit.scope = None;
            self.state.scopes.leave(signal.target, mode, false)?;
            tracing::debug!(
                scope = %signal.target,
                action = unit.descriptor().qualified_name(),
                "exit consumed"
            );
            unit.state = UnitState::Done;
            return Ok(Outcome::Value(value));
        }

        unit.state = UnitState::Unwinding;

        if let Some(scope) = unit.scope.take() {
            self.state.scopes.leave(scope, mode, false)?;
        }
        tracing::debug!(
            target = %signal.target,
            action = unit.descriptor().qualified_name(),
            "unwound past unit"
        );
        self.units.pop();
        Ok(Outcome::Exit(signal))
    }
}
