//! Resumable execution units and the dispatcher driving them
//!
//! Each invocation becomes an [`ExecutionUnit`] with an explicit state. The
//! live units form a stack: a unit evaluating an argument sits below the unit
//! for that argument, and a task waiting for input sits below the unit for
//! the action it was handed. Suspending means returning to the driver with
//! the stack intact; resuming means pushing a new unit on top of the waiting
//! task and driving the stack again.

use std::sync::Arc;

use super::context::ActionContext;
use super::descriptor::{ActionDescriptor, Arguments};
use super::error::{Result, RuntimeError};
use super::exit::ExitSignal;
use super::scope::{ScopeId, TraversalMode};
use super::state::RuntimeState;
use crate::interpreter::evaluator::{Invocation, Plan};
use crate::interpreter::value::Value;

/// Lifecycle of one execution unit.
#[derive(Debug, Clone, PartialEq)]
pub enum UnitState {
    /// Not started; tasks still have to open their scope.
    Entering,
    /// Evaluating arguments in written order.
    AwaitingArgument {
        /// Index into the invocation's argument list.
        cursor: usize,
        /// Values bound so far, by parameter slot.
        values: Vec<Option<Value>>,
    },
    /// Task suspended at its prompt.
    AwaitingAction,
    /// Leaving the scope because of an exit signal.
    Unwinding,
    /// Finished; about to be removed from the stack.
    Done,
}

/// One invocation being executed.
#[derive(Debug)]
pub struct ExecutionUnit {
    pub(super) invocation: Invocation,
    pub(super) state: UnitState,
    pub(super) scope: Option<ScopeId>,
    pub(super) activation: Option<ScopeId>,
    pub(super) result: Value,
}

impl ExecutionUnit {
    /// Fresh unit for `invocation`.
    pub fn new(invocation: Invocation) -> Self {
        Self {
            invocation,
            state: UnitState::Entering,
            scope: None,
            activation: None,
            result: Value::None,
        }
    }

    /// Action being executed.
    pub fn descriptor(&self) -> &Arc<ActionDescriptor> {
        &self.invocation.descriptor
    }

    /// Current state.
    pub fn state(&self) -> &UnitState {
        &self.state
    }

    /// Scope currently held by this unit.
    pub fn scope(&self) -> Option<ScopeId> {
        self.scope
    }

    /// Scope opened by this unit, even after it was left.
    pub fn activation(&self) -> Option<ScopeId> {
        self.activation
    }

    /// Whether the unit is a task waiting for its next action.
    pub fn is_awaiting_action(&self) -> bool {
        self.state == UnitState::AwaitingAction
    }
}

/// How a unit (or the whole stack above a base) finished.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// Completed with a value.
    Value(Value),
    /// An exit signal is still looking for its target.
    Exit(ExitSignal),
}

/// Result of driving the unit stack.
#[derive(Debug, Clone, PartialEq)]
pub enum Step {
    /// The top unit is a task waiting for input.
    Suspended,
    /// Every unit above the base finished.
    Finished(Outcome),
}

enum Next {
    Bind(usize, Value),
    Push(Invocation),
    Invoke(Vec<Value>),
}

/// Drives the unit stack against the shared runtime state.
pub struct Dispatcher<'a> {
    pub(super) state: &'a mut RuntimeState,
    pub(super) units: &'a mut Vec<ExecutionUnit>,
    pub(super) mode: TraversalMode,
}

impl<'a> Dispatcher<'a> {
    /// Dispatcher over `units` in the given traversal mode.
    pub fn new(
        state: &'a mut RuntimeState,
        units: &'a mut Vec<ExecutionUnit>,
        mode: TraversalMode,
    ) -> Self {
        Self { state, units, mode }
    }

    /// Run until the top unit suspends or every unit above `base` finished.
    ///
    /// Units at or below `base` are never touched; an outcome reaching the
    /// base is returned to the caller.
    pub fn run(&mut self, base: usize) -> Result<Step> {
        loop {
            let top = match self.units.len().checked_sub(1) {
                Some(top) if top >= base => top,
                _ => return Err(RuntimeError::Internal("no unit to run".into())),
            };

            let outcome = match self.units[top].state {
                UnitState::Entering => {
                    self.enter(top)?;
                    None
                }
                UnitState::AwaitingArgument { .. } => self.advance(top)?,
                UnitState::AwaitingAction => return Ok(Step::Suspended),
                UnitState::Unwinding | UnitState::Done => {
                    return Err(RuntimeError::Internal(format!(
                        "unit '{}' resumed after finishing",
                        self.units[top].descriptor().qualified_name()
                    )));
                }
            };

            if let Some(outcome) = outcome {
                if let Some(finished) = self.finish(outcome, base)? {
                    return Ok(Step::Finished(finished));
                }
            }
        }
    }

    fn enter(&mut self, index: usize) -> Result<()> {
        let unit = &mut self.units[index];
        if unit.descriptor().is_interactive() {
            let scope = self.state.scopes.enter(unit.descriptor().qualified_name())?;
            unit.scope = Some(scope);
            unit.activation = Some(scope);
        }
        unit.state = UnitState::AwaitingArgument {
            cursor: 0,
            values: vec![None; unit.invocation.arity()],
        };
        Ok(())
    }

    fn advance(&mut self, index: usize) -> Result<Option<Outcome>> {
        let next = {
            let unit = &mut self.units[index];
            let UnitState::AwaitingArgument { cursor, values } = &mut unit.state else {
                return Err(RuntimeError::Internal("unit is not evaluating arguments".into()));
            };
            match unit.invocation.args.get(*cursor) {
                Some(arg) => match &arg.plan {
                    Plan::Literal(value) => Next::Bind(arg.slot, value.clone()),
                    Plan::Invoke(nested) => Next::Push(nested.clone()),
                },
                None => {
                    let bound: Option<Vec<Value>> = std::mem::take(values).into_iter().collect();
                    let bound = bound.ok_or_else(|| {
                        RuntimeError::contract(
                            unit.invocation.descriptor.name(),
                            "argument left unbound",
                        )
                    })?;
                    Next::Invoke(bound)
                }
            }
        };

        match next {
            Next::Bind(slot, value) => {
                self.bind(index, slot, value);
                Ok(None)
            }
            Next::Push(nested) => {
                tracing::debug!(action = nested.descriptor.qualified_name(), "evaluating argument");
                self.units.push(ExecutionUnit::new(nested));
                Ok(None)
            }
            Next::Invoke(values) => self.invoke(index, values),
        }
    }

    fn bind(&mut self, index: usize, slot: usize, value: Value) {
        if let UnitState::AwaitingArgument { cursor, values } = &mut self.units[index].state {
            if let Some(entry) = values.get_mut(slot) {
                *entry = Some(value);
            }
            *cursor += 1;
        }
    }

    fn invoke(&mut self, index: usize, values: Vec<Value>) -> Result<Option<Outcome>> {
        let descriptor = self.units[index].descriptor().clone();
        descriptor.signature().check_arguments(&values)?;
        let args = Arguments::new(descriptor.name(), values);

        let mut ctx = ActionContext::new(self.state, self.mode);
        let returned = (descriptor.body())(&mut ctx, &args);
        let exit = ctx.into_exit();
        let value = returned.map_err(|err| RuntimeError::from_body(descriptor.name(), err))?;

        if let Some(signal) = exit {
            self.ensure_active(signal.target)?;
            if descriptor.is_interactive() {
                self.units[index].result = value;
            }
            tracing::debug!(
                target = %signal.target,
                action = descriptor.qualified_name(),
                "exit requested"
            );
            return Ok(Some(Outcome::Exit(signal)));
        }

        let unit = &mut self.units[index];
        if descriptor.is_interactive() {
            unit.result = value;
            unit.state = UnitState::AwaitingAction;
            Ok(None)
        } else {
            descriptor.signature().check_return(&value)?;
            unit.state = UnitState::Done;
            Ok(Some(Outcome::Value(value)))
        }
    }

    /// Retire the top unit with `outcome` and hand the result to the unit
    /// below. Returns the outcome once it reaches `base`.
    fn finish(&mut self, mut outcome: Outcome, base: usize) -> Result<Option<Outcome>> {
        loop {
            if self.units.len() <= base {
                return Ok(Some(outcome));
            }
            match outcome {
                Outcome::Exit(signal) => {
                    outcome = self.propagate(signal)?;
                }
                Outcome::Value(value) => {
                    if let Some(done) = self.units.pop() {
                        if let Some(scope) = done.scope {
                            self.state.scopes.leave(scope, self.mode, false)?;
                        }
                    }
                    if self.units.len() <= base {
                        return Ok(Some(Outcome::Value(value)));
                    }
                    self.deliver(value)?;
                    return Ok(None);
                }
            }
        }
    }

    fn deliver(&mut self, value: Value) -> Result<()> {
        let index = self.units.len() - 1;
        match &self.units[index].state {
            UnitState::AwaitingArgument { cursor, .. } => {
                let slot = self.units[index]
                    .invocation
                    .args
                    .get(*cursor)
                    .map(|arg| arg.slot)
                    .ok_or_else(|| RuntimeError::Internal("argument cursor out of range".into()))?;
                self.bind(index, slot, value);
                Ok(())
            }
            UnitState::AwaitingAction => {
                tracing::debug!(
                    action = self.units[index].descriptor().qualified_name(),
                    result = %value,
                    "action completed"
                );
                Ok(())
            }
            other => Err(RuntimeError::Internal(format!(
                "cannot deliver a value to a unit in state {:?}",
                other
            ))),
        }
    }
}
