//! Static traversal of the task tree
//!
//! Inspection runs a task to its first prompt in
//! [`TraversalMode::Inspection`], notes what is visible there, then recurses
//! into every task declared in that scope. Scope removal is deferred during
//! the walk and forced once a subtree is done, so the registry and stack end
//! up exactly as they started.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::descriptor::ActionDescriptor;
use super::error::{Result, RuntimeError};
use super::scope::TraversalMode;
use super::unit::{Dispatcher, ExecutionUnit};
use super::Runtime;
use crate::interpreter::evaluator::Invocation;

/// One scope reached during inspection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InspectedScope {
    /// Qualified name of the task owning the scope.
    pub qualified_name: String,
    /// Nesting level, 1 for the inspected task.
    pub level: usize,
    /// Names invocable at the task's prompt, in order.
    pub actions: Vec<String>,
}

impl fmt::Display for InspectedScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "context: {}, available actions: [{}]",
            self.qualified_name,
            self.actions.join(", ")
        )
    }
}

/// Every scope reachable from a task, depth first.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InspectionReport {
    /// Visited scopes in visiting order.
    pub scopes: Vec<InspectedScope>,
}

impl fmt::Display for InspectionReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for scope in &self.scopes {
            writeln!(f, "{}", scope)?;
        }
        Ok(())
    }
}

impl Runtime {
    /// Walk the task named `task` and every task it declares.
    pub fn inspect(&mut self, task: &str) -> Result<InspectionReport> {
        if self.is_active() {
            return Err(RuntimeError::DialogActive);
        }
        let descriptor = self
            .combined_registry()
            .get(task)
            .cloned()
            .ok_or_else(|| RuntimeError::UnknownAction(task.to_string()))?;
        if !descriptor.is_interactive() {
            return Err(RuntimeError::NotATask(task.to_string()));
        }

        let mut report = InspectionReport::default();
        let result = self.inspect_scope(descriptor, 1, &mut report);
        self.units.clear();
        result.map(|()| report)
    }

    fn inspect_scope(
        &mut self,
        descriptor: Arc<ActionDescriptor>,
        level: usize,
        report: &mut InspectionReport,
    ) -> Result<()> {
        let depth = self.state.scopes.depth();
        let base = self.units.len();
        tracing::debug!(task = descriptor.qualified_name(), level, "inspecting task");

        self.units
            .push(ExecutionUnit::new(Invocation::with_placeholders(descriptor)));
        let step = Dispatcher::new(&mut self.state, &mut self.units, TraversalMode::Inspection)
            .run(base);

        let walked = step.and_then(|_| self.visit(depth, level, report));
        self.units.truncate(base);
        self.state.scopes.unwind_to(depth);
        walked
    }

    fn visit(&mut self, depth: usize, level: usize, report: &mut InspectionReport) -> Result<()> {
        let Some(&scope) = self.state.scopes.stack().get(depth) else {
            return Ok(());
        };
        let Some(frame) = self.state.scopes.frame(scope) else {
            return Ok(());
        };
        let qualified_name = frame.qualified_name().to_string();
        let nested: Vec<Arc<ActionDescriptor>> = frame
            .locals()
            .values()
            .filter(|descriptor| descriptor.is_interactive())
            .cloned()
            .collect();

        report.scopes.push(InspectedScope {
            qualified_name,
            level,
            actions: self.combined_registry().into_keys().collect(),
        });

        for task in nested {
            self.inspect_scope(task, level + 1, report)?;
        }
        Ok(())
    }
}
