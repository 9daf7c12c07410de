//! Action descriptors and their signatures
//!
//! A descriptor is the immutable record of one declared skill or task. Its
//! signature is validated structurally when declared, so an action that made
//! it into a registry always has a well-formed parameter/return contract.

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::context::ActionContext;
use super::error::{Result, RuntimeError};
use crate::interpreter::parser::{is_identifier, parse_signature};
use crate::interpreter::value::{Value, ValueTag};

/// Body of a skill or task.
pub type ActionFn =
    Arc<dyn Fn(&mut ActionContext<'_>, &Arguments) -> anyhow::Result<Value> + Send + Sync>;

/// Function producing the prompt text of an active task.
pub type PromptFn = Arc<dyn Fn() -> String + Send + Sync>;

/// Prompt shown while a task waits for its next action.
#[derive(Clone)]
pub enum Prompt {
    /// Fixed text.
    Static(String),
    /// Text computed each time the task suspends.
    Supplier(PromptFn),
}

impl Prompt {
    /// Fixed prompt text.
    pub fn text(text: impl Into<String>) -> Self {
        Prompt::Static(text.into())
    }

    /// Prompt computed on every suspension.
    pub fn supplier<F>(supplier: F) -> Self
    where
        F: Fn() -> String + Send + Sync + 'static,
    {
        Prompt::Supplier(Arc::new(supplier))
    }

    /// Current prompt text.
    pub fn render(&self) -> String {
        match self {
            Prompt::Static(text) => text.clone(),
            Prompt::Supplier(supplier) => supplier(),
        }
    }
}

impl fmt::Debug for Prompt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Prompt::Static(text) => f.debug_tuple("Static").field(text).finish(),
            Prompt::Supplier(_) => f.write_str("Supplier(..)"),
        }
    }
}

/// Named, tagged parameter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Parameter {
    /// Parameter name, usable as a keyword argument.
    pub name: String,
    /// Required value tag.
    pub tag: ValueTag,
}

/// Parameter and return contract of an action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signature {
    /// Action name.
    pub name: String,
    /// Parameters in positional order.
    pub params: Vec<Parameter>,
    /// Return tag, `None` when the action returns no value.
    pub returns: Option<ValueTag>,
}

impl Signature {
    /// Start a signature with no parameters and no return value.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            params: Vec::new(),
            returns: None,
        }
    }

    /// Append a parameter.
    pub fn param(mut self, name: impl Into<String>, tag: ValueTag) -> Self {
        self.params.push(Parameter {
            name: name.into(),
            tag,
        });
        self
    }

    /// Set the return tag.
    pub fn returns(mut self, tag: ValueTag) -> Self {
        self.returns = Some(tag);
        self
    }

    /// Parse and validate `name(param: tag, ...) -> tag`.
    pub fn parse(text: &str) -> Result<Self> {
        let syntax =
            parse_signature(text).map_err(|err| RuntimeError::schema(text, err.to_string()))?;

        let mut params = Vec::with_capacity(syntax.params.len());
        for (name, tag_name) in syntax.params {
            let tag = ValueTag::from_name(&tag_name).ok_or_else(|| {
                RuntimeError::schema(
                    &syntax.name,
                    format!("parameter '{}' has unknown value kind '{}'", name, tag_name),
                )
            })?;
            params.push(Parameter { name, tag });
        }

        let returns = match syntax.returns.as_deref() {
            None | Some("none") => None,
            Some(tag_name) => Some(ValueTag::from_name(tag_name).ok_or_else(|| {
                RuntimeError::schema(
                    &syntax.name,
                    format!("return value has unknown value kind '{}'", tag_name),
                )
            })?),
        };

        let signature = Signature {
            name: syntax.name,
            params,
            returns,
        };
        signature.validate()?;
        Ok(signature)
    }

    /// Structural checks applied at declaration time.
    pub fn validate(&self) -> Result<()> {
        if !is_identifier(&self.name) {
            return Err(RuntimeError::schema(&self.name, "action name is not an identifier"));
        }
        let mut seen = HashSet::new();
        for param in &self.params {
            if !is_identifier(&param.name) {
                return Err(RuntimeError::schema(
                    &self.name,
                    format!("parameter name '{}' is not an identifier", param.name),
                ));
            }
            if !seen.insert(param.name.as_str()) {
                return Err(RuntimeError::schema(
                    &self.name,
                    format!("parameter '{}' declared twice", param.name),
                ));
            }
        }
        Ok(())
    }

    /// Index of the parameter called `name`.
    pub fn position(&self, name: &str) -> Option<usize> {
        self.params.iter().position(|param| param.name == name)
    }

    /// Check bound argument values against the parameter contract.
    pub fn check_arguments(&self, values: &[Value]) -> Result<()> {
        if values.len() != self.params.len() {
            return Err(RuntimeError::contract(
                &self.name,
                format!("expected {} arguments, received {}", self.params.len(), values.len()),
            ));
        }
        for (param, value) in self.params.iter().zip(values) {
            if value.tag() != Some(param.tag) {
                return Err(RuntimeError::contract(
                    &self.name,
                    format!(
                        "parameter '{}' expects {}, received {:?}",
                        param.name, param.tag, value
                    ),
                ));
            }
        }
        Ok(())
    }

    /// Check a produced value against the return contract.
    pub fn check_return(&self, value: &Value) -> Result<()> {
        if value.tag() == self.returns {
            Ok(())
        } else {
            Err(RuntimeError::returned(&self.name, self.returns, value.tag()))
        }
    }
}

impl FromStr for Signature {
    type Err = RuntimeError;

    fn from_str(text: &str) -> Result<Self> {
        Signature::parse(text)
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(", self.name)?;
        for (idx, param) in self.params.iter().enumerate() {
            if idx > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}: {}", param.name, param.tag)?;
        }
        write!(f, ")")?;
        if let Some(tag) = self.returns {
            write!(f, " -> {}", tag)?;
        }
        Ok(())
    }
}

/// Argument values bound to an action, in parameter order.
#[derive(Debug, Clone, PartialEq)]
pub struct Arguments {
    action: String,
    values: Vec<Value>,
}

impl Arguments {
    pub(crate) fn new(action: impl Into<String>, values: Vec<Value>) -> Self {
        Self {
            action: action.into(),
            values,
        }
    }

    /// Number of bound arguments.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether no arguments were bound.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Argument at `index`.
    pub fn get(&self, index: usize) -> Option<&Value> {
        self.values.get(index)
    }

    /// All argument values.
    pub fn values(&self) -> &[Value] {
        &self.values
    }

    /// Integer argument at `index`.
    pub fn integer(&self, index: usize) -> Result<i64> {
        self.get(index)
            .and_then(Value::as_integer)
            .ok_or_else(|| {
                RuntimeError::contract(&self.action, format!("argument {} is not an int", index))
            })
    }

    /// String argument at `index`.
    pub fn string(&self, index: usize) -> Result<&str> {
        self.get(index)
            .and_then(Value::as_str)
            .ok_or_else(|| {
                RuntimeError::contract(&self.action, format!("argument {} is not a str", index))
            })
    }
}

/// Immutable description of one registered skill or task.
#[derive(Clone)]
pub struct ActionDescriptor {
    signature: Signature,
    qualified_name: String,
    interactive: bool,
    prompt: Option<Prompt>,
    body: ActionFn,
}

impl ActionDescriptor {
    pub(crate) fn new(
        signature: Signature,
        qualified_name: String,
        interactive: bool,
        prompt: Option<Prompt>,
        body: ActionFn,
    ) -> Self {
        Self {
            signature,
            qualified_name,
            interactive,
            prompt,
            body,
        }
    }

    /// Name the action is invoked by.
    pub fn name(&self) -> &str {
        &self.signature.name
    }

    /// Name qualified by the chain of tasks that declared it.
    pub fn qualified_name(&self) -> &str {
        &self.qualified_name
    }

    /// Parameter/return contract.
    pub fn signature(&self) -> &Signature {
        &self.signature
    }

    /// True for tasks.
    pub fn is_interactive(&self) -> bool {
        self.interactive
    }

    /// Prompt given at declaration.
    pub fn prompt(&self) -> Option<&Prompt> {
        self.prompt.as_ref()
    }

    pub(crate) fn body(&self) -> &ActionFn {
        &self.body
    }
}

impl fmt::Debug for ActionDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActionDescriptor")
            .field("signature", &self.signature)
            .field("qualified_name", &self.qualified_name)
            .field("interactive", &self.interactive)
            .field("prompt", &self.prompt)
            .finish_non_exhaustive()
    }
}
