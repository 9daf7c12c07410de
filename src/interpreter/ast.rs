use serde::{Deserialize, Serialize};

/// Parsed action expression.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value")]
pub enum Expr {
    /// A bare identifier, invoked with no arguments.
    Identifier(String),
    /// String literal.
    String(String),
    /// Signed integer literal.
    Integer(i64),
    /// Invocation with an argument list.
    Call {
        /// Name of the action being invoked.
        name: String,
        /// Arguments in written order.
        args: Vec<Argument>,
    },
}

impl Expr {
    /// Name of the invoked action, if the expression is an invocation.
    pub fn action_name(&self) -> Option<&str> {
        match self {
            Expr::Identifier(name) | Expr::Call { name, .. } => Some(name),
            _ => None,
        }
    }
}

/// One argument of a call, optionally bound by keyword.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Argument {
    /// Parameter name for `name=value` arguments.
    pub keyword: Option<String>,
    /// Argument expression.
    pub value: Expr,
}

impl Argument {
    /// Positional argument.
    pub fn positional(value: Expr) -> Self {
        Self {
            keyword: None,
            value,
        }
    }

    /// Keyword argument.
    pub fn keyword(name: impl Into<String>, value: Expr) -> Self {
        Self {
            keyword: Some(name.into()),
            value,
        }
    }
}

/// Raw pieces of a declared signature, before tag validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureSyntax {
    /// Action name.
    pub name: String,
    /// `(parameter, tag name)` pairs in order.
    pub params: Vec<(String, String)>,
    /// Return tag name after `->`, if written.
    pub returns: Option<String>,
}
