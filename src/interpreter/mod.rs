//! Action expression language.
//!
//! Users answer a task's prompt with one action expression such as
//! `speak_number(add(1, get_variable("x")))`. This module provides the
//! value model, the AST, the parser, and the resolver that binds an
//! expression to the actions visible in the current scope.

/// Abstract syntax tree for action expressions and signatures.
pub mod ast;
/// Resolution of parsed expressions against the combined registry.
pub mod evaluator;
/// Recursive-descent parser for expressions and signatures.
pub mod parser;
/// Tagged runtime values.
pub mod value;

pub use ast::{Argument, Expr, SignatureSyntax};
pub use evaluator::{BoundArgument, Invocation, Plan, resolve};
pub use parser::{is_identifier, parse_action, parse_signature};
pub use value::{Value, ValueTag};
