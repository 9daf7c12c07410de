use std::sync::Arc;

use super::ast::{Argument, Expr};
use super::value::{Value, ValueTag};
use crate::runtime::descriptor::ActionDescriptor;
use crate::runtime::error::{Result, RuntimeError};
use crate::runtime::scope::CombinedRegistry;

/// Resolved argument expression.
#[derive(Debug, Clone)]
pub enum Plan {
    /// Value known up front.
    Literal(Value),
    /// Nested invocation evaluated before the enclosing call proceeds.
    Invoke(Invocation),
}

impl Plan {
    /// Tag the plan is statically known to produce.
    pub fn tag(&self) -> Option<ValueTag> {
        match self {
            Plan::Literal(value) => value.tag(),
            Plan::Invoke(invocation) => invocation.descriptor.signature().returns,
        }
    }
}

/// Argument plan bound to a parameter slot.
#[derive(Debug, Clone)]
pub struct BoundArgument {
    /// Parameter index the value fills.
    pub slot: usize,
    /// How the value is produced.
    pub plan: Plan,
}

/// An action resolved against the combined registry, ready to run.
#[derive(Debug, Clone)]
pub struct Invocation {
    /// Action being invoked.
    pub descriptor: Arc<ActionDescriptor>,
    /// Arguments in evaluation (written) order.
    pub args: Vec<BoundArgument>,
}

impl Invocation {
    /// Invoke `descriptor` with placeholder values for every parameter.
    pub fn with_placeholders(descriptor: Arc<ActionDescriptor>) -> Self {
        let args = descriptor
            .signature()
            .params
            .iter()
            .enumerate()
            .map(|(slot, param)| BoundArgument {
                slot,
                plan: Plan::Literal(param.tag.placeholder()),
            })
            .collect();
        Self { descriptor, args }
    }

    /// Number of parameter slots to fill.
    pub fn arity(&self) -> usize {
        self.descriptor.signature().params.len()
    }
}

/// Resolve a parsed action expression against `registry`.
///
/// Every identifier in the tree is looked up before anything runs, and
/// arity, keywords and statically known tags are checked here so that a bad
/// expression is rejected without opening any sub-dialog.
pub fn resolve(expr: &Expr, registry: &CombinedRegistry) -> Result<Invocation> {
    match expr {
        Expr::Identifier(name) => resolve_call(name, &[], registry),
        Expr::Call { name, args } => resolve_call(name, args, registry),
        other => Err(RuntimeError::Parse(format!(
            "expected an action invocation, found {:?}",
            other
        ))),
    }
}

fn resolve_plan(expr: &Expr, registry: &CombinedRegistry) -> Result<Plan> {
    match expr {
        Expr::Integer(num) => Ok(Plan::Literal(Value::Integer(*num))),
        Expr::String(text) => Ok(Plan::Literal(Value::String(text.clone()))),
        Expr::Identifier(_) | Expr::Call { .. } => Ok(Plan::Invoke(resolve(expr, registry)?)),
    }
}

fn resolve_call(name: &str, args: &[Argument], registry: &CombinedRegistry) -> Result<Invocation> {
    let descriptor = registry
        .get(name)
        .cloned()
        .ok_or_else(|| RuntimeError::UnknownAction(name.to_string()))?;
    let signature = descriptor.signature();

    let mut filled = vec![false; signature.params.len()];
    let mut bound = Vec::with_capacity(args.len());
    let mut next_positional = 0;
    let mut seen_keyword = false;

    for arg in args {
        let slot = match &arg.keyword {
            Some(keyword) => {
                seen_keyword = true;
                signature.position(keyword).ok_or_else(|| {
                    RuntimeError::contract(
                        name,
                        format!("unexpected keyword argument '{}'", keyword),
                    )
                })?
            }
            None => {
                if seen_keyword {
                    return Err(RuntimeError::contract(
                        name,
                        "positional argument follows keyword argument",
                    ));
                }
                let slot = next_positional;
                next_positional += 1;
                if slot >= signature.params.len() {
                    return Err(RuntimeError::contract(
                        name,
                        format!(
                            "expected {} arguments, received {}",
                            signature.params.len(),
                            args.len()
                        ),
                    ));
                }
                slot
            }
        };

        let param = &signature.params[slot];
        if filled[slot] {
            return Err(RuntimeError::contract(
                name,
                format!("parameter '{}' bound more than once", param.name),
            ));
        }
        filled[slot] = true;

        let plan = resolve_plan(&arg.value, registry)?;
        if plan.tag() != Some(param.tag) {
            let found = plan
                .tag()
                .map(|tag| tag.to_string())
                .unwrap_or_else(|| "none".to_string());
            return Err(RuntimeError::contract(
                name,
                format!("parameter '{}' expects {}, received {}", param.name, param.tag, found),
            ));
        }
        bound.push(BoundArgument { slot, plan });
    }

    if let Some(missing) = filled.iter().position(|done| !done) {
        return Err(RuntimeError::contract(
            name,
            format!("missing argument '{}'", signature.params[missing].name),
        ));
    }

    Ok(Invocation {
        descriptor,
        args: bound,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interpreter::parser::parse_action;
    use crate::runtime::context::ActionContext;
    use crate::runtime::descriptor::{Arguments, Signature};

    fn registry() -> CombinedRegistry {
        let mut registry = CombinedRegistry::new();
        let mut add = |sig: Signature, interactive: bool| {
            let name = sig.name.clone();
            registry.insert(
                name.clone(),
                Arc::new(ActionDescriptor::new(
                    sig,
                    name,
                    interactive,
                    None,
                    Arc::new(|_ctx: &mut ActionContext<'_>, _args: &Arguments| Ok(Value::None)),
                )),
            );
        };
        add(
            Signature::parse("add(a: int, b: int) -> int").unwrap(),
            false,
        );
        add(Signature::parse("speak_number(number: int)").unwrap(), false);
        add(
            Signature::parse("create_variable(name: str, number: int)").unwrap(),
            false,
        );
        add(Signature::parse("add_many() -> int").unwrap(), true);
        add(Signature::parse("end_calculator()").unwrap(), false);
        registry
    }

    fn resolve_text(text: &str) -> Result<Invocation> {
        resolve(&parse_action(text).unwrap(), &registry())
    }

    #[test]
    fn resolves_nested_invocations() {
        let invocation = resolve_text("speak_number(add(1, add_many()))").expect("resolve");
        assert_eq!(invocation.descriptor.name(), "speak_number");
        let Plan::Invoke(inner) = &invocation.args[0].plan else {
            panic!("expected nested invocation");
        };
        assert_eq!(inner.descriptor.name(), "add");
        assert!(matches!(inner.args[0].plan, Plan::Literal(Value::Integer(1))));
        assert!(matches!(
            &inner.args[1].plan,
            Plan::Invoke(task) if task.descriptor.is_interactive()
        ));
    }

    #[test]
    fn keywords_bind_by_name_in_written_order() {
        let invocation = resolve_text(r#"create_variable(number=1, name="a")"#).expect("resolve");
        let slots: Vec<usize> = invocation.args.iter().map(|arg| arg.slot).collect();
        assert_eq!(slots, vec![1, 0]);

        let mixed = resolve_text(r#"create_variable("a", number=2)"#).expect("resolve");
        assert_eq!(mixed.args.len(), 2);
    }

    #[test]
    fn unknown_names_are_reported() {
        assert!(matches!(
            resolve_text("subtract(1, 2)"),
            Err(RuntimeError::UnknownAction(name)) if name == "subtract"
        ));
        assert!(matches!(
            resolve_text("speak_number(mystery())"),
            Err(RuntimeError::UnknownAction(name)) if name == "mystery"
        ));
    }

    #[test]
    fn contract_mismatches_are_rejected_up_front() {
        for text in [
            "add(1)",
            "add(1, 2, 3)",
            r#"add(1, "2")"#,
            "speak_number(end_calculator())",
            "add(a=1, a=2)",
            "add(a=1, c=2)",
            "add(a=1, 2)",
            "add(1, a=2)",
        ] {
            let err = resolve_text(text).expect_err(text);
            assert!(matches!(err, RuntimeError::ArgumentContract { .. }), "{text}: {err:?}");
        }
    }

    #[test]
    fn placeholders_fill_every_parameter() {
        let registry = registry();
        let invocation = Invocation::with_placeholders(registry["create_variable"].clone());
        assert_eq!(invocation.arity(), 2);
        assert!(matches!(
            &invocation.args[0].plan,
            Plan::Literal(Value::String(text)) if text.is_empty()
        ));
        assert!(matches!(invocation.args[1].plan, Plan::Literal(Value::Integer(0))));
    }
}
