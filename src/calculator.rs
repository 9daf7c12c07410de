//! Sample calculator dialog
//!
//! A small agent that keeps named integer variables, adds numbers, and can
//! enter a guided sub-dialog (`add_many`) that accumulates numbers until the
//! user asks it to stop. Used by the CLI demo and the integration tests.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::bail;
use parking_lot::Mutex;

use crate::interpreter::value::Value;
use crate::runtime::{ActionContext, Arguments, Prompt, Result, Runtime};

/// Name of the top-level task.
pub const TASK: &str = "calculator";

/// Canonical session exercising nested calls, variables, and the guided
/// `add_many` sub-dialog.
pub const SCRIPT: [&str; 11] = [
    "speak_number(add(1, 2))",
    "create_variable(\"a\", 1)",
    "create_variable(\"b\", add(get_variable(\"a\"), 1))",
    "assign(\"a\", add(get_variable(\"a\"), get_variable(\"b\")))",
    "speak_number(get_variable(\"a\"))",
    "speak_number(add_many())",
    "add_once(1)",
    "speak_number(add(1, 2))",
    "assign(\"b\", add(get_variable(\"a\"), get_variable(\"b\")))",
    "add_once(get_variable(\"b\"))",
    "exit_add()",
];

/// Declare the `calculator` task in the root scope of `runtime`.
pub fn install(runtime: &mut Runtime) -> Result<()> {
    runtime.declare_task("calculator() -> none", None, calculator)?;
    Ok(())
}

fn calculator(ctx: &mut ActionContext<'_>, _args: &Arguments) -> anyhow::Result<Value> {
    let variables: Arc<Mutex<HashMap<String, i64>>> = Arc::default();

    let vars = variables.clone();
    ctx.declare_skill(
        "create_variable(name: str, number: int)",
        move |ctx: &mut ActionContext<'_>, args: &Arguments| {
            let name = args.string(0)?;
            vars.lock().insert(name.to_string(), args.integer(1)?);
            ctx.say(format!("{} created.", name));
            Ok(Value::None)
        },
    )?;

    let vars = variables.clone();
    ctx.declare_skill(
        "get_variable(name: str) -> int",
        move |_ctx: &mut ActionContext<'_>, args: &Arguments| {
            let name = args.string(0)?;
            match vars.lock().get(name) {
                Some(number) => Ok(Value::Integer(*number)),
                None => bail!("variable '{}' does not exist", name),
            }
        },
    )?;

    ctx.declare_skill(
        "add(a: int, b: int) -> int",
        |_ctx: &mut ActionContext<'_>, args: &Arguments| {
            let (a, b) = (args.integer(0)?, args.integer(1)?);
            match a.checked_add(b) {
                Some(sum) => Ok(Value::Integer(sum)),
                None => bail!("{} + {} overflows", a, b),
            }
        },
    )?;

    ctx.declare_task("add_many() -> int", None, add_many)?;

    let vars = variables;
    ctx.declare_skill(
        "assign(name: str, number: int)",
        move |ctx: &mut ActionContext<'_>, args: &Arguments| {
            let name = args.string(0)?;
            let number = args.integer(1)?;
            let known = match vars.lock().get_mut(name) {
                Some(slot) => {
                    *slot = number;
                    true
                }
                None => false,
            };
            if known {
                ctx.say(format!("{} assigned as {}.", name, number));
            } else {
                ctx.say(format!("{} not exist", name));
            }
            Ok(Value::None)
        },
    )?;

    ctx.declare_skill(
        "speak_number(number: int)",
        |ctx: &mut ActionContext<'_>, args: &Arguments| {
            ctx.say(format!("The result is {}.", args.integer(0)?));
            Ok(Value::None)
        },
    )?;

    ctx.declare_skill(
        "end_calculator()",
        |ctx: &mut ActionContext<'_>, _args: &Arguments| {
            ctx.say("Bye.");
            Ok(Value::None)
        },
    )?;

    ctx.say("You can ask me to do simple calculation operators!");
    Ok(Value::None)
}

fn add_many(ctx: &mut ActionContext<'_>, _args: &Arguments) -> anyhow::Result<Value> {
    let numbers: Arc<Mutex<Vec<i64>>> = Arc::default();
    let scope = ctx.current_scope();
    ctx.say("Sure! let me know what would you like to add");

    let added = numbers.clone();
    ctx.set_prompt(Prompt::supplier(move || {
        format!("{} number(s) added so far", added.lock().len())
    }));

    let added = numbers.clone();
    ctx.declare_skill(
        "add_once(number: int)",
        move |ctx: &mut ActionContext<'_>, args: &Arguments| {
            let number = args.integer(0)?;
            added.lock().push(number);
            ctx.say(format!("{} added", number));
            Ok(Value::None)
        },
    )?;

    ctx.declare_skill(
        "exit_add()",
        move |ctx: &mut ActionContext<'_>, _args: &Arguments| {
            let sum = numbers
                .lock()
                .iter()
                .try_fold(0i64, |total, number| total.checked_add(*number));
            let Some(sum) = sum else {
                bail!("sum of the added numbers overflows");
            };
            ctx.request_exit(Some(Value::Integer(sum)), Some(scope));
            Ok(Value::None)
        },
    )?;

    Ok(Value::None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::{DialogEvent, RuntimeError};

    fn calculator_runtime() -> Runtime {
        let mut runtime = Runtime::default();
        install(&mut runtime).unwrap();
        runtime
    }

    #[test]
    fn greets_and_waits_at_the_calculator_prompt() {
        let mut runtime = calculator_runtime();
        let event = runtime.start(TASK).unwrap();
        let prompt = event.as_prompt().expect("prompt");
        assert_eq!(prompt.qualified_name, "calculator");
        assert_eq!(
            prompt.action_names(),
            [
                "add",
                "add_many",
                "assign",
                "calculator",
                "create_variable",
                "end_calculator",
                "get_variable",
                "repeat",
                "speak_number",
            ]
        );
        assert_eq!(
            runtime.take_spoken(),
            ["You can ask me to do simple calculation operators!"]
        );
    }

    #[test]
    fn unknown_variables_fail_without_leaving_the_prompt() {
        let mut runtime = calculator_runtime();
        runtime.start(TASK).unwrap();
        let err = runtime.resume("speak_number(get_variable(\"zz\"))").unwrap_err();
        assert!(matches!(err, RuntimeError::ActionFailed { .. }));
        assert!(runtime.current_prompt().is_some());
        assert_eq!(runtime.scope_depth(), 2);
    }

    #[test]
    fn overflowing_addition_fails_without_leaving_the_prompt() {
        let mut runtime = calculator_runtime();
        runtime.start(TASK).unwrap();
        runtime.take_spoken();
        let err = runtime
            .resume("speak_number(add(9223372036854775807, 1))")
            .unwrap_err();
        assert!(matches!(err, RuntimeError::ActionFailed { .. }));
        assert!(runtime.take_spoken().is_empty());
        assert_eq!(runtime.current_prompt().unwrap().qualified_name, "calculator");
        assert_eq!(runtime.scope_depth(), 2);
    }

    #[test]
    fn overflowing_sum_keeps_the_add_many_prompt() {
        let mut runtime = calculator_runtime();
        runtime.start(TASK).unwrap();
        runtime.resume("speak_number(add_many())").unwrap();
        runtime.resume("add_once(9223372036854775807)").unwrap();
        runtime.resume("add_once(1)").unwrap();
        let err = runtime.resume("exit_add()").unwrap_err();
        assert!(matches!(err, RuntimeError::ActionFailed { .. }));
        assert_eq!(
            runtime.current_prompt().unwrap().qualified_name,
            "calculator::add_many"
        );
        assert_eq!(runtime.scope_depth(), 3);
    }

    #[test]
    fn assign_reports_missing_variables() {
        let mut runtime = calculator_runtime();
        runtime.start(TASK).unwrap();
        runtime.take_spoken();
        runtime.resume("assign(\"q\", 4)").unwrap();
        assert_eq!(runtime.take_spoken(), ["q not exist"]);
    }

    #[test]
    fn end_calculator_only_says_goodbye() {
        let mut runtime = calculator_runtime();
        runtime.start(TASK).unwrap();
        runtime.take_spoken();
        let event = runtime.resume("end_calculator()").unwrap();
        match event {
            DialogEvent::Prompt(prompt) => assert_eq!(prompt.qualified_name, "calculator"),
            other => panic!("unexpected event {other}"),
        }
        assert_eq!(runtime.take_spoken(), ["Bye."]);
        assert!(runtime.is_active());
        assert_eq!(runtime.scope_depth(), 2);
    }

    #[test]
    fn add_many_prompt_tracks_progress() {
        let mut runtime = calculator_runtime();
        runtime.start(TASK).unwrap();
        let event = runtime.resume("speak_number(add_many())").unwrap();
        assert_eq!(event.as_prompt().expect("prompt").prompt, "0 number(s) added so far");
        let event = runtime.resume("add_once(5)").unwrap();
        let prompt = event.as_prompt().expect("prompt");
        assert_eq!(prompt.prompt, "1 number(s) added so far");
        assert_eq!(prompt.qualified_name, "calculator::add_many");
    }
}
