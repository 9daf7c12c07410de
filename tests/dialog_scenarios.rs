use std::sync::Arc;

use parking_lot::Mutex;
use parley::calculator;
use parley::driver::run_scripted;
use parley::runtime::{
    ActionContext, Arguments, DialogEvent, Runtime, RuntimeConfig, RuntimeError, ScopeId,
};
use parley::Value;

fn calculator_runtime() -> Runtime {
    let mut runtime = Runtime::default();
    calculator::install(&mut runtime).expect("install calculator");
    runtime
}

fn action_names(runtime: &Runtime) -> Vec<String> {
    runtime.combined_registry().into_keys().collect()
}

#[test]
fn canonical_calculator_session() {
    let mut runtime = calculator_runtime();
    let mut out = Vec::new();
    let transcript = run_scripted(&mut runtime, calculator::TASK, &calculator::SCRIPT, &mut out)
        .expect("scripted session");

    let spoken: Vec<_> = transcript.spoken().collect();
    assert_eq!(
        spoken,
        [
            "You can ask me to do simple calculation operators!",
            "The result is 3.",
            "a created.",
            "b created.",
            "a assigned as 3.",
            "The result is 3.",
            "Sure! let me know what would you like to add",
            "1 added",
            "The result is 3.",
            "b assigned as 5.",
            "5 added",
            "The result is 6.",
        ]
    );

    let contexts: Vec<_> = transcript.turns.iter().map(|t| t.context.as_str()).collect();
    assert_eq!(&contexts[..6], ["calculator"; 6]);
    assert_eq!(&contexts[6..], ["calculator::add_many"; 5]);
    assert!(transcript.turns.iter().all(|turn| turn.error.is_none()));

    // back at the calculator prompt, add_many's registry is gone
    let prompt = runtime.current_prompt().expect("calculator waits");
    assert_eq!(prompt.qualified_name, "calculator");
    assert_eq!(runtime.scope_depth(), 2);
    let names = action_names(&runtime);
    assert!(!names.iter().any(|n| n == "add_once" || n == "exit_add"));

    let text = String::from_utf8(out).expect("utf8");
    assert!(text.starts_with(
        "agent says: \"You can ask me to do simple calculation operators!\"\n"
    ));
    assert!(text.contains(
        "context: calculator::add_many\nagent_prompt: 1 number(s) added so far\n"
    ));
}

#[test]
fn nested_call_speaks_once_and_returns_to_the_task() {
    let mut runtime = calculator_runtime();
    runtime.start(calculator::TASK).expect("start");
    runtime.take_spoken();

    let event = runtime.resume("speak_number(add(1, 2))").expect("resume");
    assert_eq!(runtime.take_spoken(), ["The result is 3."]);
    assert_eq!(event.as_prompt().expect("prompt").qualified_name, "calculator");
    assert_eq!(runtime.scope_depth(), 2);
}

#[test]
fn keyword_arguments_bind_by_name() {
    let mut runtime = calculator_runtime();
    runtime.start(calculator::TASK).expect("start");
    runtime.resume("create_variable(number=4, name='x')").expect("keywords");
    runtime.resume("speak_number(number=get_variable(name=\"x\"))").expect("nested keywords");
    assert_eq!(runtime.last_message(), "The result is 4.");
}

#[test]
fn accumulator_exit_hands_the_sum_to_the_enclosing_call() {
    let mut runtime = calculator_runtime();
    runtime.start(calculator::TASK).expect("start");
    let before = action_names(&runtime);

    let event = runtime.resume("speak_number(add_many())").expect("enter add_many");
    assert_eq!(event.as_prompt().expect("prompt").qualified_name, "calculator::add_many");
    assert_eq!(runtime.scope_depth(), 3);

    runtime.resume("add_once(4)").expect("add");
    runtime.resume("add_once(add(1, 2))").expect("add");
    runtime.take_spoken();
    runtime.resume("exit_add()").expect("exit");

    assert_eq!(runtime.take_spoken(), ["The result is 7."]);
    assert_eq!(runtime.scope_depth(), 2);
    assert_eq!(action_names(&runtime), before);
}

#[test]
fn repeat_replays_the_last_message() {
    let mut runtime = calculator_runtime();
    runtime.start(calculator::TASK).expect("start");
    runtime.resume("speak_number(9)").expect("speak");
    runtime.take_spoken();
    let depth = runtime.scope_depth();

    runtime.resume("repeat()").expect("repeat");
    runtime.resume("repeat").expect("bare identifier");
    assert_eq!(runtime.take_spoken(), ["The result is 9.", "The result is 9."]);
    assert_eq!(runtime.last_message(), "The result is 9.");
    assert_eq!(runtime.scope_depth(), depth);
}

#[test]
fn contract_errors_leave_the_dialog_where_it_was() {
    let mut runtime = calculator_runtime();
    runtime.start(calculator::TASK).expect("start");
    runtime.resume("speak_number(add_many())").expect("enter add_many");
    let names = action_names(&runtime);

    for (input, check) in [
        ("add(\"x\", 1)", "contract"),
        ("add(1)", "contract"),
        ("add(1, 2, 3)", "contract"),
        ("add(1, c=2)", "contract"),
        ("speak_number(create_variable(\"q\", 1))", "contract"),
        ("divide(4, 2)", "unknown"),
        ("add(1, 2", "parse"),
        ("add_once(get_variable(\"missing\"))", "failed"),
    ] {
        let err = runtime.resume(input).expect_err(input);
        let matched = match check {
            "contract" => matches!(err, RuntimeError::ArgumentContract { .. }),
            "unknown" => matches!(err, RuntimeError::UnknownAction(_)),
            "parse" => matches!(err, RuntimeError::Parse(_)),
            _ => matches!(err, RuntimeError::ActionFailed { .. }),
        };
        assert!(matched, "{input}: {err:?}");
        assert!(err.is_recoverable());

        let prompt = runtime.current_prompt().expect("still waiting");
        assert_eq!(prompt.qualified_name, "calculator::add_many");
        assert_eq!(runtime.scope_depth(), 3);
        assert_eq!(action_names(&runtime), names);
    }
}

#[test]
fn driver_misuse_is_reported() {
    let mut runtime = calculator_runtime();
    assert!(matches!(runtime.resume("add(1, 2)"), Err(RuntimeError::NoActiveDialog)));
    runtime.start(calculator::TASK).expect("start");
    assert!(matches!(runtime.start(calculator::TASK), Err(RuntimeError::DialogActive)));
    let declared = runtime.declare_skill(
        "half(x: float) -> int",
        |_ctx: &mut ActionContext<'_>, _args: &Arguments| Ok(Value::None),
    );
    assert!(matches!(declared, Err(RuntimeError::SchemaViolation { .. })));
}

/// `top` > `outer` > `middle` > `inner`, where `inner` can exit straight to
/// `outer` with 42.
fn nested_runtime() -> Runtime {
    let mut runtime = Runtime::default();
    runtime.declare_task("top()", None, top).expect("declare top");
    runtime
}

fn top(ctx: &mut ActionContext<'_>, _args: &Arguments) -> anyhow::Result<Value> {
    ctx.declare_skill("report(n: int)", |ctx: &mut ActionContext<'_>, args: &Arguments| {
        ctx.say(format!("got {}", args.integer(0)?));
        Ok(Value::None)
    })?;
    ctx.declare_task("outer() -> int", None, outer)?;
    Ok(Value::None)
}

fn outer(ctx: &mut ActionContext<'_>, _args: &Arguments) -> anyhow::Result<Value> {
    let outer = ctx.current_scope();
    ctx.declare_task(
        "middle() -> int",
        None,
        move |ctx: &mut ActionContext<'_>, _args: &Arguments| {
            ctx.declare_task(
                "inner() -> int",
                None,
                move |ctx: &mut ActionContext<'_>, _args: &Arguments| {
                    ctx.declare_skill(
                        "bail()",
                        move |ctx: &mut ActionContext<'_>, _args: &Arguments| {
                            ctx.request_exit(Some(Value::Integer(42)), Some(outer));
                            Ok(Value::None)
                        },
                    )?;
                    Ok(Value::None)
                },
            )?;
            Ok(Value::None)
        },
    )?;
    Ok(Value::None)
}

#[test]
fn exit_to_an_ancestor_unwinds_every_inner_scope() {
    let mut runtime = nested_runtime();
    runtime.start("top").expect("start");
    let at_top = action_names(&runtime);

    runtime.resume("report(outer())").expect("outer");
    runtime.resume("middle()").expect("middle");
    let event = runtime.resume("inner()").expect("inner");
    assert_eq!(
        event.as_prompt().expect("prompt").qualified_name,
        "top::outer::middle::inner"
    );
    assert_eq!(runtime.scope_depth(), 5);

    let event = runtime.resume("bail()").expect("bail");
    assert_eq!(event.as_prompt().expect("prompt").qualified_name, "top");
    assert_eq!(runtime.take_spoken(), ["got 42"]);
    assert_eq!(runtime.scope_depth(), 2);
    assert_eq!(action_names(&runtime), at_top);
}

fn counter(ctx: &mut ActionContext<'_>, _args: &Arguments) -> anyhow::Result<Value> {
    ctx.declare_skill("stop()", |ctx: &mut ActionContext<'_>, _args: &Arguments| {
        ctx.request_exit(None, None);
        Ok(Value::None)
    })?;
    ctx.declare_skill("clear()", |ctx: &mut ActionContext<'_>, _args: &Arguments| {
        ctx.request_exit(Some(Value::None), None);
        Ok(Value::None)
    })?;
    Ok(Value::Integer(7))
}

#[test]
fn exit_without_value_returns_the_task_result() {
    let mut runtime = Runtime::default();
    runtime.declare_task("counter() -> int", None, counter).expect("declare counter");

    runtime.start("counter").expect("start");
    match runtime.resume("stop()").expect("stop") {
        DialogEvent::Exit(exit) => assert_eq!(exit.value, Value::Integer(7)),
        other => panic!("unexpected event {other}"),
    }
    assert!(!runtime.is_active());
    assert_eq!(runtime.scope_depth(), 1);
}

#[test]
fn exit_carrying_none_is_not_replaced_by_the_task_result() {
    let mut runtime = Runtime::default();
    runtime.declare_task("counter() -> int", None, counter).expect("declare counter");

    runtime.start("counter").expect("start");
    let err = runtime.resume("clear()").expect_err("none is not an int");
    assert!(matches!(err, RuntimeError::ReturnContract { .. }));
    assert!(err.is_recoverable());
    assert_eq!(runtime.current_prompt().expect("prompt").qualified_name, "counter");
    assert_eq!(runtime.scope_depth(), 2);
}

fn picky(ctx: &mut ActionContext<'_>, _args: &Arguments) -> anyhow::Result<Value> {
    let scope = ctx.current_scope();
    ctx.declare_skill("give_up()", move |ctx: &mut ActionContext<'_>, _args: &Arguments| {
        ctx.request_exit(Some(Value::from("text")), Some(scope));
        Ok(Value::None)
    })?;
    Ok(Value::Integer(0))
}

#[test]
fn exit_breaking_the_return_contract_keeps_the_task_waiting() {
    let mut runtime = Runtime::default();
    runtime
        .declare_task("main()", None, |ctx: &mut ActionContext<'_>, _args: &Arguments| {
            ctx.declare_task("picky() -> int", None, picky)?;
            Ok(Value::None)
        })
        .expect("declare main");

    runtime.start("main").expect("start");
    runtime.resume("picky()").expect("picky");
    let names = action_names(&runtime);

    let err = runtime.resume("give_up()").expect_err("str is not an int");
    assert!(matches!(err, RuntimeError::ReturnContract { .. }));
    assert!(runtime.is_active());
    assert_eq!(
        runtime.current_prompt().expect("prompt").qualified_name,
        "main::picky"
    );
    assert_eq!(runtime.scope_depth(), 3);
    assert_eq!(action_names(&runtime), names);
}

#[test]
fn exit_to_root_ends_the_dialog() {
    let mut runtime = Runtime::default();
    runtime
        .declare_task("shell()", None, |ctx: &mut ActionContext<'_>, _args: &Arguments| {
            ctx.declare_task("sub()", None, |ctx: &mut ActionContext<'_>, _args: &Arguments| {
                ctx.declare_skill("quit()", |ctx: &mut ActionContext<'_>, _args: &Arguments| {
                    ctx.request_exit(Some(Value::from("bye")), Some(ScopeId::ROOT));
                    Ok(Value::None)
                })?;
                Ok(Value::None)
            })?;
            Ok(Value::None)
        })
        .expect("declare shell");

    runtime.start("shell").expect("start");
    runtime.resume("sub").expect("sub");
    match runtime.resume("quit").expect("quit") {
        DialogEvent::Exit(exit) => {
            assert_eq!(exit.target, ScopeId::ROOT);
            assert_eq!(exit.value, Value::from("bye"));
        }
        other => panic!("unexpected event {other}"),
    }
    assert_eq!(runtime.scope_depth(), 1);
}

#[test]
fn exit_to_a_finished_scope_aborts_the_dialog() {
    let mut runtime = Runtime::default();
    runtime
        .declare_task("main()", None, |ctx: &mut ActionContext<'_>, _args: &Arguments| {
            let remembered: Arc<Mutex<Option<ScopeId>>> = Arc::default();
            let slot = remembered.clone();
            ctx.declare_task(
                "child()",
                None,
                move |ctx: &mut ActionContext<'_>, _args: &Arguments| {
                    *slot.lock() = Some(ctx.current_scope());
                    ctx.declare_skill("done()", |ctx: &mut ActionContext<'_>, _args: &Arguments| {
                        ctx.request_exit(None, None);
                        Ok(Value::None)
                    })?;
                    Ok(Value::None)
                },
            )?;
            ctx.declare_skill("stale()", move |ctx: &mut ActionContext<'_>, _args: &Arguments| {
                let target = remembered.lock().unwrap_or(ScopeId::ROOT);
                ctx.request_exit(None, Some(target));
                Ok(Value::None)
            })?;
            Ok(Value::None)
        })
        .expect("declare main");

    runtime.start("main").expect("start");
    runtime.resume("child()").expect("child");
    runtime.resume("done()").expect("done");
    assert_eq!(runtime.scope_depth(), 2);

    let err = runtime.resume("stale()").expect_err("dangling");
    assert!(matches!(err, RuntimeError::DanglingExit(_)));
    assert!(!err.is_recoverable());
    assert!(!runtime.is_active());
    assert_eq!(runtime.scope_depth(), 1);
    assert!(runtime.current_prompt().is_none());
}

#[test]
fn failing_task_bodies_release_their_scope() {
    let mut runtime = Runtime::default();
    runtime
        .declare_task("main()", None, |ctx: &mut ActionContext<'_>, _args: &Arguments| {
            ctx.declare_task("broken()", None, |ctx: &mut ActionContext<'_>, _args: &Arguments| {
                ctx.declare_skill("orphan()", |_ctx: &mut ActionContext<'_>, _args: &Arguments| {
                    Ok(Value::None)
                })?;
                anyhow::bail!("setup failed")
            })?;
            ctx.declare_skill("wrong() -> int", |_ctx: &mut ActionContext<'_>, _args: &Arguments| {
                Ok(Value::from("not a number"))
            })?;
            Ok(Value::None)
        })
        .expect("declare main");

    runtime.start("main").expect("start");
    let names = action_names(&runtime);

    let err = runtime.resume("broken()").expect_err("body fails");
    assert!(matches!(err, RuntimeError::ActionFailed { .. }));
    assert_eq!(runtime.scope_depth(), 2);
    assert_eq!(action_names(&runtime), names);

    let err = runtime.resume("wrong()").expect_err("bad return");
    assert!(matches!(err, RuntimeError::ReturnContract { .. }));
    assert!(runtime.current_prompt().is_some());
}

#[test]
fn scope_depth_limit_is_recoverable() {
    let mut runtime = Runtime::new(RuntimeConfig {
        max_scope_depth: 2,
        ..RuntimeConfig::default()
    });
    runtime
        .declare_task("deeper()", None, |_ctx: &mut ActionContext<'_>, _args: &Arguments| {
            Ok(Value::None)
        })
        .expect("declare deeper");

    runtime.start("deeper").expect("start");
    runtime.resume("deeper").expect("second level");
    assert_eq!(runtime.scope_depth(), 3);

    let err = runtime.resume("deeper").expect_err("too deep");
    assert!(matches!(err, RuntimeError::ScopeDepthExceeded(2)));
    assert_eq!(runtime.scope_depth(), 3);
    assert!(runtime.is_active());
}
