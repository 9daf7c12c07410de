//! Textual drivers
//!
//! A driver owns the loop around a [`Runtime`]: it starts a task, prints the
//! context and prompt of every suspension, feeds one action per prompt, and
//! prints whatever the agent said in between.

use std::io::{BufRead, Write};

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::interpreter::value::Value;
use crate::runtime::{DialogEvent, Runtime, RuntimeError};

/// One prompt/answer exchange.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    /// Qualified name of the task that asked.
    pub context: String,
    /// Prompt text, empty when the task has none.
    pub prompt: String,
    /// Action the user supplied.
    pub input: String,
    /// Lines spoken while handling the action.
    pub spoken: Vec<String>,
    /// Rejection message for a recoverable error.
    pub error: Option<String>,
}

/// Record of a scripted dialog.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transcript {
    /// Lines spoken before the first prompt.
    pub opening: Vec<String>,
    /// Exchanges in order.
    pub turns: Vec<Turn>,
    /// Final value, once the outermost task finished.
    pub result: Option<Value>,
}

impl Transcript {
    /// Every spoken line, in order.
    pub fn spoken(&self) -> impl Iterator<Item = &str> {
        self.opening
            .iter()
            .chain(self.turns.iter().flat_map(|turn| turn.spoken.iter()))
            .map(String::as_str)
    }
}

fn print_spoken(out: &mut impl Write, spoken: &[String]) -> anyhow::Result<()> {
    for line in spoken {
        writeln!(out, "agent says: \"{}\"", line)?;
    }
    Ok(())
}

fn print_prompt(out: &mut impl Write, event: &DialogEvent) -> anyhow::Result<()> {
    if let DialogEvent::Prompt(prompt) = event {
        writeln!(out, "context: {}", prompt.qualified_name)?;
        if !prompt.prompt.is_empty() {
            writeln!(out, "agent_prompt: {}", prompt.prompt)?;
        }
    }
    Ok(())
}

/// Handle one user action; recoverable errors are reported and swallowed.
fn feed(
    runtime: &mut Runtime,
    input: &str,
) -> anyhow::Result<(Option<DialogEvent>, Option<String>)> {
    match runtime.resume(input) {
        Ok(event) => Ok((Some(event), None)),
        Err(err) if err.is_recoverable() => Ok((None, Some(err.to_string()))),
        Err(err) => Err(err).with_context(|| format!("Dialog aborted at input: {}", input)),
    }
}

/// Run `task` and answer its prompts with `inputs`, one per prompt.
///
/// Stops early when the dialog finishes; inputs left over are ignored.
pub fn run_scripted<S: AsRef<str>>(
    runtime: &mut Runtime,
    task: &str,
    inputs: &[S],
    out: &mut impl Write,
) -> anyhow::Result<Transcript> {
    let mut transcript = Transcript::default();
    let mut event = runtime
        .start(task)
        .with_context(|| format!("Failed to start task: {}", task))?;
    transcript.opening = runtime.take_spoken();
    print_spoken(out, &transcript.opening)?;

    for input in inputs {
        let input = input.as_ref();
        let DialogEvent::Prompt(prompt) = &event else {
            break;
        };
        let mut turn = Turn {
            context: prompt.qualified_name.clone(),
            prompt: prompt.prompt.clone(),
            input: input.to_string(),
            ..Turn::default()
        };
        print_prompt(out, &event)?;
        writeln!(out, "user: {}", input)?;

        let (next, error) = feed(runtime, input)?;
        turn.spoken = runtime.take_spoken();
        print_spoken(out, &turn.spoken)?;
        if let Some(error) = &error {
            writeln!(out, "rejected: {}", error)?;
        }
        turn.error = error;
        transcript.turns.push(turn);

        if let Some(next) = next {
            event = next;
        }
    }

    if let DialogEvent::Exit(exit) = event {
        writeln!(out, "result: {}", exit.value)?;
        transcript.result = Some(exit.value);
    }
    Ok(transcript)
}

/// Print every scope reachable from `task` and the actions visible in it.
pub fn run_inspection(
    runtime: &mut Runtime,
    task: &str,
    out: &mut impl Write,
) -> anyhow::Result<()> {
    let report = runtime
        .inspect(task)
        .with_context(|| format!("Failed to inspect task: {}", task))?;
    write!(out, "{}", report)?;
    Ok(())
}

/// Run `task` interactively, reading one action per line from `input`.
///
/// Blank lines are skipped. Returns the dialog result, or `None` if the
/// input ended first.
pub fn run_interactive(
    runtime: &mut Runtime,
    task: &str,
    input: impl BufRead,
    out: &mut impl Write,
) -> anyhow::Result<Option<Value>> {
    let mut event = runtime
        .start(task)
        .with_context(|| format!("Failed to start task: {}", task))?;
    print_spoken(out, &runtime.take_spoken())?;

    let mut lines = input.lines();
    loop {
        if let DialogEvent::Exit(exit) = &event {
            writeln!(out, "result: {}", exit.value)?;
            return Ok(Some(exit.value.clone()));
        }
        print_prompt(out, &event)?;
        write!(out, "> ")?;
        out.flush()?;

        let Some(line) = lines.next() else {
            return Ok(None);
        };
        let line = line.context("Failed to read input")?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let (next, error) = feed(runtime, line)?;
        print_spoken(out, &runtime.take_spoken())?;
        if let Some(error) = error {
            writeln!(out, "rejected: {}", error)?;
        }
        if let Some(next) = next {
            event = next;
        }
    }
}
