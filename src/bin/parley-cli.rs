//! Parley CLI - Command-line interface for the Parley runtime
//!
//! Runs the sample calculator dialog from a script or interactively, and
//! inspects its task tree.

use anyhow::Context;
use clap::{Parser, Subcommand};
use parley::calculator;
use parley::driver::{run_inspection, run_interactive, run_scripted};
use parley::runtime::{Runtime, RuntimeConfig};
use std::io;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "parley")]
#[command(about = "Scoped, resumable dialog runtime", long_about = None)]
struct Cli {
    /// JSON runtime configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable debug tracing on stderr
    #[arg(long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay a scripted calculator session
    Script {
        /// File with one action per line (default: built-in session)
        #[arg(short, long)]
        file: Option<PathBuf>,
    },

    /// List every calculator context and the actions available in it
    Inspect {
        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Talk to the calculator over stdin
    Repl,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => RuntimeConfig::load(path)?,
        None => RuntimeConfig::default(),
    };
    config.debug |= cli.debug;

    let level = if config.debug { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();

    let mut runtime = Runtime::new(config);
    calculator::install(&mut runtime)?;
    let mut stdout = io::stdout().lock();

    match cli.command {
        Commands::Script { file } => {
            let inputs: Vec<String> = match file {
                Some(path) => std::fs::read_to_string(&path)
                    .with_context(|| format!("Failed to read script: {:?}", path))?
                    .lines()
                    .map(str::trim)
                    .filter(|line| !line.is_empty())
                    .map(String::from)
                    .collect(),
                None => calculator::SCRIPT.iter().map(|line| line.to_string()).collect(),
            };
            run_scripted(&mut runtime, calculator::TASK, &inputs, &mut stdout)?;
        }

        Commands::Inspect { json } => {
            if json {
                let report = runtime.inspect(calculator::TASK)?;
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                run_inspection(&mut runtime, calculator::TASK, &mut stdout)?;
            }
        }

        Commands::Repl => {
            let stdin = io::stdin().lock();
            run_interactive(&mut runtime, calculator::TASK, stdin, &mut stdout)?;
        }
    }

    Ok(())
}
