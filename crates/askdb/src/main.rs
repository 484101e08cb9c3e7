#![forbid(unsafe_code)]

use std::path::PathBuf;

use anyhow::{Result, anyhow};
use askdb::cli::app::{Cli, Command, RuntimeArgs};
use askdb::cli::commands;
use askdb::config::RuntimePaths;
use askdb::models::UnansweredQuestion;
use askdb::sqlite::SchemaUnavailable;
use clap::Parser;
use clap::error::ErrorKind;
use tracing_subscriber::EnvFilter;

const EXIT_SUCCESS: i32 = 0;
const EXIT_RUNTIME_FAILURE: i32 = 1;
const EXIT_SCHEMA_UNAVAILABLE: i32 = 2;
const EXIT_UNANSWERED: i32 = 3;
const EXIT_USAGE_ERROR: i32 = 64;

fn main() {
    std::process::exit(run());
}

fn run() -> i32 {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(error) => return exit_code_for_parse_error(error),
    };
    init_logging(cli.runtime.verbose);

    let command_name = command_name(&cli.command);
    println!("askdb: starting `{command_name}`");

    match execute(cli) {
        Ok(()) => {
            println!("askdb: completed `{command_name}` (exit_code={EXIT_SUCCESS})");
            EXIT_SUCCESS
        }
        Err(error) => {
            let exit_code = classify_runtime_error(&error);
            eprintln!("askdb: failed `{command_name}` (exit_code={exit_code})");
            eprintln!("{error:#}");
            exit_code
        }
    }
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "info" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

fn execute(cli: Cli) -> Result<()> {
    let runtime_paths = resolve_runtime_paths(&cli.runtime)?;
    match cli.command {
        Command::Chat(args) => commands::chat::run(&args, &cli.runtime, &runtime_paths),
        Command::Ask(args) => commands::ask::run(&args, &cli.runtime, &runtime_paths),
        Command::Schema(args) => commands::schema::run(&args, &runtime_paths),
    }
}

fn classify_runtime_error(error: &anyhow::Error) -> i32 {
    if error.downcast_ref::<SchemaUnavailable>().is_some() {
        EXIT_SCHEMA_UNAVAILABLE
    } else if error.downcast_ref::<UnansweredQuestion>().is_some() {
        EXIT_UNANSWERED
    } else {
        EXIT_RUNTIME_FAILURE
    }
}

fn exit_code_for_parse_error(error: clap::Error) -> i32 {
    match error.kind() {
        ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => {
            let _ = error.print();
            EXIT_SUCCESS
        }
        _ => {
            let _ = error.print();
            EXIT_USAGE_ERROR
        }
    }
}

fn command_name(command: &Command) -> &'static str {
    match command {
        Command::Chat(_) => "chat",
        Command::Ask(_) => "ask",
        Command::Schema(_) => "schema",
    }
}

fn resolve_runtime_paths(args: &RuntimeArgs) -> Result<RuntimePaths> {
    let home_dir = match &args.home_dir {
        Some(path) => path.clone(),
        None => std::env::var_os("HOME")
            .map(PathBuf::from)
            .ok_or_else(|| anyhow!("HOME is not set; pass --home-dir"))?,
    };

    let cwd = match &args.cwd {
        Some(path) => path.clone(),
        None => std::env::current_dir()?,
    };

    askdb::config::resolve_runtime_paths(
        &home_dir,
        &cwd,
        &args.database,
        args.trace_dir.as_deref(),
        !args.no_trace,
    )
}
