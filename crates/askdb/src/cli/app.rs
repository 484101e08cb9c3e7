use std::path::PathBuf;

use clap::builder::TypedValueParser;
use clap::{Args, Parser, Subcommand};

use super::commands::{ask::AskArgs, chat::ChatArgs, schema::SchemaArgs};
use crate::config::DEFAULT_DATABASE_PATH;
use crate::controller::DEFAULT_MAX_ATTEMPTS;

#[derive(Debug, Parser)]
#[command(
    name = "askdb",
    version,
    about = "Ask questions about a SQLite database in plain language"
)]
pub struct Cli {
    #[command(flatten)]
    pub runtime: RuntimeArgs,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Args)]
pub struct RuntimeArgs {
    #[arg(short = 'd', long, global = true, value_name = "PATH", default_value = DEFAULT_DATABASE_PATH)]
    pub database: PathBuf,

    #[arg(long, global = true, value_name = "PATH")]
    pub home_dir: Option<PathBuf>,

    #[arg(long, global = true, value_name = "PATH")]
    pub cwd: Option<PathBuf>,

    #[arg(long, global = true, value_name = "PATH")]
    pub trace_dir: Option<PathBuf>,

    #[arg(long, global = true, default_value_t = false)]
    pub no_trace: bool,

    #[arg(long, global = true, default_value_t = false)]
    pub read_only: bool,

    #[arg(short = 'v', long, global = true, default_value_t = false)]
    pub verbose: bool,

    #[arg(
        long,
        global = true,
        default_value_t = DEFAULT_MAX_ATTEMPTS,
        value_parser = clap::value_parser!(u16).range(1..).map(usize::from)
    )]
    pub max_attempts: usize,

    #[arg(long, global = true, value_name = "URL")]
    pub api_base: Option<String>,

    #[arg(long, global = true, value_name = "NAME")]
    pub model: Option<String>,

    #[arg(long, global = true, value_name = "SECONDS")]
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Interactive question/answer loop.
    Chat(ChatArgs),
    /// Answer a single question and exit.
    Ask(AskArgs),
    /// Print the schema description handed to the model.
    Schema(SchemaArgs),
}
