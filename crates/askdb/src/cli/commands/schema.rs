use anyhow::{Context, Result};
use clap::Args;

use crate::config::RuntimePaths;
use crate::sqlite::{close_database, describe_schema, open_database};

#[derive(Debug, Clone, Args)]
pub struct SchemaArgs {
    #[arg(long, default_value_t = false)]
    pub json: bool,
}

pub fn run(args: &SchemaArgs, runtime_paths: &RuntimePaths) -> Result<()> {
    let connection = open_database(&runtime_paths.database, true)?;
    let schema = describe_schema(&connection)?;
    close_database(connection)?;

    if args.json {
        let encoded = serde_json::to_string_pretty(schema.tables())
            .context("failed to encode schema description")?;
        println!("{encoded}");
    } else {
        println!("{}", schema.as_str());
    }
    Ok(())
}
