use std::io::{BufRead, Write};

use anyhow::{Context, Result};
use clap::Args;

use super::{ask_and_render, exhausted_message, open_session};
use crate::cli::app::RuntimeArgs;
use crate::collaborators::Collaborator;
use crate::config::RuntimePaths;
use crate::session::{CycleOutcome, Session};

#[derive(Debug, Clone, Args)]
pub struct ChatArgs {}

pub fn run(_args: &ChatArgs, runtime: &RuntimeArgs, runtime_paths: &RuntimePaths) -> Result<()> {
    println!(
        "chat: start database={} read_only={} max_attempts={}",
        runtime_paths.database.display(),
        runtime.read_only,
        runtime.max_attempts
    );
    let mut session = open_session(runtime, runtime_paths)?;
    println!(
        "chat: checkpoint schema_loaded tables={} guardrail={}",
        session.schema().tables().len(),
        session.executor().is_read_only()
    );

    let stdin = std::io::stdin();
    let stdout = std::io::stdout();
    let loop_result = run_conversation(&mut session, stdin.lock(), stdout.lock(), runtime.verbose);
    let finish_result = session.finish();
    loop_result?;
    finish_result
}

/// Drives the line-oriented conversation until `exit` or end of input.
///
/// Besides questions, the loop understands `describe`, `suggest`, `rate` and
/// `exit`.
pub fn run_conversation<C, R, W>(
    session: &mut Session<C>,
    mut input: R,
    mut output: W,
    verbose: bool,
) -> Result<()>
where
    C: Collaborator,
    R: BufRead,
    W: Write,
{
    writeln!(output, "\nWelcome to the database query assistant.")?;
    writeln!(output, "Type 'describe' to get a description of the database.")?;
    writeln!(output, "Type 'rate' to rate the last response.")?;
    writeln!(output, "Type 'suggest' if you feel lucky.")?;
    writeln!(output, "Type 'exit' to quit.")?;

    loop {
        let Some(line) = prompt(&mut input, &mut output, "\nQuestion: ")? else {
            break;
        };
        let question = line.trim();
        if question.is_empty() {
            continue;
        }

        match question.to_lowercase().as_str() {
            "exit" | "quit" => break,
            "describe" => {
                match session.describe() {
                    Ok(description) => writeln!(output, "\nAssistant: {description}")?,
                    Err(error) => writeln!(output, "\nAssistant: {error:#}")?,
                }
                continue;
            }
            "rate" => {
                rate_last_answer(session, &mut input, &mut output)?;
                continue;
            }
            "suggest" => match session.suggest() {
                Ok(suggestion) => {
                    writeln!(output, "{suggestion}")?;
                    answer_question(session, &suggestion, &mut output, verbose)?;
                }
                Err(error) => writeln!(output, "\nAssistant: {error:#}")?,
            },
            _ => answer_question(session, question, &mut output, verbose)?,
        }
    }

    writeln!(
        output,
        "\nThank you for using the database query assistant. Goodbye!\n"
    )?;
    Ok(())
}

fn answer_question<C, W>(
    session: &mut Session<C>,
    question: &str,
    output: &mut W,
    verbose: bool,
) -> Result<()>
where
    C: Collaborator,
    W: Write,
{
    match ask_and_render(session, question, output, verbose)? {
        CycleOutcome::Answered { answer, .. } => writeln!(output, "\nAssistant: {answer}")?,
        CycleOutcome::Exhausted { attempts } => writeln!(
            output,
            "\nAssistant: {}",
            exhausted_message(attempts.len())
        )?,
        CycleOutcome::SynthesisFailed { message, .. } => {
            writeln!(output, "\nAssistant: Failed to write a response: {message}")?;
        }
    }
    Ok(())
}

fn rate_last_answer<C, R, W>(session: &mut Session<C>, input: &mut R, output: &mut W) -> Result<()>
where
    C: Collaborator,
    R: BufRead,
    W: Write,
{
    let Some(raw_rating) = prompt(input, output, "How was the response? (1-5): ")? else {
        return Ok(());
    };
    let comment = prompt(input, output, "Comment: ")?.unwrap_or_default();

    let recorded = raw_rating
        .trim()
        .parse::<u8>()
        .context("rating must be a number between 1 and 5")
        .and_then(|rating| session.rate(rating, &comment));
    match recorded {
        Ok(()) => writeln!(output, "Thanks, your rating was recorded.")?,
        Err(error) => writeln!(output, "Rating not recorded: {error:#}")?,
    }
    Ok(())
}

/// `None` at end of input.
fn prompt<R, W>(input: &mut R, output: &mut W, label: &str) -> Result<Option<String>>
where
    R: BufRead,
    W: Write,
{
    write!(output, "{label}")?;
    output.flush()?;

    let mut line = String::new();
    let read = input
        .read_line(&mut line)
        .context("failed to read from standard input")?;
    if read == 0 {
        return Ok(None);
    }
    Ok(Some(line.trim_end_matches(['\r', '\n']).to_string()))
}
