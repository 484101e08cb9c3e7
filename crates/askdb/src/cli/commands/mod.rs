pub mod ask;
pub mod chat;
pub mod schema;

use std::io::Write;

use anyhow::Result;

use super::app::RuntimeArgs;
use crate::collaborators::{ChatCompletionsCollaborator, Collaborator};
use crate::config::{CollaboratorOverrides, RuntimePaths, resolve_collaborator_settings};
use crate::controller::{AttemptRecord, RetryPolicy};
use crate::session::{CycleOutcome, Session};
use crate::sqlite::{SqliteExecutor, describe_schema, open_database};
use crate::trace::{JsonlTraceSink, Tracer};
use crate::utils::text::derive_excerpt;

const DEBUG_COLOR: &str = "\x1b[90m";
const COLOR_RESET: &str = "\x1b[0m";
const VERBOSE_RESULT_MAX_CHARS: usize = 2_000;

pub(crate) fn open_session(
    runtime: &RuntimeArgs,
    runtime_paths: &RuntimePaths,
) -> Result<Session<ChatCompletionsCollaborator>> {
    let connection = open_database(&runtime_paths.database, runtime.read_only)?;
    let executor = SqliteExecutor::new(connection).read_only(runtime.read_only);
    let schema = describe_schema(executor.connection())?;

    let overrides = CollaboratorOverrides {
        api_base: runtime.api_base.clone(),
        model: runtime.model.clone(),
        timeout_secs: runtime.timeout_secs,
    };
    let settings = resolve_collaborator_settings(&overrides, |name| std::env::var(name).ok())?;
    let collaborator = ChatCompletionsCollaborator::new(settings)?;

    Session::with_schema(
        executor,
        schema,
        collaborator,
        build_tracer(runtime_paths),
        RetryPolicy {
            max_attempts: runtime.max_attempts,
        },
    )
}

fn build_tracer(runtime_paths: &RuntimePaths) -> Tracer {
    let Some(trace_dir) = runtime_paths.trace_dir.as_deref() else {
        return Tracer::disabled();
    };
    match JsonlTraceSink::open(trace_dir) {
        Ok(sink) => {
            tracing::info!(path = %sink.path().display(), "writing traces");
            Tracer::new(Box::new(sink))
        }
        Err(error) => {
            tracing::warn!("traces disabled: {error:#}");
            Tracer::disabled()
        }
    }
}

/// Runs one cycle, printing each attempt to `output` when `verbose`. The first
/// write failure is returned once the cycle has finished.
pub fn ask_and_render<C, W>(
    session: &mut Session<C>,
    question: &str,
    output: &mut W,
    verbose: bool,
) -> Result<CycleOutcome>
where
    C: Collaborator,
    W: Write,
{
    let mut render_error = None;
    let outcome = session.ask_with_observer(question, |record| {
        if verbose && render_error.is_none() {
            render_error = render_attempt(&mut *output, record).err();
        }
    });
    match render_error {
        Some(error) => Err(error),
        None => Ok(outcome),
    }
}

pub(crate) fn render_attempt<W: Write>(output: &mut W, record: &AttemptRecord) -> Result<()> {
    writeln!(output, "{DEBUG_COLOR}\nAttempt {}{COLOR_RESET}", record.attempt)?;
    if let Some(candidate) = &record.candidate {
        writeln!(output, "{DEBUG_COLOR}Thoughts: {}{COLOR_RESET}", candidate.reasoning)?;
        writeln!(output, "{DEBUG_COLOR}Plan: {}{COLOR_RESET}", candidate.plan)?;
        writeln!(output, "{DEBUG_COLOR}Query: {}{COLOR_RESET}", candidate.sql_query)?;
    }
    if let Some(result) = &record.result {
        writeln!(
            output,
            "{DEBUG_COLOR}Results: {}{COLOR_RESET}",
            derive_excerpt(&result.to_string(), VERBOSE_RESULT_MAX_CHARS)
        )?;
    }
    match (&record.verdict, &record.failure) {
        (Some(verdict), _) if verdict.success => {
            writeln!(output, "{DEBUG_COLOR}Reflection: Success{COLOR_RESET}")?;
        }
        (Some(verdict), _) => {
            writeln!(output, "{DEBUG_COLOR}Reflection: {}{COLOR_RESET}", verdict.reasoning)?;
        }
        (None, Some(failure)) => {
            writeln!(output, "{DEBUG_COLOR}Failure: {failure}{COLOR_RESET}")?;
        }
        (None, None) => {}
    }
    Ok(())
}

#[must_use]
pub(crate) fn exhausted_message(max_attempts: usize) -> String {
    format!(
        "Failed to generate a valid query after {max_attempts} attempts. Please rephrase your question."
    )
}
