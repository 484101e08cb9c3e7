use anyhow::{Context, Error, Result};
use clap::Args;
use serde_json::json;

use super::{ask_and_render, exhausted_message, open_session};
use crate::cli::app::RuntimeArgs;
use crate::config::RuntimePaths;
use crate::models::{AnswerEnvelope, UnansweredQuestion};
use crate::session::CycleOutcome;

#[derive(Debug, Clone, Args)]
pub struct AskArgs {
    #[arg(value_name = "QUESTION")]
    pub question: String,

    #[arg(long, default_value_t = false)]
    pub json: bool,
}

pub fn run(args: &AskArgs, runtime: &RuntimeArgs, runtime_paths: &RuntimePaths) -> Result<()> {
    let mut session = open_session(runtime, runtime_paths)?;

    let verbose = runtime.verbose && !args.json;
    let asked = ask_and_render(&mut session, &args.question, &mut std::io::stdout(), verbose);
    let finished = session.finish();
    let outcome = asked?;
    finished?;

    let envelope = build_envelope(&args.question, &outcome, runtime.max_attempts)?;
    match outcome {
        CycleOutcome::Answered { answer, .. } => {
            if args.json {
                let encoded =
                    serde_json::to_string(&envelope).context("failed to encode answer envelope")?;
                println!("{encoded}");
            } else {
                println!("{answer}");
            }
            Ok(())
        }
        CycleOutcome::Exhausted { .. } | CycleOutcome::SynthesisFailed { .. } => {
            Err(Error::new(UnansweredQuestion::new(envelope, args.json)))
        }
    }
}

pub fn build_envelope(
    question: &str,
    outcome: &CycleOutcome,
    max_attempts: usize,
) -> Result<AnswerEnvelope> {
    let attempts = serde_json::to_value(outcome.attempts()).context("failed to encode attempts")?;
    let envelope = match outcome {
        CycleOutcome::Answered {
            answer,
            candidate,
            result,
            ..
        } => AnswerEnvelope::ok(
            "ask",
            json!({
                "question": question,
                "answer": answer,
                "sql_query": candidate.sql_query,
                "row_count": result.row_count(),
            }),
        ),
        CycleOutcome::Exhausted { .. } => AnswerEnvelope::error(
            "ask",
            "attempts_exhausted",
            exhausted_message(max_attempts),
        )
        .with_error_details(json!({ "question": question })),
        CycleOutcome::SynthesisFailed { message, .. } => AnswerEnvelope::error(
            "ask",
            "synthesis_failed",
            format!("Failed to write a response: {message}"),
        )
        .with_error_details(json!({ "question": question })),
    };

    Ok(envelope
        .with_meta("attempt_count", json!(outcome.attempts().len()))
        .with_meta("max_attempts", json!(max_attempts))
        .with_meta("attempts", attempts))
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::build_envelope;
    use crate::controller::{AttemptOutcome, AttemptRecord};
    use crate::models::{Candidate, ExecutionResult, NO_FEEDBACK};
    use crate::session::CycleOutcome;

    fn rejected_attempt(attempt: usize) -> AttemptRecord {
        AttemptRecord {
            attempt,
            feedback: NO_FEEDBACK.to_string(),
            candidate: None,
            result: None,
            verdict: None,
            outcome: AttemptOutcome::GenerationFailed,
            failure: Some("boom".to_string()),
        }
    }

    #[test]
    fn answered_envelope_reports_query_and_row_count() {
        let outcome = CycleOutcome::Answered {
            answer: "Ann works here.".to_string(),
            candidate: Candidate {
                reasoning: "r".to_string(),
                plan: "p".to_string(),
                sql_query: "SELECT name FROM Employees".to_string(),
            },
            result: ExecutionResult::rows(vec!["name".to_string()], vec![vec![json!("Ann")]]),
            attempts: vec![rejected_attempt(1)],
        };

        let envelope = build_envelope("who works here", &outcome, 3).expect("envelope builds");
        assert!(envelope.ok);
        let data = envelope.data.expect("data should be set");
        assert_eq!(data["sql_query"], json!("SELECT name FROM Employees"));
        assert_eq!(data["row_count"], json!(1));
        assert_eq!(envelope.meta.get("attempt_count"), Some(&json!(1)));
    }

    #[test]
    fn exhausted_envelope_carries_error_code() {
        let outcome = CycleOutcome::Exhausted {
            attempts: (1..=3).map(rejected_attempt).collect(),
        };

        let envelope = build_envelope("who works here", &outcome, 3).expect("envelope builds");
        assert!(!envelope.ok);
        let error = envelope.error.expect("error should be set");
        assert_eq!(error.code, "attempts_exhausted");
        assert!(error.message.contains("after 3 attempts"));
        assert_eq!(
            envelope.meta.get("attempts").and_then(|v| v.as_array()).map(Vec::len),
            Some(3)
        );
    }
}
