//! Bounded generate → execute → evaluate loop.
//!
//! Each failed attempt's reasoning becomes the next attempt's feedback, so a
//! stateless generator refines its query across attempts. Attempts are
//! strictly ordered: attempt N's feedback derives from attempt N-1.

use serde::Serialize;

use crate::collaborators::Collaborator;
use crate::models::{Candidate, ExecutionResult, NO_FEEDBACK, Verdict};
use crate::sqlite::{QueryExecutor, SchemaDescription};

pub const DEFAULT_MAX_ATTEMPTS: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: usize,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptOutcome {
    Accepted,
    Rejected,
    GenerationFailed,
    EvaluationFailed,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AttemptRecord {
    /// 1-based.
    pub attempt: usize,
    pub feedback: String,
    pub candidate: Option<Candidate>,
    pub result: Option<ExecutionResult>,
    pub verdict: Option<Verdict>,
    pub outcome: AttemptOutcome,
    pub failure: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    Accepted {
        result: ExecutionResult,
        candidate: Candidate,
        attempts: Vec<AttemptRecord>,
    },
    Exhausted {
        attempts: Vec<AttemptRecord>,
    },
}

impl Resolution {
    #[must_use]
    pub fn attempts(&self) -> &[AttemptRecord] {
        match self {
            Self::Accepted { attempts, .. } | Self::Exhausted { attempts } => attempts,
        }
    }

    #[must_use]
    pub fn is_accepted(&self) -> bool {
        matches!(self, Self::Accepted { .. })
    }
}

/// Runs at most `policy.max_attempts` attempts and never fails: execution
/// errors are evaluator input and collaborator failures spend an attempt.
/// `observer` sees every finished attempt in order.
pub fn resolve_query<C, E, F>(
    collaborator: &C,
    executor: &E,
    transcript: &str,
    schema: &SchemaDescription,
    policy: RetryPolicy,
    mut observer: F,
) -> Resolution
where
    C: Collaborator + ?Sized,
    E: QueryExecutor + ?Sized,
    F: FnMut(&AttemptRecord),
{
    let mut feedback = NO_FEEDBACK.to_string();
    let mut attempts = Vec::with_capacity(policy.max_attempts);

    for attempt in 1..=policy.max_attempts {
        let mut record = AttemptRecord {
            attempt,
            feedback: feedback.clone(),
            candidate: None,
            result: None,
            verdict: None,
            outcome: AttemptOutcome::GenerationFailed,
            failure: None,
        };

        let candidate = match collaborator.generate_candidate(transcript, schema, &feedback) {
            Ok(candidate) => candidate,
            Err(error) => {
                tracing::warn!(attempt, %error, "candidate generation failed");
                feedback = format!("previous attempt failed: {error}");
                record.failure = Some(error.to_string());
                observer(&record);
                attempts.push(record);
                continue;
            }
        };
        record.candidate = Some(candidate.clone());

        let result = executor.execute(&candidate.sql_query);
        record.result = Some(result.clone());

        let verdict = match collaborator.evaluate_result(transcript, schema, &candidate, &result) {
            Ok(verdict) => verdict,
            Err(error) => {
                tracing::warn!(attempt, %error, "result evaluation failed");
                feedback = format!("previous attempt failed: {error}");
                record.outcome = AttemptOutcome::EvaluationFailed;
                record.failure = Some(error.to_string());
                observer(&record);
                attempts.push(record);
                continue;
            }
        };
        record.verdict = Some(verdict.clone());

        if verdict.success {
            tracing::info!(attempt, rows = result.row_count(), "candidate accepted");
            record.outcome = AttemptOutcome::Accepted;
            observer(&record);
            attempts.push(record);
            return Resolution::Accepted {
                result,
                candidate,
                attempts,
            };
        }

        tracing::info!(attempt, "candidate rejected");
        record.outcome = AttemptOutcome::Rejected;
        observer(&record);
        attempts.push(record);
        feedback = verdict.reasoning;
    }

    Resolution::Exhausted { attempts }
}
