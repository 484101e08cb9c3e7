use std::time::Instant;

use anyhow::{Context, Result, bail};

use crate::collaborators::Collaborator;
use crate::controller::{AttemptRecord, Resolution, RetryPolicy, resolve_query};
use crate::models::{Candidate, ExecutionResult, Transcript};
use crate::sqlite::{SchemaDescription, SqliteExecutor, close_database, describe_schema};
use crate::trace::{SpanId, SpanKind, Tracer};
use crate::utils::time::elapsed_ms;

pub const EXHAUSTED_MARKER: &str = "<attempts exhausted>";
pub const SYNTHESIS_FAILED_MARKER: &str = "<response synthesis failed>";
pub const USER_RATING_METRIC: &str = "user_rating";

#[derive(Debug, Clone, PartialEq)]
pub enum CycleOutcome {
    Answered {
        answer: String,
        candidate: Candidate,
        result: ExecutionResult,
        attempts: Vec<AttemptRecord>,
    },
    Exhausted {
        attempts: Vec<AttemptRecord>,
    },
    SynthesisFailed {
        message: String,
        attempts: Vec<AttemptRecord>,
    },
}

impl CycleOutcome {
    #[must_use]
    pub fn attempts(&self) -> &[AttemptRecord] {
        match self {
            Self::Answered { attempts, .. }
            | Self::Exhausted { attempts }
            | Self::SynthesisFailed { attempts, .. } => attempts,
        }
    }

    #[must_use]
    pub fn answer(&self) -> Option<&str> {
        match self {
            Self::Answered { answer, .. } => Some(answer),
            Self::Exhausted { .. } | Self::SynthesisFailed { .. } => None,
        }
    }
}

/// One conversation against one database.
///
/// The schema description is computed once in [`Session::open`] and never
/// refreshed; the transcript only grows.
pub struct Session<C> {
    collaborator: C,
    executor: SqliteExecutor,
    schema: SchemaDescription,
    transcript: Transcript,
    policy: RetryPolicy,
    tracer: Tracer,
    session_span: SpanId,
    session_input_recorded: bool,
    last_answered_cycle: Option<SpanId>,
}

impl<C: Collaborator> Session<C> {
    pub fn open(
        executor: SqliteExecutor,
        collaborator: C,
        tracer: Tracer,
        policy: RetryPolicy,
    ) -> Result<Self> {
        let schema = describe_schema(executor.connection())?;
        Self::with_schema(executor, schema, collaborator, tracer, policy)
    }

    /// Starts a session over a schema already described from `executor`'s
    /// connection.
    pub fn with_schema(
        executor: SqliteExecutor,
        schema: SchemaDescription,
        collaborator: C,
        mut tracer: Tracer,
        policy: RetryPolicy,
    ) -> Result<Self> {
        if policy.max_attempts == 0 {
            bail!("max_attempts must be at least 1");
        }

        let session_span = tracer.open(SpanKind::Session, None);
        tracing::info!(
            tables = schema.tables().len(),
            span = session_span.as_str(),
            "session opened"
        );

        Ok(Self {
            collaborator,
            executor,
            schema,
            transcript: Transcript::new(),
            policy,
            tracer,
            session_span,
            session_input_recorded: false,
            last_answered_cycle: None,
        })
    }

    #[must_use]
    pub fn schema(&self) -> &SchemaDescription {
        &self.schema
    }

    #[must_use]
    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    #[must_use]
    pub fn collaborator(&self) -> &C {
        &self.collaborator
    }

    #[must_use]
    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    #[must_use]
    pub fn executor(&self) -> &SqliteExecutor {
        &self.executor
    }

    pub fn ask(&mut self, question: &str) -> CycleOutcome {
        self.ask_with_observer(question, |_| {})
    }

    /// Runs one full cycle. `observer` sees each attempt as it finishes.
    pub fn ask_with_observer<F>(&mut self, question: &str, observer: F) -> CycleOutcome
    where
        F: FnMut(&AttemptRecord),
    {
        if !self.session_input_recorded {
            self.tracer.update_input(&self.session_span, question);
            self.session_input_recorded = true;
        }

        let started = Instant::now();
        let cycle_span = self.tracer.open(SpanKind::Cycle, Some(&self.session_span));
        self.tracer.update_input(&cycle_span, question);
        self.transcript.push_question(question);

        let resolution = resolve_query(
            &self.collaborator,
            &self.executor,
            self.transcript.as_str(),
            &self.schema,
            self.policy,
            observer,
        );

        let outcome = match resolution {
            Resolution::Exhausted { attempts } => {
                self.tracer.update_output(&cycle_span, EXHAUSTED_MARKER);
                CycleOutcome::Exhausted { attempts }
            }
            Resolution::Accepted {
                result,
                candidate,
                attempts,
            } => match self.collaborator.synthesize_response(
                self.transcript.as_str(),
                &self.schema,
                &result,
            ) {
                Ok(answer) => {
                    self.transcript.push_response(&answer);
                    self.tracer.update_output(&cycle_span, &answer);
                    self.tracer.update_output(&self.session_span, &answer);
                    self.last_answered_cycle = Some(cycle_span.clone());
                    CycleOutcome::Answered {
                        answer,
                        candidate,
                        result,
                        attempts,
                    }
                }
                Err(error) => {
                    tracing::warn!(%error, "response synthesis failed");
                    self.tracer.update_output(&cycle_span, SYNTHESIS_FAILED_MARKER);
                    CycleOutcome::SynthesisFailed {
                        message: error.to_string(),
                        attempts,
                    }
                }
            },
        };

        self.tracer.close(&cycle_span);
        tracing::info!(
            span = cycle_span.as_str(),
            attempts = outcome.attempts().len(),
            answered = outcome.answer().is_some(),
            elapsed_ms = elapsed_ms(started),
            "cycle finished"
        );
        outcome
    }

    /// Overview of what the database is about. Not added to the transcript.
    pub fn describe(&self) -> Result<String> {
        self.collaborator
            .describe_database(&self.schema)
            .context("failed to describe database")
    }

    /// A likely next question given the conversation so far.
    pub fn suggest(&self) -> Result<String> {
        self.collaborator
            .suggest_question(self.transcript.as_str(), &self.schema)
            .context("failed to suggest a question")
    }

    /// Attaches a 1-5 rating to the most recently answered cycle.
    pub fn rate(&mut self, rating: u8, comment: &str) -> Result<()> {
        if !(1..=5).contains(&rating) {
            bail!("rating must be between 1 and 5, got {rating}");
        }
        let Some(cycle_span) = self.last_answered_cycle.as_ref() else {
            bail!("no answered question to rate yet");
        };

        let comment = comment.trim();
        self.tracer.save_metric(
            cycle_span,
            USER_RATING_METRIC,
            &rating.to_string(),
            (!comment.is_empty()).then_some(comment),
        );
        Ok(())
    }

    pub fn finish(mut self) -> Result<()> {
        self.tracer.close(&self.session_span);
        close_database(self.executor.into_connection())
    }
}
