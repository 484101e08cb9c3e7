//! Language-model collaborators behind a narrow typed contract.
//!
//! The retry loop only ever sees [`Collaborator`]; the concrete backend is an
//! OpenAI-compatible chat-completions client, and tests substitute scripted
//! fakes.

pub mod chat_completions;

use thiserror::Error;

use crate::models::{Candidate, ExecutionResult, Verdict};
use crate::sqlite::SchemaDescription;

pub use chat_completions::{ChatCompletionsCollaborator, ChatCompletionsSettings};

#[derive(Debug, Error)]
pub enum CollaboratorError {
    /// The backend could not be reached or answered with a non-success status.
    #[error("collaborator `{call}` transport failure: {message}")]
    Transport { call: &'static str, message: String },

    /// The backend answered, but not with a value of the declared shape.
    #[error("collaborator `{call}` returned a malformed value: {message}")]
    ContractViolation { call: &'static str, message: String },
}

impl CollaboratorError {
    #[must_use]
    pub fn call(&self) -> &'static str {
        match self {
            Self::Transport { call, .. } | Self::ContractViolation { call, .. } => call,
        }
    }

    #[must_use]
    pub fn is_contract_violation(&self) -> bool {
        matches!(self, Self::ContractViolation { .. })
    }
}

pub type CollaboratorResult<T> = Result<T, CollaboratorError>;

pub trait Collaborator {
    /// Proposes a query for the latest question. `feedback` is
    /// [`crate::models::NO_FEEDBACK`] on the first attempt of a cycle.
    fn generate_candidate(
        &self,
        transcript: &str,
        schema: &SchemaDescription,
        feedback: &str,
    ) -> CollaboratorResult<Candidate>;

    fn evaluate_result(
        &self,
        transcript: &str,
        schema: &SchemaDescription,
        candidate: &Candidate,
        result: &ExecutionResult,
    ) -> CollaboratorResult<Verdict>;

    fn synthesize_response(
        &self,
        transcript: &str,
        schema: &SchemaDescription,
        result: &ExecutionResult,
    ) -> CollaboratorResult<String>;

    fn describe_database(&self, schema: &SchemaDescription) -> CollaboratorResult<String>;

    fn suggest_question(
        &self,
        transcript: &str,
        schema: &SchemaDescription,
    ) -> CollaboratorResult<String>;
}

impl<C: Collaborator + ?Sized> Collaborator for &C {
    fn generate_candidate(
        &self,
        transcript: &str,
        schema: &SchemaDescription,
        feedback: &str,
    ) -> CollaboratorResult<Candidate> {
        (**self).generate_candidate(transcript, schema, feedback)
    }

    fn evaluate_result(
        &self,
        transcript: &str,
        schema: &SchemaDescription,
        candidate: &Candidate,
        result: &ExecutionResult,
    ) -> CollaboratorResult<Verdict> {
        (**self).evaluate_result(transcript, schema, candidate, result)
    }

    fn synthesize_response(
        &self,
        transcript: &str,
        schema: &SchemaDescription,
        result: &ExecutionResult,
    ) -> CollaboratorResult<String> {
        (**self).synthesize_response(transcript, schema, result)
    }

    fn describe_database(&self, schema: &SchemaDescription) -> CollaboratorResult<String> {
        (**self).describe_database(schema)
    }

    fn suggest_question(
        &self,
        transcript: &str,
        schema: &SchemaDescription,
    ) -> CollaboratorResult<String> {
        (**self).suggest_question(transcript, schema)
    }
}
