pub mod contracts;
pub mod envelope;
pub mod transcript;

pub use contracts::{
    Candidate, ExecutionResult, NO_FEEDBACK, Verdict, candidate_json_schema, verdict_json_schema,
};
pub use envelope::{ANSWER_ENVELOPE_SCHEMA_VERSION, AnswerEnvelope, UnansweredQuestion};
pub use transcript::{Transcript, TranscriptBlock, TranscriptBlockKind};
