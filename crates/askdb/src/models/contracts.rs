use std::fmt::{Display, Formatter};

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Feedback passed to the first generation attempt of every cycle.
pub const NO_FEEDBACK: &str = "None";

/// A generated query together with the reasoning that produced it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct Candidate {
    pub reasoning: String,
    pub plan: String,
    pub sql_query: String,
}

/// The evaluator's judgement of one executed candidate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct Verdict {
    pub reasoning: String,
    pub success: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ExecutionResult {
    Rows {
        columns: Vec<String>,
        rows: Vec<Vec<Value>>,
    },
    Error {
        message: String,
    },
}

impl ExecutionResult {
    #[must_use]
    pub fn rows(columns: Vec<String>, rows: Vec<Vec<Value>>) -> Self {
        Self::Rows { columns, rows }
    }

    #[must_use]
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error { .. })
    }

    #[must_use]
    pub fn row_count(&self) -> usize {
        match self {
            Self::Rows { rows, .. } => rows.len(),
            Self::Error { .. } => 0,
        }
    }

    #[must_use]
    pub fn error_message(&self) -> Option<&str> {
        match self {
            Self::Rows { .. } => None,
            Self::Error { message } => Some(message),
        }
    }
}

impl Display for ExecutionResult {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Rows { rows, .. } => {
                f.write_str("[")?;
                for (index, row) in rows.iter().enumerate() {
                    if index > 0 {
                        f.write_str(", ")?;
                    }
                    f.write_str("(")?;
                    for (column, value) in row.iter().enumerate() {
                        if column > 0 {
                            f.write_str(", ")?;
                        }
                        write!(f, "{value}")?;
                    }
                    f.write_str(")")?;
                }
                f.write_str("]")
            }
            Self::Error { message } => f.write_str(message),
        }
    }
}

#[must_use]
pub fn candidate_json_schema() -> Value {
    output_schema(schemars::schema_for!(Candidate))
}

#[must_use]
pub fn verdict_json_schema() -> Value {
    output_schema(schemars::schema_for!(Verdict))
}

fn output_schema(schema: schemars::Schema) -> Value {
    let mut value = schema.to_value();
    if let Some(object) = value.as_object_mut() {
        object.remove("$schema");
    }
    value
}
