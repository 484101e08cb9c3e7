use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::utils::time::now_utc_rfc3339_lossy;

pub const ANSWER_ENVELOPE_SCHEMA_VERSION: &str = "askdb.answer-envelope.v1";

pub type AnswerEnvelopeMeta = BTreeMap<String, Value>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnswerEnvelopeError {
    pub code: String,
    pub message: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

/// Machine-readable result of a one-shot `ask`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnswerEnvelope {
    pub ok: bool,
    pub command: String,
    pub generated_at_utc: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,

    pub meta: AnswerEnvelopeMeta,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<AnswerEnvelopeError>,
}

impl AnswerEnvelope {
    #[must_use]
    pub fn ok(command: impl Into<String>, data: Value) -> Self {
        let mut envelope = Self::base(command, true);
        envelope.data = Some(data);
        envelope
    }

    #[must_use]
    pub fn error(
        command: impl Into<String>,
        code: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        let mut envelope = Self::base(command, false);
        envelope.error = Some(AnswerEnvelopeError {
            code: code.into(),
            message: message.into(),
            details: None,
        });
        envelope
    }

    fn base(command: impl Into<String>, ok: bool) -> Self {
        let mut meta = AnswerEnvelopeMeta::new();
        meta.insert(
            "schema_version".to_string(),
            json!(ANSWER_ENVELOPE_SCHEMA_VERSION),
        );

        Self {
            ok,
            command: command.into(),
            generated_at_utc: now_utc_rfc3339_lossy(),
            data: None,
            meta,
            error: None,
        }
    }

    #[must_use]
    pub fn with_meta(mut self, key: impl Into<String>, value: Value) -> Self {
        self.meta.insert(key.into(), value);
        self
    }

    #[must_use]
    pub fn with_error_details(mut self, details: Value) -> Self {
        if let Some(error) = self.error.as_mut() {
            error.details = Some(details);
        }
        self
    }
}

/// Raised by `ask` when the cycle ended without an answer.
#[derive(Debug, Clone)]
pub struct UnansweredQuestion {
    envelope: AnswerEnvelope,
    json_output: bool,
}

impl UnansweredQuestion {
    #[must_use]
    pub fn new(envelope: AnswerEnvelope, json_output: bool) -> Self {
        Self {
            envelope,
            json_output,
        }
    }

    #[must_use]
    pub fn envelope(&self) -> &AnswerEnvelope {
        &self.envelope
    }
}

impl Display for UnansweredQuestion {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        if self.json_output {
            return match serde_json::to_string(&self.envelope) {
                Ok(encoded) => f.write_str(&encoded),
                Err(_) => f.write_str("answer envelope serialization failure"),
            };
        }

        match &self.envelope.error {
            Some(error) => f.write_str(&error.message),
            None => f.write_str("question was not answered"),
        }
    }
}

impl std::error::Error for UnansweredQuestion {}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{ANSWER_ENVELOPE_SCHEMA_VERSION, AnswerEnvelope, UnansweredQuestion};

    #[test]
    fn ok_envelope_carries_schema_version_and_data() {
        let envelope = AnswerEnvelope::ok("ask", json!({"answer": "Ann"}))
            .with_meta("attempts", json!(1));

        assert!(envelope.ok);
        assert_eq!(
            envelope.meta.get("schema_version"),
            Some(&json!(ANSWER_ENVELOPE_SCHEMA_VERSION))
        );
        assert_eq!(envelope.meta.get("attempts"), Some(&json!(1)));

        let encoded = serde_json::to_value(&envelope).expect("envelope should encode");
        assert!(encoded.get("error").is_none());
        assert_eq!(encoded["data"]["answer"], json!("Ann"));
    }

    #[test]
    fn unanswered_question_renders_json_or_plain_message() {
        let envelope = AnswerEnvelope::error("ask", "attempts_exhausted", "please rephrase")
            .with_error_details(json!({"attempts": 3}));

        let plain = UnansweredQuestion::new(envelope.clone(), false);
        assert_eq!(plain.to_string(), "please rephrase");

        let encoded = UnansweredQuestion::new(envelope, true).to_string();
        let decoded: serde_json::Value =
            serde_json::from_str(&encoded).expect("json display should decode");
        assert_eq!(decoded["ok"], json!(false));
        assert_eq!(decoded["error"]["code"], json!("attempts_exhausted"));
        assert_eq!(decoded["error"]["details"]["attempts"], json!(3));
    }
}
