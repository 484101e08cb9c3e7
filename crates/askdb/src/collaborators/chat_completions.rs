use std::fmt::{Debug, Formatter};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde_json::{Value, json};

use super::{Collaborator, CollaboratorError, CollaboratorResult};
use crate::models::{
    Candidate, ExecutionResult, Verdict, candidate_json_schema, verdict_json_schema,
};
use crate::sqlite::SchemaDescription;

pub const DEFAULT_API_BASE: &str = "https://api.openai.com/v1";
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

const GENERATE_INSTRUCTIONS: &str = "Given a conversation, a database structure and feedback on \
previous attempts, write one SQLite query that answers the latest question. Explain your \
reasoning and plan before giving the query.";
const EVALUATE_INSTRUCTIONS: &str = "Given a conversation, a database structure, a query and its \
result, decide whether the result answers the latest question. If it does not, explain what is \
wrong so the query can be improved.";
const SYNTHESIZE_INSTRUCTIONS: &str = "Given a conversation, a database structure and a query \
result, write a concise answer to the latest question.";
const DESCRIBE_INSTRUCTIONS: &str =
    "Given a database structure, give a short overview of what the database is about.";
const SUGGEST_INSTRUCTIONS: &str = "Given a conversation and a database structure, suggest one \
question the user is likely to ask next. Reply with the question only.";

#[derive(Clone, PartialEq, Eq)]
pub struct ChatCompletionsSettings {
    pub api_base: String,
    pub api_key: String,
    pub model: String,
    pub timeout: Duration,
}

impl Debug for ChatCompletionsSettings {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatCompletionsSettings")
            .field("api_base", &self.api_base)
            .field("api_key", &redact_secret(&self.api_key))
            .field("model", &self.model)
            .field("timeout", &self.timeout)
            .finish()
    }
}

fn redact_secret(value: &str) -> &'static str {
    if value.is_empty() { "" } else { "[REDACTED]" }
}

/// Blocking client for an OpenAI-compatible `/chat/completions` endpoint.
pub struct ChatCompletionsCollaborator {
    settings: ChatCompletionsSettings,
    client: reqwest::blocking::Client,
}

impl ChatCompletionsCollaborator {
    pub fn new(settings: ChatCompletionsSettings) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(settings.timeout)
            .build()
            .context("failed to build chat-completions http client")?;
        Ok(Self { settings, client })
    }

    #[must_use]
    pub fn settings(&self) -> &ChatCompletionsSettings {
        &self.settings
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/chat/completions",
            self.settings.api_base.trim_end_matches('/')
        )
    }

    fn complete(&self, call: &'static str, body: &Value) -> CollaboratorResult<String> {
        tracing::debug!(call, model = %self.settings.model, "calling chat-completions");
        let response = self
            .client
            .post(self.endpoint())
            .bearer_auth(&self.settings.api_key)
            .json(body)
            .send()
            .map_err(|error| CollaboratorError::Transport {
                call,
                message: error.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().unwrap_or_default();
            return Err(CollaboratorError::Transport {
                call,
                message: format!("status {status}: {text}"),
            });
        }

        let payload = response
            .json::<Value>()
            .map_err(|error| CollaboratorError::ContractViolation {
                call,
                message: format!("response body is not JSON: {error}"),
            })?;
        extract_message_content(call, &payload)
    }

    fn call_structured<T: DeserializeOwned>(
        &self,
        call: &'static str,
        instructions: &str,
        input: &Value,
        schema: Value,
    ) -> CollaboratorResult<T> {
        let body = build_request_body(&self.settings.model, call, instructions, input, Some(schema));
        let content = self.complete(call, &body)?;
        parse_structured_content(call, &content)
    }

    fn call_text(
        &self,
        call: &'static str,
        instructions: &str,
        input: &Value,
    ) -> CollaboratorResult<String> {
        let body = build_request_body(&self.settings.model, call, instructions, input, None);
        let content = self.complete(call, &body)?;
        let trimmed = content.trim();
        if trimmed.is_empty() {
            return Err(CollaboratorError::ContractViolation {
                call,
                message: "empty text response".to_string(),
            });
        }
        Ok(trimmed.to_string())
    }
}

impl Collaborator for ChatCompletionsCollaborator {
    fn generate_candidate(
        &self,
        transcript: &str,
        schema: &SchemaDescription,
        feedback: &str,
    ) -> CollaboratorResult<Candidate> {
        let input = json!({
            "transcript": transcript,
            "schema": schema.as_str(),
            "feedback": feedback,
        });
        self.call_structured(
            "generate_candidate",
            GENERATE_INSTRUCTIONS,
            &input,
            candidate_json_schema(),
        )
    }

    fn evaluate_result(
        &self,
        transcript: &str,
        schema: &SchemaDescription,
        candidate: &Candidate,
        result: &ExecutionResult,
    ) -> CollaboratorResult<Verdict> {
        let input = json!({
            "transcript": transcript,
            "schema": schema.as_str(),
            "candidate": candidate,
            "result": result,
        });
        self.call_structured(
            "evaluate_result",
            EVALUATE_INSTRUCTIONS,
            &input,
            verdict_json_schema(),
        )
    }

    fn synthesize_response(
        &self,
        transcript: &str,
        schema: &SchemaDescription,
        result: &ExecutionResult,
    ) -> CollaboratorResult<String> {
        let input = json!({
            "transcript": transcript,
            "schema": schema.as_str(),
            "result": result,
        });
        self.call_text("synthesize_response", SYNTHESIZE_INSTRUCTIONS, &input)
    }

    fn describe_database(&self, schema: &SchemaDescription) -> CollaboratorResult<String> {
        let input = json!({ "schema": schema.as_str() });
        self.call_text("describe_database", DESCRIBE_INSTRUCTIONS, &input)
    }

    fn suggest_question(
        &self,
        transcript: &str,
        schema: &SchemaDescription,
    ) -> CollaboratorResult<String> {
        let input = json!({
            "transcript": transcript,
            "schema": schema.as_str(),
        });
        self.call_text("suggest_question", SUGGEST_INSTRUCTIONS, &input)
    }
}

#[must_use]
pub fn build_request_body(
    model: &str,
    call: &str,
    instructions: &str,
    input: &Value,
    output_schema: Option<Value>,
) -> Value {
    let mut body = json!({
        "model": model,
        "temperature": 0,
        "messages": [
            { "role": "system", "content": instructions },
            { "role": "user", "content": input.to_string() },
        ],
    });

    if let Some(schema) = output_schema {
        body["response_format"] = json!({
            "type": "json_schema",
            "json_schema": {
                "name": call,
                "strict": true,
                "schema": schema,
            },
        });
    }

    body
}

pub fn extract_message_content(call: &'static str, payload: &Value) -> CollaboratorResult<String> {
    if let Some(refusal) = payload
        .pointer("/choices/0/message/refusal")
        .and_then(Value::as_str)
    {
        return Err(CollaboratorError::ContractViolation {
            call,
            message: format!("model refused: {refusal}"),
        });
    }

    payload
        .pointer("/choices/0/message/content")
        .and_then(Value::as_str)
        .map(ToString::to_string)
        .ok_or_else(|| CollaboratorError::ContractViolation {
            call,
            message: "response is missing choices[0].message.content".to_string(),
        })
}

pub fn parse_structured_content<T: DeserializeOwned>(
    call: &'static str,
    content: &str,
) -> CollaboratorResult<T> {
    serde_json::from_str(content.trim()).map_err(|error| CollaboratorError::ContractViolation {
        call,
        message: format!("content does not match the declared shape: {error}"),
    })
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use serde_json::json;

    use super::{
        ChatCompletionsCollaborator, ChatCompletionsSettings, build_request_body,
        extract_message_content, parse_structured_content,
    };
    use crate::models::{Candidate, Verdict, candidate_json_schema};

    #[test]
    fn structured_request_carries_strict_json_schema() {
        let body = build_request_body(
            "gpt-4o-mini",
            "generate_candidate",
            "write a query",
            &json!({"feedback": "None"}),
            Some(candidate_json_schema()),
        );

        assert_eq!(body["model"], json!("gpt-4o-mini"));
        assert_eq!(body["messages"][0]["role"], json!("system"));
        assert_eq!(body["messages"][1]["content"], json!(r#"{"feedback":"None"}"#));
        assert_eq!(body["response_format"]["type"], json!("json_schema"));
        assert_eq!(
            body["response_format"]["json_schema"]["name"],
            json!("generate_candidate")
        );
        assert_eq!(
            body["response_format"]["json_schema"]["schema"]["additionalProperties"],
            json!(false)
        );
    }

    #[test]
    fn text_request_has_no_response_format() {
        let body = build_request_body("m", "describe_database", "describe", &json!({}), None);
        assert!(body.get("response_format").is_none());
    }

    #[test]
    fn extracts_content_and_reports_missing_or_refused_content() {
        let payload = json!({"choices": [{"message": {"content": "{\"reasoning\":\"ok\",\"success\":true}"}}]});
        let content =
            extract_message_content("evaluate_result", &payload).expect("content should exist");
        let verdict: Verdict =
            parse_structured_content("evaluate_result", &content).expect("verdict should parse");
        assert!(verdict.success);

        let missing = extract_message_content("evaluate_result", &json!({"choices": []}))
            .expect_err("missing content must fail");
        assert!(missing.is_contract_violation());

        let refused = extract_message_content(
            "evaluate_result",
            &json!({"choices": [{"message": {"content": null, "refusal": "no"}}]}),
        )
        .expect_err("refusal must fail");
        assert!(refused.to_string().contains("model refused"));
    }

    #[test]
    fn malformed_structured_content_is_a_contract_violation() {
        let error = parse_structured_content::<Candidate>(
            "generate_candidate",
            r#"{"reasoning": "r", "sql_query": "SELECT 1"}"#,
        )
        .expect_err("missing plan must fail");
        assert!(error.is_contract_violation());
        assert_eq!(error.call(), "generate_candidate");
    }

    #[test]
    fn debug_output_redacts_api_key() {
        let collaborator = ChatCompletionsCollaborator::new(ChatCompletionsSettings {
            api_base: "http://localhost:9/v1/".to_string(),
            api_key: "sk-secret".to_string(),
            model: "m".to_string(),
            timeout: Duration::from_secs(1),
        })
        .expect("client should build");

        let rendered = format!("{:?}", collaborator.settings());
        assert!(!rendered.contains("sk-secret"));
        assert!(rendered.contains("[REDACTED]"));
        assert_eq!(collaborator.endpoint(), "http://localhost:9/v1/chat/completions");
    }
}
