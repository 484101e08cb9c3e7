use std::sync::OnceLock;

use regex::Regex;

const MUTATING_KEYWORDS: &[&str] = &[
    "insert", "update", "delete", "create", "alter", "drop", "truncate", "attach", "detach",
    "pragma", "vacuum", "reindex", "analyze", "begin", "commit", "rollback", "savepoint", "release",
];

const READ_ONLY_LEADING_KEYWORDS: &[&str] = &["select", "with", "values", "explain"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatementKind {
    ReadOnly,
    Mutating,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GuardrailViolation {
    pub reason: &'static str,
    pub message: String,
}

/// Comments and quoted literals/identifiers, which must not be mistaken for
/// keywords.
fn non_keyword_regions() -> &'static Regex {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    REGEX.get_or_init(|| {
        Regex::new(r#"(?s)--[^\n]*|/\*.*?\*/|'(?:[^']|'')*'|"(?:[^"]|"")*"|`[^`]*`|\[[^\]]*\]"#)
            .expect("static guardrail regex must compile")
    })
}

fn comments() -> &'static Regex {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    REGEX.get_or_init(|| {
        Regex::new(r"(?s)--[^\n]*|/\*.*?\*/").expect("static comment regex must compile")
    })
}

/// True when `raw_sql` holds nothing but whitespace, comments and semicolons.
#[must_use]
pub fn is_blank_statement(raw_sql: &str) -> bool {
    let without_comments = comments().replace_all(raw_sql, " ");
    without_comments
        .chars()
        .all(|ch| ch.is_whitespace() || ch == ';')
}

fn keyword_normalized(raw_sql: &str) -> String {
    non_keyword_regions()
        .replace_all(raw_sql, " ")
        .to_ascii_lowercase()
}

fn strip_trailing_semicolons(sql: &str) -> &str {
    let mut candidate = sql.trim();
    while let Some(stripped) = candidate.strip_suffix(';') {
        candidate = stripped.trim_end();
    }
    candidate
}

fn first_mutating_keyword(normalized_sql: &str) -> Option<&'static str> {
    normalized_sql
        .split(|ch: char| !ch.is_ascii_alphanumeric() && ch != '_')
        .find_map(|token| MUTATING_KEYWORDS.iter().copied().find(|kw| *kw == token))
}

fn leading_keyword(normalized_sql: &str) -> Option<&str> {
    normalized_sql
        .split(|ch: char| !ch.is_ascii_alphanumeric() && ch != '_')
        .find(|token| !token.is_empty())
}

#[must_use]
pub fn classify_statement(raw_sql: &str) -> StatementKind {
    let normalized = keyword_normalized(raw_sql);
    let leading_is_read_only = leading_keyword(&normalized)
        .is_none_or(|keyword| READ_ONLY_LEADING_KEYWORDS.contains(&keyword));
    if leading_is_read_only && first_mutating_keyword(&normalized).is_none() {
        StatementKind::ReadOnly
    } else {
        StatementKind::Mutating
    }
}

/// Accepts a single SELECT, WITH ... SELECT, VALUES or EXPLAIN SELECT statement.
pub fn validate_read_only_sql(raw_sql: &str) -> Result<(), GuardrailViolation> {
    let normalized = keyword_normalized(raw_sql);
    let candidate = strip_trailing_semicolons(&normalized);
    if candidate.is_empty() {
        return Err(GuardrailViolation {
            reason: "empty_statement",
            message: "SQL query is empty; provide a single read-only statement".to_string(),
        });
    }

    if candidate.contains(';') {
        return Err(GuardrailViolation {
            reason: "multi_statement",
            message: "multi-statement SQL is not allowed in read-only mode".to_string(),
        });
    }

    if let Some(keyword) = first_mutating_keyword(candidate) {
        return Err(GuardrailViolation {
            reason: "mutating_statement",
            message: format!("mutating SQL keyword `{keyword}` is not allowed in read-only mode"),
        });
    }

    let leading = candidate.split_whitespace().collect::<Vec<_>>().join(" ");
    let allowed = ["select", "with", "values", "explain select", "explain query plan select"]
        .iter()
        .any(|prefix| leading.starts_with(prefix));
    if !allowed {
        return Err(GuardrailViolation {
            reason: "unsupported_statement",
            message: "only SELECT, WITH ... SELECT, VALUES and EXPLAIN SELECT statements are allowed in read-only mode".to_string(),
        });
    }

    Ok(())
}
