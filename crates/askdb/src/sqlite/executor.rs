use rusqlite::Connection;
use rusqlite::types::Value as SqlValue;
use serde_json::Value;

use super::guardrail::{
    StatementKind, classify_statement, is_blank_statement, validate_read_only_sql,
};
use super::json_value_from_sql;
use crate::models::ExecutionResult;

pub const EMPTY_STATEMENT_MESSAGE: &str = "SQL query is empty";

/// Runs one generated statement. Engine failures come back as
/// [`ExecutionResult::Error`]; implementations never fail past this call.
pub trait QueryExecutor {
    fn execute(&self, sql: &str) -> ExecutionResult;
}

#[derive(Debug)]
pub struct SqliteExecutor {
    connection: Connection,
    read_only: bool,
}

impl SqliteExecutor {
    #[must_use]
    pub fn new(connection: Connection) -> Self {
        Self {
            connection,
            read_only: false,
        }
    }

    /// Rejects anything but a single read-only statement before it reaches
    /// the engine.
    #[must_use]
    pub fn read_only(mut self, read_only: bool) -> Self {
        self.read_only = read_only;
        self
    }

    #[must_use]
    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    #[must_use]
    pub fn connection(&self) -> &Connection {
        &self.connection
    }

    #[must_use]
    pub fn into_connection(self) -> Connection {
        self.connection
    }
}

impl QueryExecutor for SqliteExecutor {
    fn execute(&self, sql: &str) -> ExecutionResult {
        if is_blank_statement(sql) {
            return ExecutionResult::error(EMPTY_STATEMENT_MESSAGE);
        }
        if self.read_only {
            if let Err(violation) = validate_read_only_sql(sql) {
                tracing::info!(reason = violation.reason, "rejected generated statement");
                return ExecutionResult::error(format!(
                    "statement rejected: {}",
                    violation.message
                ));
            }
        } else if classify_statement(sql) == StatementKind::Mutating {
            tracing::warn!(sql, "executing a mutating statement as generated");
        }

        match run_statement(&self.connection, sql) {
            Ok((columns, rows)) => ExecutionResult::rows(columns, rows),
            Err(error) => {
                tracing::debug!(%error, "generated statement failed");
                ExecutionResult::error(error.to_string())
            }
        }
    }
}

fn run_statement(
    connection: &Connection,
    sql: &str,
) -> rusqlite::Result<(Vec<String>, Vec<Vec<Value>>)> {
    let mut statement = connection.prepare(sql)?;
    let columns = statement
        .column_names()
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>();

    let mut rows = statement.query([])?;
    let mut result_rows = Vec::new();
    while let Some(row) = rows.next()? {
        let mut record = Vec::with_capacity(columns.len());
        for index in 0..columns.len() {
            record.push(json_value_from_sql(row.get::<usize, SqlValue>(index)?));
        }
        result_rows.push(record);
    }

    Ok((columns, result_rows))
}
