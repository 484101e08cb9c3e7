pub mod executor;
pub mod guardrail;
pub mod schema;

use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};

use anyhow::{Error, Result};
use rusqlite::types::Value as SqlValue;
use rusqlite::{Connection, OpenFlags};
use serde_json::{Value, json};

pub use executor::{QueryExecutor, SqliteExecutor};
pub use schema::{ColumnDescription, SchemaDescription, TableDescription, describe_schema};

/// The database could not be opened or introspected; the session cannot start.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaUnavailable {
    database: PathBuf,
    reason: String,
}

impl SchemaUnavailable {
    #[must_use]
    pub fn new(database: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self {
            database: database.into(),
            reason: reason.into(),
        }
    }

    #[must_use]
    pub fn database(&self) -> &Path {
        &self.database
    }

    #[must_use]
    pub fn reason(&self) -> &str {
        &self.reason
    }
}

impl Display for SchemaUnavailable {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "database schema unavailable ({}): {}",
            self.database.display(),
            self.reason
        )
    }
}

impl std::error::Error for SchemaUnavailable {}

/// Opens an existing SQLite database. A missing file is reported instead of
/// being created empty.
pub fn open_database(path: &Path, read_only: bool) -> Result<Connection> {
    if !path.is_file() {
        return Err(Error::new(SchemaUnavailable::new(
            path,
            "database file does not exist",
        )));
    }

    let access = if read_only {
        OpenFlags::SQLITE_OPEN_READ_ONLY
    } else {
        OpenFlags::SQLITE_OPEN_READ_WRITE
    };
    let flags = access | OpenFlags::SQLITE_OPEN_URI | OpenFlags::SQLITE_OPEN_NO_MUTEX;

    Connection::open_with_flags(path, flags).map_err(|error| {
        Error::new(SchemaUnavailable::new(
            path,
            format!("failed to open sqlite database: {error}"),
        ))
    })
}

pub fn close_database(connection: Connection) -> Result<()> {
    connection
        .close()
        .map_err(|(_, error)| Error::new(error).context("failed to close sqlite database"))
}

pub(crate) fn sqlite_single_quoted(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

pub(crate) fn sqlite_identifier(value: &str) -> String {
    format!("\"{}\"", value.replace('"', "\"\""))
}

pub(crate) fn is_internal_table(name: &str) -> bool {
    name.starts_with("sqlite_")
}

pub(crate) fn json_value_from_sql(value: SqlValue) -> Value {
    match value {
        SqlValue::Null => Value::Null,
        SqlValue::Integer(value) => json!(value),
        SqlValue::Real(value) => json!(value),
        SqlValue::Text(value) => json!(value),
        SqlValue::Blob(value) => json!(encode_blob_hex(&value)),
    }
}

/// Renders a value the way it would be written in SQL.
pub(crate) fn sql_literal(value: &SqlValue) -> String {
    match value {
        SqlValue::Null => "NULL".to_string(),
        SqlValue::Integer(value) => value.to_string(),
        SqlValue::Real(value) => value.to_string(),
        SqlValue::Text(value) => sqlite_single_quoted(value),
        SqlValue::Blob(value) => format!("X'{}'", encode_blob_hex(value)),
    }
}

fn encode_blob_hex(bytes: &[u8]) -> String {
    const HEX: &[u8; 16] = b"0123456789abcdef";
    let mut output = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        output.push(HEX[(byte >> 4) as usize] as char);
        output.push(HEX[(byte & 0x0f) as usize] as char);
    }
    output
}

#[cfg(test)]
mod tests {
    use rusqlite::types::Value as SqlValue;
    use serde_json::json;

    use super::{
        SchemaUnavailable, json_value_from_sql, open_database, sql_literal, sqlite_identifier,
    };

    #[test]
    fn missing_database_is_schema_unavailable() {
        let path = std::env::temp_dir().join("askdb-definitely-missing.sqlite");
        let error = open_database(&path, false).expect_err("missing file must fail");
        let unavailable = error
            .downcast_ref::<SchemaUnavailable>()
            .expect("error should be SchemaUnavailable");
        assert_eq!(unavailable.reason(), "database file does not exist");
        assert!(!path.exists(), "open must not create the database file");
    }

    #[test]
    fn renders_sql_literals() {
        assert_eq!(sql_literal(&SqlValue::Null), "NULL");
        assert_eq!(sql_literal(&SqlValue::Integer(7)), "7");
        assert_eq!(sql_literal(&SqlValue::Text("O'Neil".to_string())), "'O''Neil'");
        assert_eq!(sql_literal(&SqlValue::Blob(vec![0xde, 0xad])), "X'dead'");
    }

    #[test]
    fn quotes_identifiers_and_maps_values_to_json() {
        assert_eq!(sqlite_identifier("Order \"Items\""), "\"Order \"\"Items\"\"\"");
        assert_eq!(json_value_from_sql(SqlValue::Real(1.5)), json!(1.5));
        assert_eq!(json_value_from_sql(SqlValue::Blob(vec![1, 2])), json!("0102"));
    }
}
