use anyhow::{Context, Error, Result};
use rusqlite::Connection;
use rusqlite::types::Value as SqlValue;
use serde::Serialize;

use super::{
    SchemaUnavailable, is_internal_table, sql_literal, sqlite_identifier, sqlite_single_quoted,
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ColumnDescription {
    pub name: String,
    pub declared_type: String,
    pub not_null: bool,
    pub default_value_sql: Option<String>,
    pub primary_key_position: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableDescription {
    pub name: String,
    pub columns: Vec<ColumnDescription>,
    /// SQL literals of one arbitrary row, `None` for an empty table.
    pub sample_row: Option<Vec<String>>,
}

/// Schema context shared by every collaborator call of a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaDescription {
    tables: Vec<TableDescription>,
    rendered: String,
}

impl SchemaDescription {
    #[must_use]
    pub fn from_tables(tables: Vec<TableDescription>) -> Self {
        let rendered = render_tables(&tables);
        Self { tables, rendered }
    }

    #[must_use]
    pub fn tables(&self) -> &[TableDescription] {
        &self.tables
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.rendered
    }
}

/// Introspects every user table. Any failure is reported as
/// [`SchemaUnavailable`].
pub fn describe_schema(connection: &Connection) -> Result<SchemaDescription> {
    load_tables(connection)
        .map(SchemaDescription::from_tables)
        .map_err(|error| {
            let database = connection.path().unwrap_or(":memory:").to_string();
            Error::new(SchemaUnavailable::new(database, format!("{error:#}")))
        })
}

fn load_tables(connection: &Connection) -> Result<Vec<TableDescription>> {
    let mut statement = connection
        .prepare("SELECT name FROM sqlite_schema WHERE type = 'table'")
        .context("failed to prepare table listing query")?;
    let names = statement
        .query_map([], |row| row.get::<usize, String>(0))
        .context("failed to list tables")?
        .collect::<rusqlite::Result<Vec<_>>>()
        .context("failed to decode table name")?;

    names
        .into_iter()
        .filter(|name| !is_internal_table(name))
        .map(|name| {
            let columns = load_columns(connection, &name)?;
            let sample_row = load_sample_row(connection, &name)?;
            Ok(TableDescription {
                name,
                columns,
                sample_row,
            })
        })
        .collect()
}

fn load_columns(connection: &Connection, table: &str) -> Result<Vec<ColumnDescription>> {
    let pragma_sql = format!("PRAGMA table_info({})", sqlite_single_quoted(table));
    let mut statement = connection
        .prepare(&pragma_sql)
        .with_context(|| format!("failed to prepare column introspection for `{table}`"))?;

    let column_rows = statement
        .query_map([], |row| {
            Ok(ColumnDescription {
                name: row.get::<usize, String>(1)?,
                declared_type: row.get::<usize, Option<String>>(2)?.unwrap_or_default(),
                not_null: row.get::<usize, i64>(3)? != 0,
                default_value_sql: row.get::<usize, Option<String>>(4)?,
                primary_key_position: row.get::<usize, i64>(5)?,
            })
        })
        .with_context(|| format!("failed to execute column introspection for `{table}`"))?;

    column_rows
        .map(|row| row.context("failed to decode schema column row"))
        .collect()
}

fn load_sample_row(connection: &Connection, table: &str) -> Result<Option<Vec<String>>> {
    let sample_sql = format!("SELECT * FROM {} LIMIT 1", sqlite_identifier(table));
    let mut statement = connection
        .prepare(&sample_sql)
        .with_context(|| format!("failed to prepare sample row query for `{table}`"))?;
    let column_count = statement.column_count();

    let mut rows = statement
        .query([])
        .with_context(|| format!("failed to execute sample row query for `{table}`"))?;
    let Some(row) = rows
        .next()
        .with_context(|| format!("failed to fetch sample row for `{table}`"))?
    else {
        return Ok(None);
    };

    (0..column_count)
        .map(|index| {
            row.get::<usize, SqlValue>(index)
                .map(|value| sql_literal(&value))
                .with_context(|| format!("failed to decode sample value for `{table}`"))
        })
        .collect::<Result<Vec<_>>>()
        .map(Some)
}

fn render_tables(tables: &[TableDescription]) -> String {
    let mut lines = Vec::new();
    for table in tables {
        lines.push(format!("\nTable: {}", table.name));
        lines.push("Columns:".to_string());
        for column in &table.columns {
            lines.push(format!(
                "  {} (Type: {}, Not Null: {}, Default Value: {}, Primary Key: {})",
                column.name,
                column.declared_type,
                u8::from(column.not_null),
                column.default_value_sql.as_deref().unwrap_or("None"),
                column.primary_key_position
            ));
        }
        match &table.sample_row {
            Some(values) => lines.push(format!("Sample row: ({})", values.join(", "))),
            None => lines.push("Sample row: None".to_string()),
        }
    }
    lines.join("\n")
}
