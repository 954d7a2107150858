//! Read-only execution of oracle-generated statements against SQLite.

use async_trait::async_trait;
use mall_core::errors::OracleError;
use mall_core::oracle::{CellValue, QueryExecutor, ResultRow};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, TypeInfo, ValueRef};
use tracing::debug;

use crate::DbPool;

#[derive(Clone)]
pub struct SqliteQueryExecutor {
    pool: DbPool,
}

impl SqliteQueryExecutor {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl QueryExecutor for SqliteQueryExecutor {
    async fn execute(&self, query: &str) -> Result<Vec<ResultRow>, OracleError> {
        let statement = read_only_statement(query)?;
        let rows = sqlx::query(statement)
            .fetch_all(&self.pool)
            .await
            .map_err(|error| OracleError::Execution(error.to_string()))?;

        debug!(event_name = "db.oracle.executed", row_count = rows.len(), "statement executed");
        rows.iter().map(decode_row).collect()
    }
}

/// Accepts a single `SELECT`/`WITH` statement, minus trailing semicolons.
fn read_only_statement(query: &str) -> Result<&str, OracleError> {
    let statement = strip_terminator(query.trim())?;

    let keyword = statement
        .split_whitespace()
        .next()
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();
    match keyword.as_str() {
        "select" | "with" => Ok(statement),
        "" => Err(OracleError::RejectedStatement("empty statement".to_string())),
        other => Err(OracleError::RejectedStatement(format!("`{other}` is not a read query"))),
    }
}

/// Cuts the statement at its first unquoted `;`, which may only be followed
/// by more terminators.
fn strip_terminator(query: &str) -> Result<&str, OracleError> {
    let mut open_quote = None;
    for (index, ch) in query.char_indices() {
        match (open_quote, ch) {
            (Some(quote), _) if ch == quote => open_quote = None,
            (Some(_), _) => {}
            (None, '\'' | '"') => open_quote = Some(ch),
            (None, ';') => {
                let rest = &query[index..];
                if rest.chars().all(|c| c == ';' || c.is_whitespace()) {
                    return Ok(query[..index].trim_end());
                }
                return Err(OracleError::RejectedStatement("multiple statements".to_string()));
            }
            _ => {}
        }
    }
    Ok(query)
}

fn decode_row(row: &SqliteRow) -> Result<ResultRow, OracleError> {
    (0..row.len()).map(|index| decode_cell(row, index)).collect()
}

fn decode_cell(row: &SqliteRow, index: usize) -> Result<CellValue, OracleError> {
    let raw = row.try_get_raw(index).map_err(decode_error)?;
    if raw.is_null() {
        return Ok(CellValue::Null);
    }

    let type_name = raw.type_info().name().to_ascii_uppercase();
    let cell = match type_name.as_str() {
        "INTEGER" | "BOOLEAN" => {
            CellValue::Integer(row.try_get::<i64, _>(index).map_err(decode_error)?)
        }
        "REAL" | "NUMERIC" => {
            CellValue::Real(row.try_get::<f64, _>(index).map_err(decode_error)?)
        }
        "BLOB" => {
            let bytes = row.try_get::<Vec<u8>, _>(index).map_err(decode_error)?;
            CellValue::Text(String::from_utf8_lossy(&bytes).into_owned())
        }
        _ => CellValue::Text(row.try_get::<String, _>(index).map_err(decode_error)?),
    };
    Ok(cell)
}

fn decode_error(error: sqlx::Error) -> OracleError {
    OracleError::Execution(format!("row decode failed: {error}"))
}
