//! Natural language -> query -> rows round trip.
//!
//! The adapter never fails: translation errors, empty translations, execution
//! errors and deadline expiry all degrade to an empty row set. Absence of rows
//! is the only failure signal downstream stages see.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::errors::OracleError;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CellValue {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
}

impl CellValue {
    /// Textual rendering of any non-null cell.
    pub fn as_text(&self) -> Option<String> {
        match self {
            Self::Null => None,
            Self::Integer(value) => Some(value.to_string()),
            Self::Real(value) => Some(value.to_string()),
            Self::Text(value) => Some(value.clone()),
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Integer(value) => Some(*value),
            Self::Real(value) if value.is_finite() => Some(value.trunc() as i64),
            Self::Text(value) => value.trim().parse::<i64>().ok(),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Integer(value) => Some(*value as f64),
            Self::Real(value) => Some(*value),
            Self::Text(value) => value.trim().parse::<f64>().ok().filter(|value| value.is_finite()),
            Self::Null => None,
        }
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("NULL"),
            Self::Integer(value) => write!(f, "{value}"),
            Self::Real(value) => write!(f, "{value}"),
            Self::Text(value) => f.write_str(value),
        }
    }
}

pub type ResultRow = Vec<CellValue>;

/// Translates a natural-language instruction into a query string.
#[async_trait]
pub trait TextToQuery: Send + Sync {
    async fn translate(&self, instruction: &str) -> Result<String, OracleError>;
}

/// Executes a query against the relational store, read-only.
#[async_trait]
pub trait QueryExecutor: Send + Sync {
    async fn execute(&self, query: &str) -> Result<Vec<ResultRow>, OracleError>;
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct OracleSearch {
    pub query_text: String,
    pub rows: Vec<ResultRow>,
}

impl OracleSearch {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

#[derive(Clone)]
pub struct QueryOracleAdapter {
    translator: Arc<dyn TextToQuery>,
    executor: Arc<dyn QueryExecutor>,
    deadline: Option<Duration>,
}

impl QueryOracleAdapter {
    pub fn new(translator: Arc<dyn TextToQuery>, executor: Arc<dyn QueryExecutor>) -> Self {
        Self { translator, executor, deadline: None }
    }

    /// Bounds each translation and each execution; expiry counts as no rows.
    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub async fn search(&self, instruction: &str) -> OracleSearch {
        let translated = match self.bounded(self.translator.translate(instruction)).await {
            Ok(raw) => raw,
            Err(error) => {
                warn!(
                    event_name = "oracle.translate.failed",
                    error = %error,
                    "query translation failed; returning empty result"
                );
                return OracleSearch::default();
            }
        };

        let query_text = sanitize_query(&translated);
        if query_text.is_empty() {
            warn!(
                event_name = "oracle.translate.empty",
                error = %OracleError::EmptyTranslation,
                "query translation produced no statement"
            );
            return OracleSearch::default();
        }
        debug!(event_name = "oracle.translate.completed", query = %query_text, "query generated");

        match self.bounded(self.executor.execute(&query_text)).await {
            Ok(rows) => {
                debug!(
                    event_name = "oracle.execute.completed",
                    row_count = rows.len(),
                    "query executed"
                );
                OracleSearch { query_text, rows }
            }
            Err(error) => {
                warn!(
                    event_name = "oracle.execute.failed",
                    query = %query_text,
                    error = %error,
                    "query execution failed; returning empty result"
                );
                OracleSearch { query_text, rows: Vec::new() }
            }
        }
    }

    async fn bounded<T, F>(&self, future: F) -> Result<T, OracleError>
    where
        F: std::future::Future<Output = Result<T, OracleError>>,
    {
        match self.deadline {
            Some(deadline) => tokio::time::timeout(deadline, future)
                .await
                .map_err(|_| OracleError::Timeout(deadline))?,
            None => future.await,
        }
    }
}

/// Strips code fences, a restated `SQLQuery:` prefix and any trailing
/// `SQLResult:` section from translator output.
pub fn sanitize_query(raw: &str) -> String {
    let without_result = match raw.find("SQLResult:") {
        Some(index) => &raw[..index],
        None => raw,
    };

    let mut cleaned = without_result.replace("```sql", "").replace("```SQL", "").replace("```", "");
    cleaned = cleaned.replace("SQLQuery:", "");
    cleaned.trim().to_string()
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use async_trait::async_trait;

    use super::{sanitize_query, CellValue, QueryExecutor, QueryOracleAdapter, ResultRow, TextToQuery};
    use crate::errors::OracleError;

    struct FixedTranslator(Result<String, OracleError>);

    #[async_trait]
    impl TextToQuery for FixedTranslator {
        async fn translate(&self, _instruction: &str) -> Result<String, OracleError> {
            self.0.clone()
        }
    }

    struct SlowTranslator;

    #[async_trait]
    impl TextToQuery for SlowTranslator {
        async fn translate(&self, _instruction: &str) -> Result<String, OracleError> {
            tokio::time::sleep(Duration::from_millis(200)).await;
            Ok("SELECT 1".to_string())
        }
    }

    struct FixedExecutor(Result<Vec<ResultRow>, OracleError>);

    #[async_trait]
    impl QueryExecutor for FixedExecutor {
        async fn execute(&self, _query: &str) -> Result<Vec<ResultRow>, OracleError> {
            self.0.clone()
        }
    }

    fn adapter(
        translation: Result<String, OracleError>,
        rows: Result<Vec<ResultRow>, OracleError>,
    ) -> QueryOracleAdapter {
        QueryOracleAdapter::new(
            Arc::new(FixedTranslator(translation)),
            Arc::new(FixedExecutor(rows)),
        )
    }

    #[test]
    fn sanitize_strips_fences_and_prefixes() {
        let raw = "```sql\nSQLQuery: SELECT id, tipo, numero FROM lojas WHERE tipo = 'Roupas'\n```";

        assert_eq!(sanitize_query(raw), "SELECT id, tipo, numero FROM lojas WHERE tipo = 'Roupas'");
    }

    #[test]
    fn sanitize_drops_restated_result_section() {
        let raw = "SQLQuery: SELECT x, y, z FROM posicao WHERE numero = 100\nSQLResult: [(1, 2, 3)]";

        assert_eq!(sanitize_query(raw), "SELECT x, y, z FROM posicao WHERE numero = 100");
    }

    #[tokio::test]
    async fn translation_failure_yields_empty_query_and_rows() {
        let search = adapter(
            Err(OracleError::Translation("llm unavailable".to_string())),
            Ok(vec![vec![CellValue::Integer(1)]]),
        )
        .search("anything")
        .await;

        assert_eq!(search.query_text, "");
        assert!(search.rows.is_empty());
    }

    #[tokio::test]
    async fn blank_translation_yields_empty_result() {
        let search = adapter(Ok("```  ```".to_string()), Ok(vec![vec![CellValue::Integer(1)]]))
            .search("anything")
            .await;

        assert_eq!(search.query_text, "");
        assert!(search.is_empty());
    }

    #[tokio::test]
    async fn execution_failure_keeps_query_text() {
        let search = adapter(
            Ok("SELECT cor FROM lojas".to_string()),
            Err(OracleError::Execution("no such column: cor".to_string())),
        )
        .search("lojas por cor")
        .await;

        assert_eq!(search.query_text, "SELECT cor FROM lojas");
        assert!(search.rows.is_empty());
    }

    #[tokio::test]
    async fn deadline_expiry_is_treated_as_empty() {
        let search = QueryOracleAdapter::new(
            Arc::new(SlowTranslator),
            Arc::new(FixedExecutor(Ok(vec![vec![CellValue::Integer(1)]]))),
        )
        .with_deadline(Duration::from_millis(10))
        .search("anything")
        .await;

        assert!(search.is_empty());
        assert_eq!(search.query_text, "");
    }

    #[tokio::test]
    async fn successful_round_trip_returns_rows() {
        let search = adapter(
            Ok("SQLQuery: SELECT 1".to_string()),
            Ok(vec![vec![CellValue::Integer(1)]]),
        )
        .search("one")
        .await;

        assert_eq!(search.query_text, "SELECT 1");
        assert_eq!(search.rows, vec![vec![CellValue::Integer(1)]]);
    }

    #[test]
    fn cell_conversions_are_lenient() {
        assert_eq!(CellValue::Text(" 105 ".to_string()).as_i64(), Some(105));
        assert_eq!(CellValue::Real(10.0).as_i64(), Some(10));
        assert_eq!(CellValue::Text("abc".to_string()).as_i64(), None);
        assert_eq!(CellValue::Null.as_f64(), None);
        assert_eq!(CellValue::Integer(45).as_f64(), Some(45.0));
    }
}
