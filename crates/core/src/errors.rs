use std::time::Duration;

use thiserror::Error;

use crate::domain::inventory::Attribute;
use crate::oracle::CellValue;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NoStoreReason {
    /// The directory lookup returned no rows at all.
    NoRows,
    /// Rows came back but none carried an integer store handle.
    NoValidHandle,
}

impl NoStoreReason {
    pub fn message(&self) -> &'static str {
        match self {
            Self::NoRows => "no store for request",
            Self::NoValidHandle => "no valid store handle",
        }
    }
}

/// Errors surfaced to callers of the resolution pipeline.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ResolutionError {
    #[error("no store found: {}", .0.message())]
    NoStoreFound(NoStoreReason),
}

impl ResolutionError {
    pub fn user_message(&self) -> String {
        match self {
            Self::NoStoreFound(NoStoreReason::NoRows) => {
                "Nenhuma loja encontrada para este pedido.".to_string()
            }
            Self::NoStoreFound(NoStoreReason::NoValidHandle) => {
                "Nenhum número de loja válido foi encontrado.".to_string()
            }
        }
    }
}

/// Failures inside the text-to-query round trip. Absorbed by the oracle adapter.
#[derive(Clone, Debug, Error, PartialEq)]
pub enum OracleError {
    #[error("query translation failed: {0}")]
    Translation(String),
    #[error("query translation returned no statement")]
    EmptyTranslation,
    #[error("query execution failed: {0}")]
    Execution(String),
    #[error("statement rejected by read-only executor: {0}")]
    RejectedStatement(String),
    #[error("oracle round trip exceeded {0:?}")]
    Timeout(Duration),
}

/// A row that does not fit the active schema. Dropped per row.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum RowDecodeError {
    #[error("expected at least {expected} columns, found {found}")]
    ColumnCount { expected: usize, found: usize },
    #[error("missing value for `{0}`")]
    Missing(Attribute),
    #[error("invalid value `{value}` for `{attribute}`")]
    InvalidValue { attribute: Attribute, value: String },
}

impl RowDecodeError {
    pub fn invalid(attribute: Attribute, cell: &CellValue) -> Self {
        Self::InvalidValue { attribute, value: cell.to_string() }
    }
}

#[cfg(test)]
mod tests {
    use super::{NoStoreReason, ResolutionError};

    #[test]
    fn no_store_variants_are_distinguishable() {
        let no_rows = ResolutionError::NoStoreFound(NoStoreReason::NoRows);
        let no_handle = ResolutionError::NoStoreFound(NoStoreReason::NoValidHandle);

        assert_ne!(no_rows, no_handle);
        assert_eq!(no_rows.to_string(), "no store found: no store for request");
        assert_eq!(no_handle.to_string(), "no store found: no valid store handle");
    }

    #[test]
    fn user_message_is_localized() {
        let error = ResolutionError::NoStoreFound(NoStoreReason::NoRows);

        assert!(error.user_message().starts_with("Nenhuma loja"));
    }
}
