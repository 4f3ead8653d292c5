//! Read-only query execution seam.
//!
//! The executor accepts one free-text query and returns rows or a typed
//! failure. The only safety discipline at this layer is the lexical
//! read-only check: a statement that does not begin with SELECT never
//! reaches the data source.

use async_trait::async_trait;
use serde_json::{Map, Value};
use thiserror::Error;

/// One result row: ordered column name -> value mapping.
///
/// Column order and row order are preserved as produced by the data source.
pub type QueryRow = Map<String, Value>;

/// Query execution errors - always recoverable from the cycle's perspective
#[derive(Debug, Error)]
pub enum QueryError {
    /// The statement did not begin with SELECT
    #[error("only SELECT queries are allowed in this environment")]
    NotReadOnly,

    /// The data source rejected or failed the statement
    #[error("query execution failed: {0}")]
    Execution(String),
}

/// Lexical read-only gate shared by all executor implementations.
///
/// Trims and lowercases the statement for inspection only; the statement is
/// executed as written. Prefix checking is a known weakness - it does not
/// catch multi-statement injection or destructive statements disguised as
/// reads. A hardened deployment should swap in a parsed allow-list.
pub fn validate_read_only(query: &str) -> Result<(), QueryError> {
    let normalized = query.trim_start().to_lowercase();
    if !normalized.starts_with("select") {
        return Err(QueryError::NotReadOnly);
    }
    Ok(())
}

/// QueryExecutor trait - async interface for read-only query execution
#[async_trait]
pub trait QueryExecutor: Send + Sync {
    /// Validate and execute a single query, returning ordered rows
    async fn execute(&self, query: &str) -> Result<Vec<QueryRow>, QueryError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_select_passes_the_gate() {
        assert!(validate_read_only("SELECT 1").is_ok());
        assert!(validate_read_only("  select name from products").is_ok());
        assert!(validate_read_only("\n\tSeLeCt *").is_ok());
    }

    #[test]
    fn test_non_select_is_rejected() {
        assert!(matches!(
            validate_read_only("DROP TABLE products"),
            Err(QueryError::NotReadOnly)
        ));
        assert!(matches!(
            validate_read_only("  update products set price = 0"),
            Err(QueryError::NotReadOnly)
        ));
        assert!(matches!(validate_read_only(""), Err(QueryError::NotReadOnly)));
    }
}
