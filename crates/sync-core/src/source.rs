//! Row source abstraction and its error types.

use crate::row::Row;
use std::fmt;
use thiserror::Error;

/// One `(code, message)` entry reported by a backend.
///
/// Backends may report several entries for a single failure; errors in this
/// module keep all of them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorDetail {
    pub code: Option<u32>,
    pub message: String,
}

impl ErrorDetail {
    pub fn new(code: Option<u32>, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for ErrorDetail {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.code {
            Some(code) => write!(f, "{code} - {}", self.message),
            None => f.write_str(&self.message),
        }
    }
}

fn join_details(details: &[ErrorDetail]) -> String {
    details
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("\n")
}

/// The source or destination rejected the connection.
#[derive(Debug, Error)]
#[error("Connection to {target} failed:\n{}", join_details(.details))]
pub struct ConnectionError {
    /// Human readable name of what we tried to reach (e.g. `host:1433/db`)
    pub target: String,
    pub details: Vec<ErrorDetail>,
}

impl ConnectionError {
    pub fn new(target: impl Into<String>, details: Vec<ErrorDetail>) -> Self {
        Self {
            target: target.into(),
            details,
        }
    }

    /// Shorthand for a failure with a single uncoded message.
    pub fn message(target: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(target, vec![ErrorDetail::new(None, message)])
    }
}

/// A query could not be executed or its results could not be read.
#[derive(Debug, Error)]
#[error("Error executing SQL:\n{sql}\n{}", join_details(.details))]
pub struct QueryError {
    pub sql: String,
    pub details: Vec<ErrorDetail>,
}

impl QueryError {
    pub fn new(sql: impl Into<String>, details: Vec<ErrorDetail>) -> Self {
        Self {
            sql: sql.into(),
            details,
        }
    }
}

/// Executes parameterless queries and materializes their rows.
///
/// Implementations hold a single open connection; queries are issued one at
/// a time, hence `&mut self`.
#[async_trait::async_trait]
pub trait RowSource: Send {
    /// Run `sql` and return every row of its first result set, in backend
    /// order.
    async fn query(&mut self, sql: &str) -> Result<Vec<Row>, QueryError>;
}

/// Fixed result sets keyed by SQL text, for tests and tooling.
///
/// Unknown SQL yields a [`QueryError`] so the failure path can be exercised.
#[derive(Debug, Default, Clone)]
pub struct StaticRowSource {
    results: Vec<(String, Vec<Row>)>,
    executed: Vec<String>,
}

impl StaticRowSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_result(mut self, sql: impl Into<String>, rows: Vec<Row>) -> Self {
        self.results.push((sql.into(), rows));
        self
    }

    /// Queries issued so far, in order.
    pub fn executed(&self) -> &[String] {
        &self.executed
    }
}

#[async_trait::async_trait]
impl RowSource for StaticRowSource {
    async fn query(&mut self, sql: &str) -> Result<Vec<Row>, QueryError> {
        self.executed.push(sql.to_string());
        self.results
            .iter()
            .find(|(s, _)| s == sql)
            .map(|(_, rows)| rows.clone())
            .ok_or_else(|| {
                QueryError::new(
                    sql,
                    vec![ErrorDetail::new(Some(208), "Invalid object name")],
                )
            })
    }
}
