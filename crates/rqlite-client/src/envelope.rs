// SECTION: Result envelopes
//
//! Typed mirrors of rqlite's `/db/execute` and `/db/query` JSON response
//! bodies. These are pure data: decoding lives here, interpretation (error
//! classification, status mapping) belongs to callers in `metadata-store`.

use serde::Deserialize;
use serde_json::Value;

/// One statement's outcome from a `/db/execute` call.
#[derive(Debug, Clone, Deserialize)]
pub struct ExecuteResult {
    /// Empty when the statement succeeded; otherwise the SQL error text.
    #[serde(default)]
    pub error: String,
    /// `ROWID` of the last inserted row, if any.
    #[serde(default, rename = "last_insert_id")]
    pub last_insert_id: i64,
    /// Number of rows the statement affected.
    #[serde(default, rename = "rows_affected")]
    pub rows_affected: i64,
    /// Server-reported execution time in seconds.
    #[serde(default)]
    pub time: f64,
}

impl ExecuteResult {
    /// A synthetic result used when the HTTP call itself failed (non-200
    /// response or transport error), per `spec.md §4.1`'s "connection
    /// error" failure model.
    #[must_use]
    pub fn connection_error() -> Self {
        Self {
            error: "connection error".to_string(),
            last_insert_id: 0,
            rows_affected: 0,
            time: 0.0,
        }
    }

    /// True when this result carries no SQL error.
    #[must_use]
    pub fn is_ok(&self) -> bool {
        self.error.is_empty()
    }
}

/// The full body of a `/db/execute` response.
#[derive(Debug, Clone, Deserialize)]
pub struct ExecuteResults {
    /// Per-statement results, in statement order.
    #[serde(default)]
    pub results: Vec<ExecuteResult>,
    /// Total server-reported execution time in seconds.
    #[serde(default)]
    pub time: f64,
}

impl ExecuteResults {
    /// A whole-response synthesis used when the transport itself failed
    /// before any statement could run.
    #[must_use]
    pub fn connection_error() -> Self {
        Self {
            results: vec![ExecuteResult::connection_error()],
            time: 0.0,
        }
    }
}

/// One statement's outcome from a `/db/query` call.
#[derive(Debug, Clone, Deserialize)]
pub struct QueryResult {
    /// Empty when the statement succeeded; otherwise the SQL error text.
    #[serde(default)]
    pub error: String,
    /// Column names, in the order they appear in `values`.
    #[serde(default)]
    pub columns: Vec<String>,
    /// SQLite type affinities for each column.
    #[serde(default)]
    pub types: Vec<String>,
    /// Row values; each inner vector has one untyped JSON scalar per column.
    #[serde(default)]
    pub values: Vec<Vec<Value>>,
    /// Server-reported execution time in seconds.
    #[serde(default)]
    pub time: f64,
}

impl QueryResult {
    /// A synthetic result used when the HTTP call itself failed.
    #[must_use]
    pub fn connection_error() -> Self {
        Self {
            error: "connection error".to_string(),
            columns: Vec::new(),
            types: Vec::new(),
            values: Vec::new(),
            time: 0.0,
        }
    }

    /// True when this result carries no SQL error.
    #[must_use]
    pub fn is_ok(&self) -> bool {
        self.error.is_empty()
    }
}

/// The full body of a `/db/query` response.
#[derive(Debug, Clone, Deserialize)]
pub struct QueryResults {
    /// Per-statement results, in statement order.
    #[serde(default)]
    pub results: Vec<QueryResult>,
    /// Total server-reported execution time in seconds.
    #[serde(default)]
    pub time: f64,
}

impl QueryResults {
    /// A whole-response synthesis used when the transport itself failed
    /// before any statement could run.
    #[must_use]
    pub fn connection_error() -> Self {
        Self {
            results: vec![QueryResult::connection_error()],
            time: 0.0,
        }
    }
}
