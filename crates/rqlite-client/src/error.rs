// SECTION: Errors

use thiserror::Error;

/// Failure modes for constructing or driving a [`crate::RqliteClient`].
///
/// This is distinct from a SQL-level error inside an [`crate::ExecuteResult`]
/// or [`crate::QueryResult`] — those are surfaced verbatim in the envelope
/// and classified by callers. `RqliteClientError` covers the cases where no
/// envelope could be produced at all.
#[derive(Debug, Error)]
pub enum RqliteClientError {
    /// The base URL supplied at construction could not be parsed.
    #[error("invalid rqlite endpoint {url:?}: {source}")]
    InvalidEndpoint {
        /// The offending URL text.
        url: String,
        /// The parser's error.
        #[source]
        source: url::ParseError,
    },

    /// The underlying `reqwest::Client` could not be built.
    #[error("failed to build http client: {0}")]
    ClientBuild(#[source] reqwest::Error),

    /// The request failed in transit, or the server responded with a
    /// non-2xx status.
    #[error("rqlite request failed: {0}")]
    Transport(#[source] reqwest::Error),

    /// The response body could not be decoded as the expected JSON envelope.
    #[error("failed to decode rqlite response: {0}")]
    Decode(#[source] serde_json::Error),

    /// The client was constructed without a reachable Tokio runtime handle,
    /// so `execute_sync`/`query_sync` have nothing to block on.
    #[error("no tokio runtime available for blocking call: {0}")]
    NoRuntime(#[source] tokio::runtime::TryCurrentError),
}
