// SECTION: Client

use std::time::Duration;

use reqwest::header::CONTENT_TYPE;
use tokio::runtime::Handle;
use url::Url;

use crate::envelope::{ExecuteResults, QueryResults};
use crate::error::RqliteClientError;

/// Content type rqlite's statement endpoints expect for the request body.
///
/// Grounded on `RqliteClient.cpp`'s literal `"Content-Type: text/json"`
/// header — rqlite accepts this even though the body is JSON, not the RFC
/// `application/json` type.
const REQUEST_CONTENT_TYPE: &str = "text/json";

/// Async HTTP client for one rqlite ensemble's `/db/execute` and
/// `/db/query` endpoints.
///
/// Holds exactly one [`reqwest::Client`] — per `spec.md`'s Non-goals, this
/// crate adds no connection pooling layer beyond what `reqwest` already
/// does internally. Cloning an `RqliteClient` is cheap: the inner
/// `reqwest::Client` is reference-counted.
#[derive(Debug, Clone)]
pub struct RqliteClient {
    /// The shared, cheaply-cloneable HTTP client.
    http: reqwest::Client,
    /// The configured rqlite ensemble base URL.
    base_url: Url,
    /// Runtime handle used to drive the blocking `*_sync` wrappers.
    runtime: Handle,
}

impl RqliteClient {
    /// Builds a client talking to `base_url`, using the ambient Tokio
    /// runtime for its blocking (`*_sync`) entry points.
    ///
    /// # Errors
    ///
    /// Returns [`RqliteClientError::InvalidEndpoint`] if `base_url` does not
    /// parse, [`RqliteClientError::ClientBuild`] if the underlying HTTP
    /// client cannot be constructed, or [`RqliteClientError::NoRuntime`] if
    /// called outside a Tokio runtime.
    pub fn new(base_url: &str) -> Result<Self, RqliteClientError> {
        let runtime = Handle::try_current().map_err(RqliteClientError::NoRuntime)?;
        Self::with_handle(base_url, runtime)
    }

    /// Like [`Self::new`] but takes an explicit runtime handle, for callers
    /// constructing the client before entering an async context (e.g. at
    /// process startup on a dedicated executor thread).
    ///
    /// # Errors
    ///
    /// Returns [`RqliteClientError::InvalidEndpoint`] if `base_url` does not
    /// parse, or [`RqliteClientError::ClientBuild`] if the underlying HTTP
    /// client cannot be constructed.
    pub fn with_handle(base_url: &str, runtime: Handle) -> Result<Self, RqliteClientError> {
        let base_url = Url::parse(base_url).map_err(|source| RqliteClientError::InvalidEndpoint {
            url: base_url.to_string(),
            source,
        })?;
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(RqliteClientError::ClientBuild)?;
        tracing::debug!(url = %base_url, "rqlite client created");
        Ok(Self {
            http,
            base_url,
            runtime,
        })
    }

    /// The configured base URL, used by `metadata-store`'s
    /// `EpochStore::identify()`.
    #[must_use]
    pub fn url(&self) -> &str {
        self.base_url.as_str()
    }

    /// Runs a batch of statements against `/db/execute`.
    ///
    /// On any transport failure or non-200 response, returns a synthesized
    /// single-result envelope with `error = "connection error"` rather than
    /// an `Err` — per `spec.md §4.1`, callers map this to `FAILED`
    /// themselves; the client does not interpret SQL errors.
    pub async fn execute(&self, stmts: &[String], transactional: bool) -> ExecuteResults {
        if stmts.is_empty() {
            return ExecuteResults { results: Vec::new(), time: 0.0 };
        }
        let mut url = self.endpoint("db/execute");
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("pretty", "");
            query.append_pair("timings", "");
            if transactional {
                query.append_pair("transaction", "");
            }
        }
        self.post(url, stmts).await.unwrap_or_else(|err| {
            tracing::warn!(error = %err, "rqlite execute failed");
            ExecuteResults::connection_error()
        })
    }

    /// Blocking wrapper around [`Self::execute`], for callers outside an
    /// async context.
    ///
    /// Mirrors the original's `executeSync`, which blocks on a
    /// promise/future pair under the hood.
    ///
    /// # Panics
    ///
    /// Panics if called from a current-thread Tokio runtime;
    /// `tokio::task::block_in_place` requires a multi-thread runtime.
    #[must_use]
    pub fn execute_sync(&self, stmts: &[String], transactional: bool) -> ExecuteResults {
        let this = self.clone();
        let stmts = stmts.to_vec();
        tokio::task::block_in_place(|| {
            this.runtime.clone().block_on(this.execute(&stmts, transactional))
        })
    }

    /// Runs a batch of read-only statements against `/db/query`.
    ///
    /// Same failure-synthesis behavior as [`Self::execute`].
    pub async fn query(&self, stmts: &[String]) -> QueryResults {
        if stmts.is_empty() {
            return QueryResults { results: Vec::new(), time: 0.0 };
        }
        let mut url = self.endpoint("db/query");
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("pretty", "");
            query.append_pair("timings", "");
        }
        self.post(url, stmts).await.unwrap_or_else(|err| {
            tracing::warn!(error = %err, "rqlite query failed");
            QueryResults::connection_error()
        })
    }

    /// Blocking wrapper around [`Self::query`], for callers outside an
    /// async context.
    ///
    /// # Panics
    ///
    /// Panics if called from a current-thread Tokio runtime; see
    /// [`Self::execute_sync`].
    #[must_use]
    pub fn query_sync(&self, stmts: &[String]) -> QueryResults {
        let this = self.clone();
        let stmts = stmts.to_vec();
        tokio::task::block_in_place(|| this.runtime.clone().block_on(this.query(&stmts)))
    }

    /// Builds `{base_url}/{path}` without relying on `Url::join`'s
    /// relative-path semantics, which would silently drop a non-empty last
    /// path segment on the base URL.
    fn endpoint(&self, path: &str) -> Url {
        let mut url = self.base_url.clone();
        let joined = format!("{}/{path}", url.path().trim_end_matches('/'));
        url.set_path(&joined);
        url
    }

    /// Shared POST-and-decode path for both endpoints.
    async fn post<T>(&self, url: Url, stmts: &[String]) -> Result<T, RqliteClientError>
    where
        T: serde::de::DeserializeOwned,
    {
        let response = self
            .http
            .post(url)
            .header(CONTENT_TYPE, REQUEST_CONTENT_TYPE)
            .json(stmts)
            .send()
            .await
            .map_err(RqliteClientError::Transport)?;

        let response = response
            .error_for_status()
            .map_err(RqliteClientError::Transport)?;

        let bytes = response.bytes().await.map_err(RqliteClientError::Transport)?;
        serde_json::from_slice(&bytes).map_err(RqliteClientError::Decode)
    }
}
