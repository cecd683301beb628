// SECTION: Versioned Configuration Store (C3)

use std::sync::Arc;

use serde_json::Value;

use crate::codec::{hex_decode, hex_encode, match_error, NO_SUCH_TABLE, UNIQUE_CONSTRAINT_FAILED};
use crate::guard::SharedClient;
use crate::ratelimit::RateLimiter;
use crate::sql::{quote, split_key};
use crate::status::StoreStatus;
use rqlite_client::RqliteClient;

/// Extracts the payload version embedded inside an opaque value.
///
/// Pluggable: this store never interprets the bytes of a config value or
/// epoch-metadata blob itself.
pub type ExtractVersion = Arc<dyn Fn(&[u8]) -> Option<u64> + Send + Sync>;

/// A general-purpose key→(value, version) store with linearizable get,
/// optimistic-CAS read-modify-write, and auto-provisioning on first write.
pub struct VersionedConfigStore {
    /// The shutdown-aware, shared rqlite client.
    shared: Arc<SharedClient>,
    /// Extracts the payload version embedded in a stored value.
    extract_version: ExtractVersion,
    /// Bounds the non-monotonic-payload-version warning to one per window.
    version_warnings: RateLimiter,
}

impl VersionedConfigStore {
    /// Builds a store over `client`, using `extract_version` to read the
    /// payload version out of stored values.
    #[must_use]
    pub fn new(client: RqliteClient, extract_version: ExtractVersion) -> Self {
        Self {
            shared: Arc::new(SharedClient::new(client)),
            extract_version,
            version_warnings: RateLimiter::default(),
        }
    }

    /// Reads `key`, honoring an optional base payload version.
    ///
    /// Returns `(OK, value)` if the row exists and is newer than
    /// `base_version` (or `base_version` is absent); `(UP_TO_DATE, "")` if
    /// it is not; `(NOT_FOUND, "")` if the row or table is absent;
    /// `(BAD_MSG, "")` if the stored value cannot be parsed; `(FAILED, "")`
    /// on transport/SQL error.
    pub async fn get_config(&self, key: &str, base_version: Option<u64>) -> (StoreStatus, Vec<u8>) {
        let Some((table, row_key)) = split_key(key) else {
            return (StoreStatus::InvalidParam, Vec::new());
        };
        let Some(client) = self.shared.acquire().await else {
            return (StoreStatus::Shutdown, Vec::new());
        };

        let select_stmt =
            format!("SELECT value, version FROM {table} WHERE key = '{}'", quote(row_key));
        let results = client.query(&[select_stmt]).await;

        let Some(result) = results.results.first() else {
            return (StoreStatus::Failed, Vec::new());
        };
        if !result.is_ok() {
            return if match_error(&result.error, NO_SUCH_TABLE) {
                (StoreStatus::NotFound, Vec::new())
            } else {
                (StoreStatus::Failed, Vec::new())
            };
        }
        let Some(row) = result.values.first() else {
            return (StoreStatus::NotFound, Vec::new());
        };
        let value_hex = row.first().and_then(Value::as_str).unwrap_or_default();
        let Some(bytes) = hex_decode(value_hex) else {
            return (StoreStatus::BadMsg, Vec::new());
        };

        match base_version {
            None => (StoreStatus::Ok, bytes),
            Some(base) => match (self.extract_version)(&bytes) {
                Some(version) if version > base => (StoreStatus::Ok, bytes),
                Some(_) => (StoreStatus::UpToDate, Vec::new()),
                None => (StoreStatus::BadMsg, Vec::new()),
            },
        }
    }

    /// Equivalent to `get_config(key, None)`.
    ///
    /// Linearizability is left to rqlite's own strong-consistency read
    /// level (routing to the leader, with an optional explicit sync step)
    /// rather than this crate issuing a separate sync statement, since no
    /// such statement is part of the wire protocol it speaks.
    pub async fn get_latest_config(&self, key: &str) -> (StoreStatus, Vec<u8>) {
        self.get_config(key, None).await
    }

    /// Performs an optimistic-CAS read-modify-write on `key`.
    ///
    /// `mutation` sees the current value (`None` if the row is fresh) and
    /// returns the status/new-value pair the caller wants written; it must
    /// not perform I/O of its own (`spec.md §9`: the store must not retry
    /// internally, so the mutation must always see the freshest read).
    ///
    /// Returns `(OK, Some(payload_version))` on a successful write,
    /// `(VERSION_MISMATCH, None)` on a lost CAS or provisioning race, or
    /// whatever status `mutation` itself produced when it is not `OK`.
    pub async fn read_modify_write<F>(&self, key: &str, mutation: F) -> (StoreStatus, Option<u64>)
    where
        F: FnOnce(Option<&[u8]>) -> (StoreStatus, Vec<u8>),
    {
        let Some((table, row_key)) = split_key(key) else {
            return (StoreStatus::InvalidParam, None);
        };
        let Some(client) = self.shared.acquire().await else {
            return (StoreStatus::Shutdown, None);
        };

        let select_stmt =
            format!("SELECT value, version FROM {table} WHERE key = '{}'", quote(row_key));
        let read_results = client.query(&[select_stmt]).await;
        let Some(read_result) = read_results.results.first() else {
            return (StoreStatus::Failed, None);
        };

        let (existing_value, row_version) = if read_result.is_ok() {
            match read_result.values.first() {
                Some(row) => {
                    let value_hex = row.first().and_then(Value::as_str).unwrap_or_default();
                    let version = row.get(1).and_then(Value::as_i64);
                    match hex_decode(value_hex) {
                        Some(bytes) => (Some(bytes), version),
                        None => return (StoreStatus::BadMsg, None),
                    }
                }
                None => (None, None),
            }
        } else if match_error(&read_result.error, NO_SUCH_TABLE) {
            (None, None)
        } else {
            return (StoreStatus::Failed, None);
        };

        let (mutation_status, new_value) = mutation(existing_value.as_deref());
        if mutation_status != StoreStatus::Ok {
            return (mutation_status, None);
        }

        let Some(payload_version) = (self.extract_version)(&new_value) else {
            return (StoreStatus::InvalidParam, None);
        };

        if let Some(previous) = existing_value.as_deref().and_then(|v| (self.extract_version)(v)) {
            if previous >= payload_version && self.version_warnings.should_fire() {
                tracing::warn!(
                    key,
                    previous_version = previous,
                    new_version = payload_version,
                    "write did not advance the payload version"
                );
            }
        }

        let value_hex = hex_encode(&new_value);

        if let Some(row_version) = row_version {
            let update_stmt = format!(
                "UPDATE {table} SET value = '{}', version = {} WHERE key = '{}' AND version = {}",
                quote(&value_hex),
                row_version + 1,
                quote(row_key),
                row_version
            );
            let write_results = client.execute(&[update_stmt], false).await;
            let Some(write_result) = write_results.results.first() else {
                return (StoreStatus::Failed, None);
            };
            if !write_result.is_ok() {
                return (StoreStatus::Failed, None);
            }
            return match write_result.rows_affected {
                0 => (StoreStatus::VersionMismatch, None),
                1 => (StoreStatus::Ok, Some(payload_version)),
                _ => (StoreStatus::Internal, None),
            };
        }

        let create_stmt = format!(
            "CREATE TABLE IF NOT EXISTS {table} (key TEXT PRIMARY KEY, value TEXT, version INTEGER) STRICT"
        );
        let insert_stmt = format!(
            "INSERT INTO {table} (key, value, version) VALUES ('{}', '{}', 0)",
            quote(row_key),
            quote(&value_hex)
        );
        let write_results = client.execute(&[create_stmt, insert_stmt], true).await;
        let Some(insert_result) = write_results.results.get(1) else {
            return (StoreStatus::Failed, None);
        };
        if insert_result.is_ok() && insert_result.rows_affected == 1 {
            return (StoreStatus::Ok, Some(payload_version));
        }
        if match_error(&insert_result.error, UNIQUE_CONSTRAINT_FAILED) {
            return (StoreStatus::VersionMismatch, None);
        }
        (StoreStatus::Failed, None)
    }

    /// Begins shutdown: see `spec.md §5`. After this returns, no further
    /// operation on this store will dispatch a request.
    pub async fn shutdown(&self) {
        self.shared.shutdown().await;
    }
}
