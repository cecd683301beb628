// SECTION: Epoch Store (C4)

use std::sync::Arc;

use serde_json::Value;

use crate::codec::{hex_decode, hex_encode, match_error, NO_SUCH_TABLE, UNIQUE_CONSTRAINT_FAILED};
use crate::guard::SharedClient;
use crate::sql::{quote, split_znode_path};
use crate::status::StoreStatus;
use rqlite_client::RqliteClient;

/// The three per-log tables an `EpochStore` maintains for one cluster.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Column {
    /// Epoch metadata.
    Sequencer,
    /// Last-clean-epoch marker for data logs.
    Lce,
    /// Last-clean-epoch marker for metadata logs.
    MetadataLce,
}

impl Column {
    /// The SQL column name storing this family's opaque payload.
    const fn name(self) -> &'static str {
        match self {
            Self::Sequencer => "sequencer",
            Self::Lce => "lce",
            Self::MetadataLce => "metadatalog_lce",
        }
    }
}

/// What an [`EpochStoreRequest`] decided to do after inspecting the
/// current row state, per `spec.md §4.3`'s state machine.
enum NextStep {
    /// The log has never been seen; provision all three tables/rows,
    /// writing `sequencer_value` into the sequencer row and leaving both
    /// LCE rows empty (see `SPEC_FULL.md §2` item 4 on provisioning
    /// order, grounded on the original's `provisionLogRows`).
    Provision(Vec<u8>),
    /// Write `new_value` into this request's target column with a CAS
    /// update.
    Modify(Vec<u8>),
    /// Complete immediately without writing. Legitimate only for
    /// `GetLastCleanEpoch` with `Ok`, or `EpochMetaData` with `UpToDate`
    /// (`spec.md §4.3` tie-breaks).
    Stop(StoreStatus, Vec<u8>),
}

/// The tagged sum type over the three request kinds, operating on the
/// fixed capability set `{column, apply_changes}` (`spec.md §9`'s design
/// note on polymorphism over request kinds).
trait EpochStoreRequest: Send {
    /// The table/column this request reads and, on `Modify`, writes.
    fn column(&self) -> Column;

    /// Decides the next step given the current value for this request's
    /// column (`None` if the log has never been provisioned).
    fn apply_changes(self: Box<Self>, existing: Option<&[u8]>) -> NextStep;
}

/// Reads the last-clean-epoch marker; never writes.
struct GetLastCleanEpochRequest;

impl EpochStoreRequest for GetLastCleanEpochRequest {
    fn column(&self) -> Column {
        Column::Lce
    }

    fn apply_changes(self: Box<Self>, existing: Option<&[u8]>) -> NextStep {
        match existing {
            Some(bytes) => NextStep::Stop(StoreStatus::Ok, bytes.to_vec()),
            None => NextStep::Provision(Vec::new()),
        }
    }
}

/// Writes a new last-clean-epoch marker.
struct SetLastCleanEpochRequest {
    /// The new last-clean-epoch number.
    lce: u64,
    /// Opaque tail-record bytes stored alongside the epoch number.
    tail_record: Vec<u8>,
}

impl EpochStoreRequest for SetLastCleanEpochRequest {
    fn column(&self) -> Column {
        Column::Lce
    }

    fn apply_changes(self: Box<Self>, existing: Option<&[u8]>) -> NextStep {
        let mut encoded = self.lce.to_be_bytes().to_vec();
        encoded.extend_from_slice(&self.tail_record);
        match existing {
            Some(_) => NextStep::Modify(encoded),
            None => NextStep::Provision(Vec::new()),
        }
    }
}

/// What a caller-supplied metadata updater decided, mirroring
/// `applyChanges`'s `NextStep` but scoped to the two outcomes an
/// `EpochMetaData` request may legitimately produce.
pub enum MetadataDecision {
    /// No update needed; the caller's proposed metadata does not improve
    /// on what is stored (completes with `UP_TO_DATE`).
    UpToDate,
    /// Write `bytes` as the new epoch metadata.
    Write(Vec<u8>),
    /// Reject the request outright (e.g. caller-side precondition
    /// failure discovered only once the current value is known).
    Reject(StoreStatus),
}

/// Creates or updates epoch metadata via a caller-supplied decision
/// function.
struct EpochMetaDataRequest<F> {
    /// Decides what to write (or whether to write at all) given the
    /// current metadata, if any.
    updater: F,
}

impl<F> EpochStoreRequest for EpochMetaDataRequest<F>
where
    F: FnOnce(Option<&[u8]>) -> MetadataDecision + Send,
{
    fn column(&self) -> Column {
        Column::Sequencer
    }

    fn apply_changes(self: Box<Self>, existing: Option<&[u8]>) -> NextStep {
        match (self.updater)(existing) {
            MetadataDecision::Write(bytes) if existing.is_some() => NextStep::Modify(bytes),
            MetadataDecision::Write(bytes) => NextStep::Provision(bytes),
            MetadataDecision::UpToDate => {
                NextStep::Stop(StoreStatus::UpToDate, existing.unwrap_or_default().to_vec())
            }
            MetadataDecision::Reject(status) => NextStep::Stop(status, Vec::new()),
        }
    }
}

/// Per-log epoch metadata and last-clean-epoch storage for one cluster,
/// layered over the same CAS primitive as [`crate::VersionedConfigStore`]
/// (`spec.md §4.3`).
pub struct EpochStore {
    /// The shutdown-aware, shared rqlite client.
    shared: Arc<SharedClient>,
    /// The cluster name embedded in every table name.
    cluster: String,
    /// The rqlite endpoint URL, captured for `identify()`.
    base_url: String,
}

impl EpochStore {
    /// Builds a store over `client` for cluster `cluster`.
    #[must_use]
    pub fn new(client: RqliteClient, cluster: impl Into<String>) -> Self {
        let base_url = client.url().to_string();
        Self {
            shared: Arc::new(SharedClient::new(client)),
            cluster: cluster.into(),
            base_url,
        }
    }

    /// Returns `rqlite://<url>/<tablePrefix>`, per `spec.md §6`.
    ///
    /// `base_url` is always a fully-parsed, scheme-qualified URL (unlike
    /// the original C++, where `getUrl()` returns whatever raw `host:port`
    /// string the caller configured); the scheme and its following `//`
    /// are stripped here so the single `rqlite://` prefix added below does
    /// not double up into `rqlite://http://host:port/...`.
    #[must_use]
    pub fn identify(&self) -> String {
        let authority = self
            .base_url
            .split_once("://")
            .map_or(self.base_url.as_str(), |(_, rest)| rest)
            .trim_end_matches('/');
        format!("rqlite://{authority}/{}", self.table_prefix())
    }

    /// Reads the last-clean-epoch marker for `logid`.
    pub async fn get_last_clean_epoch(&self, logid: &str) -> (StoreStatus, Vec<u8>) {
        self.run_request(logid, Box::new(GetLastCleanEpochRequest)).await
    }

    /// Sets the last-clean-epoch marker for `logid`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreStatus::InvalidParam`] synchronously if `logid` is
    /// empty, before any network call is attempted — mirroring the
    /// original's pre-validation ahead of its async path
    /// (`SPEC_FULL.md §2` item 1 context).
    pub async fn set_last_clean_epoch(
        &self,
        logid: &str,
        lce: u64,
        tail_record: Vec<u8>,
    ) -> StoreStatus {
        if logid.is_empty() {
            return StoreStatus::InvalidParam;
        }
        let (status, _) = self
            .run_request(logid, Box::new(SetLastCleanEpochRequest { lce, tail_record }))
            .await;
        status
    }

    /// Creates or updates the epoch metadata for `logid`.
    ///
    /// `updater` sees the current metadata bytes (`None` for a fresh log)
    /// and decides whether to write, report up-to-date, or reject.
    pub async fn create_or_update_metadata<F>(&self, logid: &str, updater: F) -> StoreStatus
    where
        F: FnOnce(Option<&[u8]>) -> MetadataDecision + Send + 'static,
    {
        if logid.is_empty() {
            return StoreStatus::InvalidParam;
        }
        let (status, _) = self
            .run_request(logid, Box::new(EpochMetaDataRequest { updater }))
            .await;
        status
    }

    /// Begins shutdown: see `spec.md §5`.
    pub async fn shutdown(&self) {
        self.shared.shutdown().await;
    }

    /// `logdevice_<cluster>_logs_`, the shared prefix of all three table
    /// names.
    fn table_prefix(&self) -> String {
        format!("logdevice_{}_logs_", self.cluster)
    }

    /// The full table name for `column`.
    fn table_name(&self, column: Column) -> String {
        format!("{}{}", self.table_prefix(), column.name())
    }

    /// Runs the read → decide → (provision | modify | stop) state machine
    /// for one request.
    async fn run_request(
        &self,
        logid: &str,
        request: Box<dyn EpochStoreRequest>,
    ) -> (StoreStatus, Vec<u8>) {
        let Some(client) = self.shared.acquire().await else {
            return (StoreStatus::Shutdown, Vec::new());
        };

        let column = request.column();
        let path = format!("/{logid}/{}", column.name());
        match split_znode_path(&path) {
            Some((split_logid, split_column)) if split_logid == logid && split_column == column.name() => {}
            _ => return (StoreStatus::InvalidParam, Vec::new()),
        }
        tracing::debug!(path = %path, "epoch store request");

        let table = self.table_name(column);
        let select_stmt = format!(
            "SELECT {col}, version FROM {table} WHERE logid = '{}'",
            quote(logid),
            col = column.name()
        );
        let results = client.query(&[select_stmt]).await;
        let Some(result) = results.results.first() else {
            return (StoreStatus::Failed, Vec::new());
        };

        let (existing, row_version) = if result.is_ok() {
            match result.values.first() {
                Some(row) => {
                    let value_hex = row.first().and_then(Value::as_str).unwrap_or_default();
                    let version = row.get(1).and_then(Value::as_i64);
                    match hex_decode(value_hex) {
                        Some(bytes) => (Some(bytes), version),
                        None => return (StoreStatus::BadMsg, Vec::new()),
                    }
                }
                None => (None, None),
            }
        } else if match_error(&result.error, NO_SUCH_TABLE) {
            (None, None)
        } else {
            return (StoreStatus::Failed, Vec::new());
        };

        match request.apply_changes(existing.as_deref()) {
            NextStep::Stop(status, value) => (status, value),
            NextStep::Modify(new_value) => {
                let Some(row_version) = row_version else {
                    return (StoreStatus::Internal, Vec::new());
                };
                let value_hex = hex_encode(&new_value);
                let update_stmt = format!(
                    "UPDATE {table} SET {col} = '{}', version = {} WHERE logid = '{}' AND version = {}",
                    quote(&value_hex),
                    row_version + 1,
                    quote(logid),
                    row_version,
                    col = column.name()
                );
                let write_results = client.execute(&[update_stmt], false).await;
                let Some(write_result) = write_results.results.first() else {
                    return (StoreStatus::Failed, Vec::new());
                };
                if !write_result.is_ok() {
                    return (StoreStatus::Failed, Vec::new());
                }
                match write_result.rows_affected {
                    0 => (StoreStatus::Again, Vec::new()),
                    1 => (StoreStatus::Ok, new_value),
                    _ => (StoreStatus::Internal, Vec::new()),
                }
            }
            NextStep::Provision(sequencer_value) => {
                self.provision(&client, logid, &sequencer_value).await
            }
        }
    }

    /// Creates all three tables and rows for `logid` in one transactional
    /// batch: sequencer gets `sequencer_value`, both LCE rows start empty
    /// (`spec.md §4.3`, `SPEC_FULL.md §2` item 4).
    async fn provision(
        &self,
        client: &RqliteClient,
        logid: &str,
        sequencer_value: &[u8],
    ) -> (StoreStatus, Vec<u8>) {
        let seq_table = self.table_name(Column::Sequencer);
        let lce_table = self.table_name(Column::Lce);
        let mdlce_table = self.table_name(Column::MetadataLce);

        let stmts = vec![
            format!(
                "CREATE TABLE IF NOT EXISTS {seq_table} (logid TEXT PRIMARY KEY UNIQUE, {col} TEXT, version INTEGER) STRICT",
                col = Column::Sequencer.name()
            ),
            format!(
                "INSERT INTO {seq_table} (logid, {col}, version) VALUES ('{}', '{}', 0)",
                quote(logid),
                quote(&hex_encode(sequencer_value)),
                col = Column::Sequencer.name()
            ),
            format!(
                "CREATE TABLE IF NOT EXISTS {lce_table} (logid TEXT PRIMARY KEY UNIQUE, {col} TEXT, version INTEGER) STRICT",
                col = Column::Lce.name()
            ),
            format!(
                "INSERT INTO {lce_table} (logid, {col}, version) VALUES ('{}', '', 0)",
                quote(logid),
                col = Column::Lce.name()
            ),
            format!(
                "CREATE TABLE IF NOT EXISTS {mdlce_table} (logid TEXT PRIMARY KEY UNIQUE, {col} TEXT, version INTEGER) STRICT",
                col = Column::MetadataLce.name()
            ),
            format!(
                "INSERT INTO {mdlce_table} (logid, {col}, version) VALUES ('{}', '', 0)",
                quote(logid),
                col = Column::MetadataLce.name()
            ),
        ];

        let results = client.execute(&stmts, true).await;
        if results.results.len() < 6 {
            return (StoreStatus::Failed, Vec::new());
        }

        // Each INSERT's own result is checked for both its success and its
        // unique-constraint classification (the Open Question fix recorded
        // in DESIGN.md): indices 1, 3, 5.
        for &index in &[1_usize, 3, 5] {
            let insert = &results.results[index];
            if !insert.is_ok() {
                let lost_race = match_error(&insert.error, UNIQUE_CONSTRAINT_FAILED);
                tracing::warn!(
                    logid,
                    index,
                    error = %insert.error,
                    lost_race,
                    "epoch store provisioning insert failed"
                );
                // A lost provisioning race surfaces as a unique-constraint
                // violation; the epoch store maps this to FAILED, not
                // AGAIN, unlike the VCS (spec.md §4.3 tie-breaks).
                return (StoreStatus::Failed, Vec::new());
            }
        }

        (StoreStatus::Ok, Vec::new())
    }
}
