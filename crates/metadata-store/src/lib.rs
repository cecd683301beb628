// crates/metadata-store/src/lib.rs
// ============================================================================
// Module: metadata-store
// Description: Versioned Configuration Store and Epoch Store over rqlite.
// Purpose: C3 (VCS), C4 (Epoch Store), and C5 (value codec helpers).
// Dependencies: rqlite-client, tokio, serde_json, tracing.
// ============================================================================

//! ## Overview
//!
//! Two metadata stores built on the same optimistic-CAS read-modify-write
//! primitive over [`rqlite_client::RqliteClient`]:
//!
//! - [`VersionedConfigStore`]: a general-purpose key→(value, version) store.
//! - [`EpochStore`]: per-log epoch metadata and last-clean-epoch markers,
//!   with multi-table provisioning on first contact with a log.
//!
//! Both share [`codec`]'s hex encoding and error classification, and the
//! shutdown-drain discipline in [`guard::SharedClient`].

mod codec;
mod epoch_store;
mod guard;
mod ratelimit;
mod sql;
mod status;
mod vcs;

pub use codec::{hex_decode, hex_encode, match_error};
pub use epoch_store::{EpochStore, MetadataDecision};
pub use status::StoreStatus;
pub use vcs::{ExtractVersion, VersionedConfigStore};

#[cfg(test)]
mod tests {
    #![allow(
        clippy::panic,
        clippy::print_stdout,
        clippy::print_stderr,
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::use_debug,
        clippy::dbg_macro,
        clippy::panic_in_result_fn,
        clippy::unwrap_in_result,
        reason = "Test-only output and panic-based assertions are permitted."
    )]

    use std::sync::Arc;
    use std::thread;

    use rqlite_client::RqliteClient;
    use tiny_http::{Response, Server};

    use crate::{EpochStore, MetadataDecision, StoreStatus, VersionedConfigStore};

    /// A big-endian u64 at the front of the value is the payload version,
    /// matching the style of the source's embedded-version payloads.
    fn extract_u64_prefix(bytes: &[u8]) -> Option<u64> {
        bytes.get(0..8).map(|head| {
            let mut buf = [0_u8; 8];
            buf.copy_from_slice(head);
            u64::from_be_bytes(buf)
        })
    }

    fn versioned(version: u64, tail: &[u8]) -> Vec<u8> {
        let mut out = version.to_be_bytes().to_vec();
        out.extend_from_slice(tail);
        out
    }

    /// Spawns a scripted rqlite mock that replies with each body in
    /// `responses`, in order, one per request received.
    fn spawn_scripted_server(
        responses: Vec<&'static str>,
    ) -> (String, thread::JoinHandle<()>) {
        let server = Server::http("127.0.0.1:0").expect("http server");
        let addr = server.server_addr();
        let handle = thread::spawn(move || {
            for body in responses {
                if let Ok(request) = server.recv() {
                    request
                        .respond(Response::from_string(body))
                        .expect("respond");
                } else {
                    break;
                }
            }
        });
        (format!("http://{addr}"), handle)
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn first_write_then_read_round_trips() {
        let (url, handle) = spawn_scripted_server(vec![
            r#"{"results":[{"error":"no such table: cfg"}]}"#,
            r#"{"results":[{"rows_affected":1},{"rows_affected":1}]}"#,
            r#"{"results":[{"columns":["value","version"],"values":[["76616c75652d76310000000000000001"]]}]}"#,
        ]);
        let client = RqliteClient::new(&url).expect("client");
        let store = VersionedConfigStore::new(client, Arc::new(extract_u64_prefix));

        let (status, payload_version) = store
            .read_modify_write("cfg/k1", |_existing| {
                (StoreStatus::Ok, versioned(1, b"value-v1"))
            })
            .await;
        assert_eq!(status, StoreStatus::Ok);
        assert_eq!(payload_version, Some(1));

        let (status, value) = store.get_config("cfg/k1", None).await;
        assert_eq!(status, StoreStatus::Ok);
        assert_eq!(value, versioned(1, b"value-v1"));

        handle.join().expect("server thread");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn provisioning_race_maps_to_version_mismatch() {
        let (url, handle) = spawn_scripted_server(vec![
            r#"{"results":[{"error":"no such table: cfg"}]}"#,
            r#"{"results":[{"rows_affected":0},{"error":"UNIQUE constraint failed: cfg.key"}]}"#,
        ]);
        let client = RqliteClient::new(&url).expect("client");
        let store = VersionedConfigStore::new(client, Arc::new(extract_u64_prefix));

        let (status, payload_version) = store
            .read_modify_write("cfg/k2", |_existing| (StoreStatus::Ok, versioned(1, b"v")))
            .await;
        assert_eq!(status, StoreStatus::VersionMismatch);
        assert_eq!(payload_version, None);

        handle.join().expect("server thread");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn stale_cas_write_is_rejected() {
        let (url, handle) = spawn_scripted_server(vec![
            r#"{"results":[{"columns":["value","version"],"values":[["76616c75652d76310000000000000000", 0]]}]}"#,
            r#"{"results":[{"rows_affected":0}]}"#,
        ]);
        let client = RqliteClient::new(&url).expect("client");
        let store = VersionedConfigStore::new(client, Arc::new(extract_u64_prefix));

        let (status, payload_version) = store
            .read_modify_write("cfg/k1", |_existing| (StoreStatus::Ok, versioned(2, b"v2")))
            .await;
        assert_eq!(status, StoreStatus::VersionMismatch);
        assert_eq!(payload_version, None);

        handle.join().expect("server thread");
    }

    /// Spawns a mock rqlite that adjudicates a real provisioning race: every
    /// `SELECT` sees no such table, and of the two transactional
    /// create+insert batches that follow, the first to arrive wins (row
    /// inserted) and the second loses (unique-constraint error) — whichever
    /// of the two concurrent callers actually gets there first, not a fixed
    /// response script keyed by call order.
    fn spawn_racing_server() -> (String, thread::JoinHandle<()>) {
        let server = Server::http("127.0.0.1:0").expect("http server");
        let addr = server.server_addr();
        let insert_settled = Arc::new(std::sync::atomic::AtomicBool::new(false));
        let handle = thread::spawn(move || {
            for _ in 0..4 {
                let Ok(mut request) = server.recv() else {
                    break;
                };
                let mut body = String::new();
                std::io::Read::read_to_string(request.as_reader(), &mut body).expect("read body");
                let response_body = if body.contains("INSERT INTO") {
                    let already_won = insert_settled.swap(true, std::sync::atomic::Ordering::SeqCst);
                    if already_won {
                        r#"{"results":[{"rows_affected":1},{"error":"UNIQUE constraint failed: cfg.key"}]}"#
                    } else {
                        r#"{"results":[{"rows_affected":1},{"rows_affected":1}]}"#
                    }
                } else {
                    r#"{"results":[{"error":"no such table: cfg"}]}"#
                };
                request
                    .respond(Response::from_string(response_body))
                    .expect("respond");
            }
        });
        (format!("http://{addr}"), handle)
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn exactly_one_of_two_concurrent_first_writes_wins() {
        let (url, handle) = spawn_racing_server();

        let make_store = || {
            let client = RqliteClient::new(&url).expect("client");
            Arc::new(VersionedConfigStore::new(client, Arc::new(extract_u64_prefix)))
        };
        let store_a = make_store();
        let store_b = make_store();

        let task_a = tokio::spawn(async move {
            store_a
                .read_modify_write("cfg/fresh-key", |_existing| {
                    (StoreStatus::Ok, versioned(1, b"from-a"))
                })
                .await
        });
        let task_b = tokio::spawn(async move {
            store_b
                .read_modify_write("cfg/fresh-key", |_existing| {
                    (StoreStatus::Ok, versioned(1, b"from-b"))
                })
                .await
        });

        let (status_a, _) = task_a.await.expect("task a");
        let (status_b, _) = task_b.await.expect("task b");

        let outcomes = [status_a, status_b];
        assert_eq!(outcomes.iter().filter(|s| **s == StoreStatus::Ok).count(), 1);
        assert_eq!(
            outcomes.iter().filter(|s| **s == StoreStatus::VersionMismatch).count(),
            1
        );

        handle.join().expect("server thread");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn splitkey_precondition_is_checked_before_any_request() {
        let client = RqliteClient::new("http://127.0.0.1:1").expect("client");
        let store = VersionedConfigStore::new(client, Arc::new(extract_u64_prefix));

        let (status, _) = store.get_config("malformed-key", None).await;
        assert_eq!(status, StoreStatus::InvalidParam);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn epoch_store_provisions_three_rows_for_a_fresh_log() {
        let (url, handle) = spawn_scripted_server(vec![
            r#"{"results":[{"error":"no such table: logdevice_x_logs_sequencer"}]}"#,
            r#"{"results":[{"rows_affected":1},{"rows_affected":1},{"rows_affected":1},{"rows_affected":1},{"rows_affected":1},{"rows_affected":1}]}"#,
        ]);
        let client = RqliteClient::new(&url).expect("client");
        let store = EpochStore::new(client, "x");

        let status = store
            .create_or_update_metadata("42", |existing| {
                assert!(existing.is_none());
                MetadataDecision::Write(versioned(1, b"meta"))
            })
            .await;
        assert_eq!(status, StoreStatus::Ok);

        handle.join().expect("server thread");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn get_last_clean_epoch_stops_on_an_existing_empty_row() {
        let (url, handle) = spawn_scripted_server(vec![
            r#"{"results":[{"columns":["lce","version"],"values":[[""]]}]}"#,
        ]);
        let client = RqliteClient::new(&url).expect("client");
        let store = EpochStore::new(client, "x");

        let (status, value) = store.get_last_clean_epoch("42").await;
        assert_eq!(status, StoreStatus::Ok);
        assert!(value.is_empty());

        handle.join().expect("server thread");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn identify_reports_url_and_table_prefix() {
        let client = RqliteClient::new("http://127.0.0.1:4001").expect("client");
        let store = EpochStore::new(client, "cluster1");
        assert_eq!(store.identify(), "rqlite://127.0.0.1:4001/logdevice_cluster1_logs_");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn epoch_store_rejects_a_logid_containing_a_slash() {
        let client = RqliteClient::new("http://127.0.0.1:1").expect("client");
        let store = EpochStore::new(client, "x");

        let (status, _) = store.get_last_clean_epoch("42/extra").await;
        assert_eq!(status, StoreStatus::InvalidParam);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn shutdown_rejects_new_vcs_operations() {
        let client = RqliteClient::new("http://127.0.0.1:1").expect("client");
        let store = VersionedConfigStore::new(client, Arc::new(extract_u64_prefix));
        store.shutdown().await;

        let (status, _) = store.get_config("cfg/k1", None).await;
        assert_eq!(status, StoreStatus::Shutdown);
    }
}
