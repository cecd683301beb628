// crates/rqlite-client/src/lib.rs
// ============================================================================
// Module: rqlite-client
// Description: Async HTTP client for rqlite's /db/execute and /db/query.
// Purpose: C1 (Rqlite HTTP Client) and C2 (result envelope decoder).
// Dependencies: reqwest, tokio, serde, serde_json, thiserror, tracing, url.
// ============================================================================

//! ## Overview
//!
//! This crate is the thin transport layer between a caller and one rqlite
//! ensemble: it knows how to POST a JSON array of SQL statements to
//! `/db/execute` or `/db/query` and decode the typed result envelope that
//! comes back. It does not interpret SQL error strings, track row
//! versions, or know about the Versioned Config Store / Epoch Store
//! schemas built on top of it — those live in `metadata-store`.

mod client;
mod endpoint;
mod envelope;
mod error;

pub use client::RqliteClient;
pub use endpoint::RqliteEndpoint;
pub use envelope::{ExecuteResult, ExecuteResults, QueryResult, QueryResults};
pub use error::RqliteClientError;
