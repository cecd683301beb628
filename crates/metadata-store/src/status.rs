// SECTION: Status taxonomy

/// Outcome of a store operation.
///
/// This is the taxonomy from the component design: not every variant is a
/// `std::error::Error` in the usual sense — `Ok` and `UpToDate` are
/// successful outcomes — so `StoreStatus` is delivered as a plain value,
/// not wrapped in `Result`'s `Err` arm. Construction-time failures (an
/// unparseable endpoint, a client that fails to build) are a separate
/// concern, surfaced as a `Result` by [`rqlite_client::RqliteClientError`]
/// before a store ever exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreStatus {
    /// The operation succeeded.
    Ok,
    /// The row, or its table, does not exist.
    NotFound,
    /// VCS-only: a base-version read found nothing newer than the caller's
    /// base.
    UpToDate,
    /// VCS CAS failed, or a VCS provisioning race was lost.
    VersionMismatch,
    /// Epoch Store CAS failed (the epoch-store analogue of
    /// `VersionMismatch`, but never used for a provisioning race — that is
    /// `Failed`).
    Again,
    /// A stored value, or a caller-supplied value, could not be parsed.
    BadMsg,
    /// An argument precondition was violated before any network call was
    /// attempted.
    InvalidParam,
    /// The store has begun shutdown; no further callbacks will fire.
    Shutdown,
    /// A transport error, or a SQL error not otherwise classified.
    Failed,
    /// An invariant was violated (e.g. `rows_affected > 1` on a primary-key
    /// match).
    Internal,
}

impl StoreStatus {
    /// True for `Ok` and `UpToDate`: the two variants that represent a
    /// successful outcome rather than a failure to apply the operation.
    #[must_use]
    pub fn is_success(self) -> bool {
        matches!(self, Self::Ok | Self::UpToDate)
    }
}
