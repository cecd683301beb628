// SECTION: Shared client lifetime

use std::ops::Deref;
use std::sync::atomic::{AtomicBool, Ordering};

use rqlite_client::RqliteClient;
use tokio::sync::{RwLock, RwLockReadGuard};

/// Owns the [`RqliteClient`] shared by every in-flight operation of a
/// [`crate::VersionedConfigStore`] or [`crate::EpochStore`], enforcing the
/// readers-writer shutdown-drain discipline.
///
/// Every operation that intends to issue a request acquires a read hold
/// via [`Self::acquire`] before dispatching, and keeps it alive through its
/// whole callback chain (in this async translation: across the `.await`
/// points of the request it is servicing). `shutdown()` sets a flag and
/// then takes the write hold, which blocks until every outstanding read
/// hold has dropped.
#[derive(Debug)]
pub struct SharedClient {
    /// The wrapped rqlite client.
    client: RqliteClient,
    /// Set once shutdown has begun; checked before and after acquiring a
    /// read hold.
    shutdown_signaled: AtomicBool,
    /// The readers-writer gate: operations hold a read lock, shutdown
    /// takes the write lock to drain them.
    lock: RwLock<()>,
}

impl SharedClient {
    /// Wraps `client` for shared, shutdown-aware use.
    #[must_use]
    pub fn new(client: RqliteClient) -> Self {
        Self {
            client,
            shutdown_signaled: AtomicBool::new(false),
            lock: RwLock::new(()),
        }
    }

    /// Acquires a read hold on the client, or `None` if shutdown has been
    /// signaled.
    ///
    /// Checked twice, mirroring the source's check-before-dispatch and
    /// check-again-inside-the-completion-callback pattern: once before
    /// taking the lock (fast path, avoids contending with a draining
    /// shutdown for no reason) and once after (closes the race where
    /// shutdown is signaled between the first check and the lock being
    /// granted).
    pub async fn acquire(&self) -> Option<ClientHandle<'_>> {
        if self.shutdown_signaled.load(Ordering::SeqCst) {
            return None;
        }
        let guard = self.lock.read().await;
        if self.shutdown_signaled.load(Ordering::SeqCst) {
            drop(guard);
            return None;
        }
        Some(ClientHandle {
            guard,
            client: &self.client,
        })
    }

    /// Signals shutdown and waits for every outstanding read hold to drop.
    ///
    /// After this returns, no future call to [`Self::acquire`] will
    /// succeed, so no further operation can dispatch a request.
    pub async fn shutdown(&self) {
        self.shutdown_signaled.store(true, Ordering::SeqCst);
        let _write_hold = self.lock.write().await;
        tracing::debug!("store client drained and shut down");
    }
}

/// A live read hold on the shared client, dereferencing to [`RqliteClient`].
pub struct ClientHandle<'a> {
    /// Held until the handle drops; releases the read hold on drop.
    guard: RwLockReadGuard<'a, ()>,
    /// The underlying client, reachable via `Deref`.
    client: &'a RqliteClient,
}

impl Deref for ClientHandle<'_> {
    type Target = RqliteClient;

    fn deref(&self) -> &Self::Target {
        self.client
    }
}
