//! # Change Feed
//!
//! In-process change notifications and full-snapshot subscriptions.
//!
//! ## Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  SaleRepository::record_sale ──commit──► feed.publish(uid, Products)   │
//! │                                      └─► feed.publish(uid, Sales)      │
//! │                                                │                        │
//! │                              broadcast::Sender<Change>                  │
//! │                                                │                        │
//! │            ┌───────────────────────────────────┼──────────────┐         │
//! │            ▼                                   ▼              ▼         │
//! │   subscription task               subscription task      (other uid:   │
//! │   (uid, Products)                 (uid, Sales)            ignored)     │
//! │      │ re-query full list            │ re-query full list               │
//! │      ▼                               ▼                                  │
//! │   on_change(Vec<Product>)         on_change(Vec<Sale>)                  │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every delivery is a complete snapshot; subscribers replace their state
//! wholesale and never patch it. A lagged receiver loses nothing that
//! matters: it simply re-queries.

use std::future::Future;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::error::{DbError, DbResult};

/// Capacity of the broadcast channel.
const FEED_CAPACITY: usize = 256;

// =============================================================================
// Change
// =============================================================================

/// Per-user collection that changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collection {
    Products,
    Sales,
    Debts,
}

/// A committed write to one user's collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Change {
    pub owner_id: String,
    pub collection: Collection,
}

impl Change {
    fn concerns(&self, owner_id: &str, collection: Collection) -> bool {
        self.collection == collection && self.owner_id == owner_id
    }
}

// =============================================================================
// Change Feed
// =============================================================================

/// Broadcasts [`Change`]s to every live subscription.
#[derive(Debug, Clone)]
pub struct ChangeFeed {
    tx: broadcast::Sender<Change>,
}

impl ChangeFeed {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(FEED_CAPACITY);
        ChangeFeed { tx }
    }

    /// Announces a committed change. Without subscribers this is a no-op.
    pub fn publish(&self, owner_id: &str, collection: Collection) {
        debug!(owner_id = %owner_id, ?collection, "Publishing change");
        let _ = self.tx.send(Change {
            owner_id: owner_id.to_string(),
            collection,
        });
    }

    /// Raw receiver, for callers that want the changes themselves.
    pub fn receiver(&self) -> broadcast::Receiver<Change> {
        self.tx.subscribe()
    }

    /// Number of live receivers.
    pub fn receiver_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for ChangeFeed {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// Subscription
// =============================================================================

/// Handle to a running subscription. Cancelling or dropping it stops
/// delivery (e.g. on sign-out).
#[derive(Debug)]
pub struct Subscription {
    handle: JoinHandle<()>,
}

impl Subscription {
    /// Stops delivery.
    pub fn cancel(self) {
        // Drop aborts the task.
    }

    /// Whether the subscription task is still running.
    pub fn is_active(&self) -> bool {
        !self.handle.is_finished()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// Starts a subscription task.
///
/// The receiver is registered before the initial query runs, so a change
/// committed between the first snapshot and the first `recv` is not missed.
/// Query failures go to `on_error` and the subscription keeps running.
pub(crate) fn subscribe<T, F, Fut, C, E>(
    feed: &ChangeFeed,
    owner_id: String,
    collection: Collection,
    fetch: F,
    mut on_change: C,
    mut on_error: E,
) -> Subscription
where
    T: Send + 'static,
    F: Fn() -> Fut + Send + 'static,
    Fut: Future<Output = DbResult<Vec<T>>> + Send + 'static,
    C: FnMut(Vec<T>) + Send + 'static,
    E: FnMut(DbError) + Send + 'static,
{
    let mut rx = feed.receiver();

    let handle = tokio::spawn(async move {
        debug!(owner_id = %owner_id, ?collection, "Subscription started");

        let mut deliver = |result: DbResult<Vec<T>>| match result {
            Ok(items) => on_change(items),
            Err(e) => on_error(e),
        };

        deliver(fetch().await);

        loop {
            match rx.recv().await {
                Ok(change) if change.concerns(&owner_id, collection) => {
                    deliver(fetch().await);
                }
                Ok(_) => continue,
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(owner_id = %owner_id, ?collection, skipped, "Subscriber lagged, refreshing");
                    deliver(fetch().await);
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }

        debug!(owner_id = %owner_id, ?collection, "Subscription ended");
    });

    Subscription { handle }
}
