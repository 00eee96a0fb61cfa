use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::Result;
use oxdesk_common::types::TicketSnapshot;
use oxdesk_storage::{ChangeTable, TicketStore};
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::RwLock;

/// Cached snapshot of open/in-progress tickets, the queue estimator's
/// working set.
///
/// The cache subscribes to the store's change bus and marks itself stale
/// whenever a tickets-table event arrives; the next read refetches. It
/// never patches entries from event payloads, so a lagged subscription
/// degrades to an extra refetch rather than serving wrong data.
pub struct OpenTicketCache {
    store: Arc<TicketStore>,
    snapshots: RwLock<Vec<TicketSnapshot>>,
    stale: AtomicBool,
}

impl OpenTicketCache {
    pub fn new(store: Arc<TicketStore>) -> Arc<Self> {
        Arc::new(Self {
            store,
            snapshots: RwLock::new(Vec::new()),
            stale: AtomicBool::new(true),
        })
    }

    /// Spawn the invalidation listener. Call once at startup.
    pub fn spawn_invalidator(self: &Arc<Self>) {
        let cache = self.clone();
        let mut rx = cache.store.change_bus().subscribe();
        tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(event) => {
                        if event.table == ChangeTable::Tickets {
                            cache.invalidate();
                        }
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::debug!(skipped, "Change bus lagged, invalidating ticket cache");
                        cache.invalidate();
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        });
    }

    pub fn invalidate(&self) {
        self.stale.store(true, Ordering::Release);
    }

    /// Current open-ticket snapshots, refetching from the store if a
    /// change has been observed since the last read.
    pub async fn get(&self) -> Result<Vec<TicketSnapshot>> {
        if self.stale.swap(false, Ordering::AcqRel) {
            match self.store.list_unresolved_snapshots().await {
                Ok(fresh) => {
                    let mut guard = self.snapshots.write().await;
                    *guard = fresh.clone();
                    return Ok(fresh);
                }
                Err(e) => {
                    // retry on the next read
                    self.stale.store(true, Ordering::Release);
                    return Err(e);
                }
            }
        }
        Ok(self.snapshots.read().await.clone())
    }
}
