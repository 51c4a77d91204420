//! In-process locks per (sub-court, date)
//!
//! Booking writers take the locks for every (sub-court, date) they touch
//! before the slot check and hold them until the commit returns. Keys are
//! locked in sorted order, so two writers never wait on each other in a
//! cycle.

use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::NaiveDate;
use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};

pub type SlotKey = (i32, NaiveDate);

#[derive(Default)]
pub struct SlotLocks {
    locks: DashMap<SlotKey, Arc<Mutex<()>>>,
}

/// Held locks; released on drop.
pub struct SlotGuard {
    _guards: Vec<OwnedMutexGuard<()>>,
}

impl SlotLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn acquire(&self, keys: impl IntoIterator<Item = SlotKey>) -> SlotGuard {
        let ordered: BTreeSet<SlotKey> = keys.into_iter().collect();
        let mut guards = Vec::with_capacity(ordered.len());
        for key in ordered {
            // Clone the Arc out so no map shard stays locked across the await
            let lock = self.locks.entry(key).or_default().value().clone();
            guards.push(lock.lock_owned().await);
        }
        SlotGuard { _guards: guards }
    }

    /// Drop locks nobody holds or waits on.
    pub fn prune(&self) -> usize {
        let before = self.locks.len();
        self.locks.retain(|_, lock| Arc::strong_count(lock) > 1);
        before - self.locks.len()
    }

    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}
