//! Per-order and per-carrier exclusive locks.
//!
//! Every mutation of a master order's capacity or of its lots runs while holding the master order's lock, so two bids
//! racing for sibling lots are serialised and the second one sees the first one's effects. Bids also take the
//! carrier's lock, so a carrier cannot slip two bids past the quota check at once.
//!
//! Locks are always taken in the order carrier, then order. Nothing ever takes two order locks.
use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use log::trace;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

use crate::db_types::{BiddableOrder, CarrierId, FreightOrderId, MasterOrderId, OrderRef};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum LockKey {
    Master(MasterOrderId),
    Freight(FreightOrderId),
    Carrier(CarrierId),
}

impl LockKey {
    /// The lock guarding a loaded order. A lot is guarded by its master's lock.
    pub fn for_order(order: &BiddableOrder) -> Self {
        match order {
            BiddableOrder::Freight(o) => Self::Freight(o.id),
            BiddableOrder::Master(o) => Self::Master(o.id),
            BiddableOrder::Partial { master, .. } => Self::Master(master.id),
        }
    }

    /// The lock for an order reference, when it can be known without a lookup.
    pub fn for_ref(order: &OrderRef) -> Option<Self> {
        match order {
            OrderRef::FreightOrder(id) => Some(Self::Freight(*id)),
            OrderRef::MasterOrder(id) => Some(Self::Master(*id)),
            OrderRef::PartialOrder(_) => None,
        }
    }
}

#[derive(Clone, Default)]
pub struct OrderLocks {
    locks: Arc<Mutex<HashMap<LockKey, Arc<AsyncMutex<()>>>>>,
}

impl OrderLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn lock(&self, key: LockKey) -> OwnedMutexGuard<()> {
        let mutex = self.entry(key);
        mutex.lock_owned().await
    }

    fn entry(&self, key: LockKey) -> Arc<AsyncMutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        Arc::clone(locks.entry(key).or_default())
    }

    /// Drops every lock that nobody holds or waits for. Returns the number of entries removed.
    pub fn prune(&self) -> usize {
        let mut locks = self.locks.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let before = locks.len();
        locks.retain(|_, mutex| Arc::strong_count(mutex) > 1);
        let pruned = before - locks.len();
        if pruned > 0 {
            trace!("🕰️ Pruned {pruned} idle order locks");
        }
        pruned
    }

    pub fn len(&self) -> usize {
        self.locks.lock().map(|l| l.len()).unwrap_or_else(|poisoned| poisoned.into_inner().len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
