//! An in-process backend holding every record behind a single `tokio` read-write lock.
//!
//! Writers take the write lock for the whole of a [`ChangeSet`], validate every reference first and only then
//! mutate, so a failed change set leaves the store untouched.
mod errors;

use std::{
    collections::{BTreeMap, HashMap},
    sync::Arc,
};

use chrono::Utc;
use fae_common::{Money, Volume, Weight};
pub use errors::MemoryDatabaseError;
use log::*;
use tokio::sync::RwLock;

use crate::{
    db::traits::{
        AppliedChanges,
        AuctionDatabase,
        BidManagement,
        CarrierManagement,
        ChangeSet,
        DatabaseBackend,
        NewBidRecord,
        NewLotRecord,
        OrderManagement,
    },
    db_types::{
        Bid,
        BidId,
        BidStatus,
        CargoCategory,
        CarrierId,
        CarrierProfile,
        ComplianceSnapshot,
        FreightOrder,
        FreightOrderId,
        FreightOrderStatus,
        MasterOrder,
        MasterOrderId,
        MasterOrderStatus,
        NewFreightOrder,
        NewMasterOrder,
        OrderKind,
        OrderRef,
        PartialOrder,
        PartialOrderId,
        ScoreBreakdown,
    },
};

const MEMORY_DB_URL: &str = "memory://";

#[derive(Clone, Default)]
pub struct MemoryDatabase {
    store: Arc<RwLock<MemoryStore>>,
}

impl std::fmt::Debug for MemoryDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "MemoryDatabase")
    }
}

impl MemoryDatabase {
    pub fn new() -> Self {
        Self::default()
    }
}

#[derive(Default)]
struct MemoryStore {
    last_id: i64,
    masters: BTreeMap<MasterOrderId, MasterOrder>,
    lots: BTreeMap<PartialOrderId, PartialOrder>,
    freight: BTreeMap<FreightOrderId, FreightOrder>,
    bids: BTreeMap<BidId, Bid>,
    compliance: HashMap<BidId, ComplianceSnapshot>,
    carriers: HashMap<CarrierId, CarrierProfile>,
}

impl MemoryStore {
    fn next_id(&mut self) -> i64 {
        self.last_id += 1;
        self.last_id
    }

    fn order_exists(&self, order: &OrderRef) -> bool {
        match order {
            OrderRef::FreightOrder(id) => self.freight.contains_key(id),
            OrderRef::MasterOrder(id) => self.masters.contains_key(id),
            OrderRef::PartialOrder(id) => self.lots.contains_key(id),
        }
    }

    fn category_of(&self, order: &OrderRef) -> Option<CargoCategory> {
        match order {
            OrderRef::FreightOrder(id) => self.freight.get(id).map(|o| o.cargo_category),
            OrderRef::MasterOrder(id) => self.masters.get(id).map(|o| o.cargo_category),
            OrderRef::PartialOrder(id) => {
                self.lots.get(id).and_then(|lot| self.masters.get(&lot.master_order_id)).map(|m| m.cargo_category)
            },
        }
    }

    fn validate(&self, changes: &ChangeSet) -> Result<(), MemoryDatabaseError> {
        let missing = |what: String| Err(MemoryDatabaseError::NotFound(what));
        for update in &changes.master_updates {
            if !self.masters.contains_key(&update.id) {
                return missing(update.id.to_string());
            }
        }
        for update in &changes.freight_updates {
            if !self.freight.contains_key(&update.id) {
                return missing(update.id.to_string());
            }
        }
        for lot in &changes.new_lots {
            if !self.masters.contains_key(&lot.master_order_id) {
                return missing(lot.master_order_id.to_string());
            }
        }
        for update in &changes.lot_updates {
            if !self.lots.contains_key(&update.id) {
                return missing(update.id.to_string());
            }
        }
        if let Some(bid) = &changes.new_bid {
            if !self.order_exists(&bid.order_ref) {
                return missing(bid.order_ref.to_string());
            }
        }
        for update in &changes.bid_updates {
            if !self.bids.contains_key(&update.id) {
                return missing(update.id.to_string());
            }
        }
        Ok(())
    }

    fn insert_lot(&mut self, record: NewLotRecord) -> PartialOrder {
        let now = Utc::now();
        let lot = PartialOrder {
            id: PartialOrderId(self.next_id()),
            master_order_id: record.master_order_id,
            weight: record.weight,
            volume: record.volume,
            percentage: record.percentage,
            assigned_carrier_id: record.assigned_carrier_id,
            assigned_bid_id: record.assigned_bid_id,
            status: record.status,
            created_at: now,
            updated_at: now,
        };
        self.lots.insert(lot.id, lot.clone());
        lot
    }

    fn insert_bid(&mut self, record: NewBidRecord) -> Bid {
        let now = Utc::now();
        let bid = Bid {
            id: BidId(self.next_id()),
            carrier_id: record.carrier_id,
            order_ref: record.order_ref,
            amount: record.amount,
            weight: record.weight,
            proposed_delivery_date: record.proposed_delivery_date,
            notes: record.notes,
            status: BidStatus::Pending,
            match_score: None,
            score_breakdown: None,
            created_at: now,
            updated_at: now,
        };
        if let Some(compliance) = record.compliance {
            let snapshot = ComplianceSnapshot {
                bid_id: bid.id,
                carrier_id: bid.carrier_id.clone(),
                compliance_status: compliance.compliance_status,
                security_level: compliance.security_level,
                trust_score: compliance.trust_score,
                violations: compliance.violations,
                checked_at: now,
            };
            self.compliance.insert(bid.id, snapshot);
        }
        self.bids.insert(bid.id, bid.clone());
        bid
    }

    fn apply(&mut self, changes: ChangeSet) -> AppliedChanges {
        let now = Utc::now();
        let mut result = AppliedChanges::default();
        for update in changes.master_updates {
            if let Some(order) = self.masters.get_mut(&update.id) {
                if let Some(w) = update.remaining_weight {
                    order.remaining_weight = w;
                }
                if let Some(v) = update.remaining_volume {
                    order.remaining_volume = v;
                }
                if let Some(status) = update.status {
                    order.status = status;
                }
                if let Some(close) = update.close_time {
                    order.required_delivery_date = order.required_delivery_date.max(close);
                }
                if let Some(count) = update.extension_count {
                    order.extension_count = count;
                }
                order.updated_at = now;
            }
        }
        for update in changes.freight_updates {
            if let Some(order) = self.freight.get_mut(&update.id) {
                if let Some(status) = update.status {
                    order.status = status;
                }
                if let Some(close) = update.close_time {
                    order.required_delivery_date = order.required_delivery_date.max(close);
                }
                if let Some(count) = update.extension_count {
                    order.extension_count = count;
                }
                if let Some(bid_id) = update.awarded_bid_id {
                    order.awarded_bid_id = Some(bid_id);
                }
                order.updated_at = now;
            }
        }
        for record in changes.new_lots {
            let lot = self.insert_lot(record);
            result.lots.push(lot);
        }
        for update in changes.lot_updates {
            if let Some(lot) = self.lots.get_mut(&update.id) {
                lot.status = update.status;
                if update.assigned_carrier_id.is_some() {
                    lot.assigned_carrier_id = update.assigned_carrier_id;
                }
                if update.assigned_bid_id.is_some() {
                    lot.assigned_bid_id = update.assigned_bid_id;
                }
                lot.updated_at = now;
            }
        }
        if let Some(record) = changes.new_bid {
            result.bid = Some(self.insert_bid(record));
        }
        for update in changes.bid_updates {
            if let Some(bid) = self.bids.get_mut(&update.id) {
                bid.status = update.status;
                bid.updated_at = now;
            }
        }
        for delta in changes.carrier_stats {
            let profile =
                self.carriers.entry(delta.carrier_id.clone()).or_insert_with(|| CarrierProfile::new(delta.carrier_id));
            profile.total_orders += delta.total_orders;
            profile.completed_orders += delta.completed_orders;
            profile.updated_at = now;
        }
        result
    }
}

fn status_matches<S: PartialEq>(statuses: &[S], status: &S) -> bool {
    statuses.is_empty() || statuses.contains(status)
}

impl DatabaseBackend for MemoryDatabase {
    type Error = MemoryDatabaseError;

    fn url(&self) -> &str {
        MEMORY_DB_URL
    }
}

impl OrderManagement for MemoryDatabase {
    async fn fetch_master_order(&self, id: MasterOrderId) -> Result<Option<MasterOrder>, Self::Error> {
        Ok(self.store.read().await.masters.get(&id).cloned())
    }

    async fn fetch_master_orders(&self, statuses: &[MasterOrderStatus]) -> Result<Vec<MasterOrder>, Self::Error> {
        let store = self.store.read().await;
        Ok(store.masters.values().filter(|o| status_matches(statuses, &o.status)).cloned().collect())
    }

    async fn fetch_partial_order(&self, id: PartialOrderId) -> Result<Option<PartialOrder>, Self::Error> {
        Ok(self.store.read().await.lots.get(&id).cloned())
    }

    async fn fetch_partial_orders(&self, master_id: MasterOrderId) -> Result<Vec<PartialOrder>, Self::Error> {
        let store = self.store.read().await;
        Ok(store.lots.values().filter(|l| l.master_order_id == master_id).cloned().collect())
    }

    async fn fetch_freight_order(&self, id: FreightOrderId) -> Result<Option<FreightOrder>, Self::Error> {
        Ok(self.store.read().await.freight.get(&id).cloned())
    }
}

impl BidManagement for MemoryDatabase {
    async fn fetch_bid(&self, id: BidId) -> Result<Option<Bid>, Self::Error> {
        Ok(self.store.read().await.bids.get(&id).cloned())
    }

    async fn fetch_bids_for_order(&self, order: OrderRef) -> Result<Vec<Bid>, Self::Error> {
        let store = self.store.read().await;
        Ok(store.bids.values().filter(|b| b.order_ref == order).cloned().collect())
    }

    async fn fetch_bids_for_carrier(
        &self,
        carrier_id: &CarrierId,
        statuses: &[BidStatus],
    ) -> Result<Vec<Bid>, Self::Error> {
        let store = self.store.read().await;
        Ok(store
            .bids
            .values()
            .filter(|b| &b.carrier_id == carrier_id && status_matches(statuses, &b.status))
            .cloned()
            .collect())
    }

    async fn fetch_comparable_bid_amounts(
        &self,
        kind: OrderKind,
        category: CargoCategory,
        exclude: BidId,
    ) -> Result<Vec<Money>, Self::Error> {
        let store = self.store.read().await;
        Ok(store
            .bids
            .values()
            .filter(|b| b.id != exclude && b.status != BidStatus::Rejected && b.order_ref.kind() == kind)
            .filter(|b| store.category_of(&b.order_ref) == Some(category))
            .map(|b| b.amount)
            .collect())
    }

    async fn fetch_compliance_snapshot(&self, bid_id: BidId) -> Result<Option<ComplianceSnapshot>, Self::Error> {
        Ok(self.store.read().await.compliance.get(&bid_id).cloned())
    }

    async fn save_score(&self, bid_id: BidId, breakdown: &ScoreBreakdown) -> Result<(), Self::Error> {
        let mut store = self.store.write().await;
        let bid = store.bids.get_mut(&bid_id).ok_or_else(|| MemoryDatabaseError::NotFound(bid_id.to_string()))?;
        bid.match_score = Some(breakdown.total_score);
        bid.score_breakdown = Some(breakdown.clone());
        Ok(())
    }
}

impl CarrierManagement for MemoryDatabase {
    async fn fetch_carrier_profile(&self, carrier_id: &CarrierId) -> Result<Option<CarrierProfile>, Self::Error> {
        Ok(self.store.read().await.carriers.get(carrier_id).cloned())
    }

    async fn upsert_carrier_profile(&self, profile: CarrierProfile) -> Result<(), Self::Error> {
        let mut store = self.store.write().await;
        store.carriers.insert(profile.carrier_id.clone(), profile);
        Ok(())
    }
}

impl AuctionDatabase for MemoryDatabase {
    async fn insert_master_order(
        &self,
        order: NewMasterOrder,
        lots: Vec<NewLotRecord>,
    ) -> Result<(MasterOrder, Vec<PartialOrder>), Self::Error> {
        let mut store = self.store.write().await;
        let now = Utc::now();
        let allocated_weight: Weight = lots.iter().map(|l| l.weight).sum();
        let allocated_volume: Volume = lots.iter().map(|l| l.volume).sum();
        let master = MasterOrder {
            id: MasterOrderId(store.next_id()),
            shipper_id: order.shipper_id,
            total_weight: order.total_weight,
            total_volume: order.total_volume,
            remaining_weight: order.total_weight - allocated_weight,
            remaining_volume: order.total_volume - allocated_volume,
            required_delivery_date: order.required_delivery_date,
            max_bid_amount: order.max_bid_amount,
            cargo_category: order.cargo_category,
            ltl_enabled: order.ltl_enabled,
            min_load_fraction: order.min_load_fraction,
            pickup_latitude: order.pickup.map(|p| p.latitude),
            pickup_longitude: order.pickup.map(|p| p.longitude),
            extension_count: 0,
            status: MasterOrderStatus::Open,
            created_at: now,
            updated_at: now,
        };
        store.masters.insert(master.id, master.clone());
        let lots = lots
            .into_iter()
            .map(|mut record| {
                record.master_order_id = master.id;
                store.insert_lot(record)
            })
            .collect::<Vec<_>>();
        trace!("🗃️ Master order {} stored with {} lots", master.id, lots.len());
        Ok((master, lots))
    }

    async fn insert_freight_order(&self, order: NewFreightOrder) -> Result<FreightOrder, Self::Error> {
        let mut store = self.store.write().await;
        let now = Utc::now();
        let freight = FreightOrder {
            id: FreightOrderId(store.next_id()),
            shipper_id: order.shipper_id,
            weight: order.weight,
            volume: order.volume,
            required_delivery_date: order.required_delivery_date,
            max_bid_amount: order.max_bid_amount,
            cargo_category: order.cargo_category,
            pickup_latitude: order.pickup.map(|p| p.latitude),
            pickup_longitude: order.pickup.map(|p| p.longitude),
            extension_count: 0,
            awarded_bid_id: None,
            status: FreightOrderStatus::Open,
            created_at: now,
            updated_at: now,
        };
        store.freight.insert(freight.id, freight.clone());
        Ok(freight)
    }

    async fn apply_changes(&self, changes: ChangeSet) -> Result<AppliedChanges, Self::Error> {
        let mut store = self.store.write().await;
        store.validate(&changes)?;
        Ok(store.apply(changes))
    }
}
