use chrono::{DateTime, Utc};
use fae_common::{Money, Percentage, Volume, Weight};

use crate::db_types::{
    Bid,
    BidId,
    BidStatus,
    CarrierId,
    ComplianceStatus,
    FreightOrderId,
    FreightOrderStatus,
    MasterOrderId,
    MasterOrderStatus,
    OrderRef,
    PartialOrder,
    PartialOrderId,
    PartialOrderStatus,
    SecurityLevel,
};

/// A unit of work computed by the engine while it holds the relevant order lock. Backends must apply a `ChangeSet`
/// atomically: either every change is persisted, or none is.
#[derive(Debug, Clone, Default)]
pub struct ChangeSet {
    pub master_updates: Vec<MasterOrderUpdate>,
    pub freight_updates: Vec<FreightOrderUpdate>,
    pub new_lots: Vec<NewLotRecord>,
    pub lot_updates: Vec<LotUpdate>,
    pub new_bid: Option<NewBidRecord>,
    pub bid_updates: Vec<BidStatusUpdate>,
    pub carrier_stats: Vec<CarrierStatsDelta>,
}

impl ChangeSet {
    pub fn is_empty(&self) -> bool {
        self.master_updates.is_empty() &&
            self.freight_updates.is_empty() &&
            self.new_lots.is_empty() &&
            self.lot_updates.is_empty() &&
            self.new_bid.is_none() &&
            self.bid_updates.is_empty() &&
            self.carrier_stats.is_empty()
    }

    pub fn update_master(mut self, update: MasterOrderUpdate) -> Self {
        if !update.is_empty() {
            self.master_updates.push(update);
        }
        self
    }

    pub fn update_freight(mut self, update: FreightOrderUpdate) -> Self {
        if !update.is_empty() {
            self.freight_updates.push(update);
        }
        self
    }

    pub fn insert_lot(mut self, lot: NewLotRecord) -> Self {
        self.new_lots.push(lot);
        self
    }

    pub fn update_lot(mut self, update: LotUpdate) -> Self {
        self.lot_updates.push(update);
        self
    }

    pub fn insert_bid(mut self, bid: NewBidRecord) -> Self {
        self.new_bid = Some(bid);
        self
    }

    pub fn update_bid(mut self, id: BidId, status: BidStatus) -> Self {
        self.bid_updates.push(BidStatusUpdate { id, status });
        self
    }

    pub fn record_carrier_stats(mut self, delta: CarrierStatsDelta) -> Self {
        self.carrier_stats.push(delta);
        self
    }
}

/// What a backend hands back after applying a [`ChangeSet`].
#[derive(Debug, Clone, Default)]
pub struct AppliedChanges {
    pub bid: Option<Bid>,
    pub lots: Vec<PartialOrder>,
}

#[derive(Debug, Clone)]
pub struct MasterOrderUpdate {
    pub id: MasterOrderId,
    pub remaining_weight: Option<Weight>,
    pub remaining_volume: Option<Volume>,
    pub status: Option<MasterOrderStatus>,
    /// Backends only ever move the close marker forward.
    pub close_time: Option<DateTime<Utc>>,
    pub extension_count: Option<i64>,
}

impl MasterOrderUpdate {
    pub fn new(id: MasterOrderId) -> Self {
        Self { id, remaining_weight: None, remaining_volume: None, status: None, close_time: None, extension_count: None }
    }

    pub fn with_remaining(mut self, weight: Weight, volume: Volume) -> Self {
        self.remaining_weight = Some(weight);
        self.remaining_volume = Some(volume);
        self
    }

    pub fn with_status(mut self, status: MasterOrderStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_extension(mut self, close_time: DateTime<Utc>, extension_count: i64) -> Self {
        self.close_time = Some(close_time);
        self.extension_count = Some(extension_count);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.remaining_weight.is_none() &&
            self.remaining_volume.is_none() &&
            self.status.is_none() &&
            self.close_time.is_none() &&
            self.extension_count.is_none()
    }
}

#[derive(Debug, Clone)]
pub struct FreightOrderUpdate {
    pub id: FreightOrderId,
    pub status: Option<FreightOrderStatus>,
    pub close_time: Option<DateTime<Utc>>,
    pub extension_count: Option<i64>,
    pub awarded_bid_id: Option<BidId>,
}

impl FreightOrderUpdate {
    pub fn new(id: FreightOrderId) -> Self {
        Self { id, status: None, close_time: None, extension_count: None, awarded_bid_id: None }
    }

    pub fn with_status(mut self, status: FreightOrderStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_extension(mut self, close_time: DateTime<Utc>, extension_count: i64) -> Self {
        self.close_time = Some(close_time);
        self.extension_count = Some(extension_count);
        self
    }

    pub fn with_awarded_bid(mut self, bid_id: BidId) -> Self {
        self.awarded_bid_id = Some(bid_id);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.status.is_none() && self.close_time.is_none() && self.extension_count.is_none() && self.awarded_bid_id.is_none()
    }
}

#[derive(Debug, Clone)]
pub struct NewLotRecord {
    pub master_order_id: MasterOrderId,
    pub weight: Weight,
    pub volume: Volume,
    pub percentage: Percentage,
    pub status: PartialOrderStatus,
    pub assigned_carrier_id: Option<CarrierId>,
    pub assigned_bid_id: Option<BidId>,
}

#[derive(Debug, Clone)]
pub struct LotUpdate {
    pub id: PartialOrderId,
    pub status: PartialOrderStatus,
    pub assigned_carrier_id: Option<CarrierId>,
    pub assigned_bid_id: Option<BidId>,
}

impl LotUpdate {
    pub fn status(id: PartialOrderId, status: PartialOrderStatus) -> Self {
        Self { id, status, assigned_carrier_id: None, assigned_bid_id: None }
    }

    pub fn assign(id: PartialOrderId, carrier_id: CarrierId, bid_id: BidId) -> Self {
        Self {
            id,
            status: PartialOrderStatus::Awarded,
            assigned_carrier_id: Some(carrier_id),
            assigned_bid_id: Some(bid_id),
        }
    }
}

#[derive(Debug, Clone)]
pub struct NewBidRecord {
    pub carrier_id: CarrierId,
    pub order_ref: OrderRef,
    pub amount: Money,
    pub weight: Weight,
    pub proposed_delivery_date: DateTime<Utc>,
    pub notes: Option<String>,
    pub compliance: Option<NewComplianceRecord>,
}

#[derive(Debug, Clone)]
pub struct NewComplianceRecord {
    pub compliance_status: ComplianceStatus,
    pub security_level: SecurityLevel,
    pub trust_score: f64,
    pub violations: Vec<String>,
}

#[derive(Debug, Clone, Copy)]
pub struct BidStatusUpdate {
    pub id: BidId,
    pub status: BidStatus,
}

/// Increments applied to a carrier's delivery history.
#[derive(Debug, Clone)]
pub struct CarrierStatsDelta {
    pub carrier_id: CarrierId,
    pub total_orders: i64,
    pub completed_orders: i64,
}
