use chrono::{DateTime, Utc};
use fae_common::{Fraction, Money, Weight};
use serde::Serialize;

use crate::db_types::{BidId, CarrierId, MasterOrderId, OrderRef, PartialOrderId};

/// Every event body knows the topic it is published under, so that a transport can route it without inspecting the
/// payload.
pub trait EventTopic {
    fn topic(&self) -> &'static str;
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BidPlacedEvent {
    pub bid_id: BidId,
    pub carrier_id: CarrierId,
    pub order_ref: OrderRef,
    pub amount: Money,
    pub timestamp: DateTime<Utc>,
}

impl EventTopic for BidPlacedEvent {
    fn topic(&self) -> &'static str {
        "bid.placed"
    }
}

/// Asks the scoring consumer to compute the match score of a freshly admitted bid.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoringRequestedEvent {
    pub routing_key: String,
    pub bid_id: BidId,
    pub carrier_id: CarrierId,
    pub order_ref: OrderRef,
    pub amount: Money,
    pub timestamp: DateTime<Utc>,
}

impl ScoringRequestedEvent {
    pub fn new(bid: &BidPlacedEvent) -> Self {
        Self {
            routing_key: bid.bid_id.to_string(),
            bid_id: bid.bid_id,
            carrier_id: bid.carrier_id.clone(),
            order_ref: bid.order_ref,
            amount: bid.amount,
            timestamp: bid.timestamp,
        }
    }
}

impl EventTopic for ScoringRequestedEvent {
    fn topic(&self) -> &'static str {
        "bid.scoring.requested"
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrderStatusChangedEvent {
    pub order_ref: OrderRef,
    pub old_status: String,
    pub new_status: String,
    pub timestamp: DateTime<Utc>,
}

impl OrderStatusChangedEvent {
    pub fn new<S: ToString>(order_ref: OrderRef, old_status: S, new_status: S) -> Self {
        Self { order_ref, old_status: old_status.to_string(), new_status: new_status.to_string(), timestamp: Utc::now() }
    }
}

impl EventTopic for OrderStatusChangedEvent {
    fn topic(&self) -> &'static str {
        "order.status.changed"
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrderCompletedEvent {
    pub master_order_id: MasterOrderId,
    /// True when an administrator closed the order regardless of its lots.
    pub forced: bool,
    pub timestamp: DateTime<Utc>,
}

impl OrderCompletedEvent {
    pub fn new(master_order_id: MasterOrderId, forced: bool) -> Self {
        Self { master_order_id, forced, timestamp: Utc::now() }
    }
}

impl EventTopic for OrderCompletedEvent {
    fn topic(&self) -> &'static str {
        "order.completed"
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrderCancelledEvent {
    pub master_order_id: MasterOrderId,
    pub reason: String,
    pub cancelled_lots: Vec<PartialOrderId>,
    pub fill_fraction: Fraction,
    pub timestamp: DateTime<Utc>,
}

impl EventTopic for OrderCancelledEvent {
    fn topic(&self) -> &'static str {
        "order.cancelled"
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CarrierAssignedEvent {
    pub carrier_id: CarrierId,
    pub order_ref: OrderRef,
    pub bid_id: BidId,
    pub amount: Money,
    pub timestamp: DateTime<Utc>,
}

impl EventTopic for CarrierAssignedEvent {
    fn topic(&self) -> &'static str {
        "carrier.assigned"
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum QuotaEventKind {
    /// A new bid started holding quota.
    Burn,
    /// A bid stopped holding quota (rejected, cancelled or delivered).
    Release,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QuotaEvent {
    pub kind: QuotaEventKind,
    pub carrier_id: CarrierId,
    pub bid_id: BidId,
    pub weight: Weight,
    pub timestamp: DateTime<Utc>,
}

impl QuotaEvent {
    pub fn burn(carrier_id: CarrierId, bid_id: BidId, weight: Weight) -> Self {
        Self { kind: QuotaEventKind::Burn, carrier_id, bid_id, weight, timestamp: Utc::now() }
    }

    pub fn release(carrier_id: CarrierId, bid_id: BidId, weight: Weight) -> Self {
        Self { kind: QuotaEventKind::Release, carrier_id, bid_id, weight, timestamp: Utc::now() }
    }
}

impl EventTopic for QuotaEvent {
    fn topic(&self) -> &'static str {
        match self.kind {
            QuotaEventKind::Burn => "carrier.quota.burn",
            QuotaEventKind::Release => "carrier.quota.release",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UnderFillWarningEvent {
    pub master_order_id: MasterOrderId,
    pub fill_fraction: Fraction,
    pub pickup_time: DateTime<Utc>,
    pub timestamp: DateTime<Utc>,
}

impl EventTopic for UnderFillWarningEvent {
    fn topic(&self) -> &'static str {
        "order.filling.warnings"
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FillReminderEvent {
    pub master_order_id: MasterOrderId,
    pub fill_fraction: Fraction,
    pub min_load_fraction: Fraction,
    pub cancellation_deadline: DateTime<Utc>,
    pub timestamp: DateTime<Utc>,
}

impl EventTopic for FillReminderEvent {
    fn topic(&self) -> &'static str {
        "order.reminders"
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn events_serialize_flat() {
        let placed = BidPlacedEvent {
            bid_id: BidId(12),
            carrier_id: "carrier-7".into(),
            order_ref: OrderRef::PartialOrder(PartialOrderId(3)),
            amount: Money::from(1100),
            timestamp: Utc::now(),
        };
        let scoring = ScoringRequestedEvent::new(&placed);
        assert_eq!(scoring.routing_key, "bid#12");
        let json = serde_json::to_value(&scoring).unwrap();
        assert_eq!(json["bid_id"], 12);
        assert_eq!(json["carrier_id"], "carrier-7");
        assert_eq!(json["amount"], "1100");
        assert_eq!(json["order_ref"]["kind"], "partial_order");
        assert_eq!(scoring.topic(), "bid.scoring.requested");
    }

    #[test]
    fn quota_topics() {
        let burn = QuotaEvent::burn("c".into(), BidId(1), Weight::from(20));
        let release = QuotaEvent::release("c".into(), BidId(1), Weight::from(20));
        assert_eq!(burn.topic(), "carrier.quota.burn");
        assert_eq!(release.topic(), "carrier.quota.release");
    }
}
