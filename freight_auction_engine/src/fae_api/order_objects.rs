use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use fae_common::{Fraction, Volume, Weight};
use serde::Serialize;

use crate::db_types::{Bid, BidId, BiddableOrder, MasterOrderId, MasterOrderStatus, PartialOrder, PartialOrderId};

/// Summed capacity of the lots in one progress bucket.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CapacityBucket {
    pub lots: usize,
    pub weight: Weight,
    pub volume: Volume,
}

impl CapacityBucket {
    pub(crate) fn add(&mut self, lot: &PartialOrder) {
        self.lots += 1;
        self.weight += lot.weight;
        self.volume += lot.volume;
    }
}

/// The three-colour fill indicator of a master order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProgressSnapshot {
    pub master_order_id: MasterOrderId,
    pub status: MasterOrderStatus,
    /// Lots that are awarded or further along.
    pub committed: CapacityBucket,
    /// Lots holding at least one pending bid.
    pub pending: CapacityBucket,
    /// Lots nobody has bid on yet.
    pub open: CapacityBucket,
    /// Capacity not carved into any lot.
    pub unallocated_weight: Weight,
    pub unallocated_volume: Volume,
    /// `(committed + pending weight) / total weight`.
    pub fill_fraction: Fraction,
}

/// What `perform_auto_check` did for one master order. Exactly one action fires per check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum AutoCheckOutcome {
    /// The order missed its minimum-load deadline. The order and its outstanding lots were cancelled.
    CancelledMaster { reason: String, cancelled_lots: Vec<PartialOrderId> },
    /// Lots that sat unclaimed past the deadline were cancelled. The order itself stays open.
    CancelledLots(Vec<PartialOrderId>),
    ReminderSent,
    NoAction,
}

/// Summary of one lifecycle sweep.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    pub started_at: Option<DateTime<Utc>>,
    /// False if another sweep was still running, in which case nothing else was done.
    pub ran: bool,
    pub warnings: usize,
    pub cancelled_masters: Vec<MasterOrderId>,
    pub cancelled_lots: Vec<PartialOrderId>,
    pub reminders: usize,
    pub completed: Vec<MasterOrderId>,
    pub expired_tokens: usize,
    pub pruned_locks: usize,
    /// Orders whose check failed. The sweep carries on with the rest.
    pub failures: usize,
}

/// Aggregate figures over all master orders.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct OrderStatistics {
    pub total_orders: usize,
    pub by_status: BTreeMap<String, usize>,
    pub total_weight: Weight,
    pub committed_weight: Weight,
    /// Mean fill fraction of the orders that are not cancelled.
    pub average_fill_fraction: Fraction,
}

/// An order together with its bids, best match first.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderWithBids {
    pub order: BiddableOrder,
    pub bids: Vec<Bid>,
}

/// The result of a successful bid placement.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BidAdmission {
    pub bid: Bid,
    pub trust_token: String,
    /// The new auction close time, if the bid triggered the anti-sniping extension.
    pub extended_until: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AwardOutcome {
    pub winning_bid: Bid,
    pub rejected_bids: Vec<BidId>,
    /// The lot carved out for the winner when a whole master order is awarded.
    pub awarded_lot: Option<PartialOrder>,
}
