use std::fmt::Debug;

use chrono::Utc;
use fae_common::{Percentage, Volume, Weight};
use log::*;

use crate::{
    config::DecompositionPolicy,
    db::traits::{AuctionDatabase, CarrierStatsDelta, ChangeSet, LotUpdate, MasterOrderUpdate, NewLotRecord},
    db_types::{
        BidStatus,
        FreightOrder,
        MasterOrder,
        MasterOrderId,
        MasterOrderStatus,
        NewFreightOrder,
        NewMasterOrder,
        NewPartialOrder,
        OrderRef,
        PartialOrder,
        PartialOrderId,
        PartialOrderStatus,
    },
    events::{EventProducers, OrderCancelledEvent, OrderCompletedEvent, OrderStatusChangedEvent, QuotaEvent},
    fae_api::{
        capacity_ledger::CapacityLedger,
        errors::AuctionError,
        order_decomposer::{
            allocated_percentage,
            compute_progress,
            derive_master_status,
            plan_lots,
            provisional_lot,
            validate_master_order,
            validate_order_terms,
            with_lot_statuses,
        },
        order_locks::{LockKey, OrderLocks},
        order_objects::ProgressSnapshot,
    },
};

/// Which lots go down with a cancelled master order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelScope {
    /// Every lot that is not yet in transit, awarded ones included. Used when the shipper withdraws the order.
    Outstanding,
    /// Only lots nobody has bid on. Awarded and bidding lots keep their status; their pending bids are rejected.
    Unclaimed,
}

impl CancelScope {
    pub fn cancels(&self, status: PartialOrderStatus) -> bool {
        match self {
            Self::Outstanding => matches!(
                status,
                PartialOrderStatus::Available | PartialOrderStatus::Bidding | PartialOrderStatus::Awarded
            ),
            Self::Unclaimed => status == PartialOrderStatus::Available,
        }
    }

    /// Bids on the master order itself, or on lots this scope leaves alone, that are rejected with the order.
    pub fn rejects(&self, status: BidStatus) -> bool {
        match self {
            Self::Outstanding => matches!(status, BidStatus::Pending | BidStatus::Accepted | BidStatus::Committed),
            Self::Unclaimed => status == BidStatus::Pending,
        }
    }
}

/// `OrderFlowApi` creates orders, carves lots out of master orders and moves lots and master orders through their
/// lifecycle.
///
/// Every change to a master order or its lots happens while holding that master order's lock from [`OrderLocks`].
/// The same lock map must be shared with [`BidFlowApi`](crate::BidFlowApi) and [`LifecycleApi`](crate::LifecycleApi).
#[derive(Clone)]
pub struct OrderFlowApi<B> {
    db: B,
    producers: EventProducers,
    locks: OrderLocks,
    ledger: CapacityLedger,
    policy: DecompositionPolicy,
}

impl<B> Debug for OrderFlowApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "OrderFlowApi")
    }
}

impl<B> OrderFlowApi<B> {
    pub fn new(db: B, producers: EventProducers, locks: OrderLocks, policy: DecompositionPolicy) -> Self {
        let ledger = CapacityLedger::new(policy.clone());
        Self { db, producers, locks, ledger, policy }
    }

    pub fn db(&self) -> &B {
        &self.db
    }

    pub fn locks(&self) -> &OrderLocks {
        &self.locks
    }

    pub fn ledger(&self) -> &CapacityLedger {
        &self.ledger
    }

    pub fn producers(&self) -> &EventProducers {
        &self.producers
    }
}

impl<B> OrderFlowApi<B>
where
    B: AuctionDatabase,
    AuctionError: From<B::Error>,
{
    /// Creates a master order. LTL orders are split into lots straight away.
    pub async fn create_master_order(
        &self,
        order: NewMasterOrder,
    ) -> Result<(MasterOrder, Vec<PartialOrder>), AuctionError> {
        validate_master_order(&order, Utc::now())?;
        let lots = plan_lots(&order, &self.policy)?;
        let (master, lots) = self.db.insert_master_order(order, lots).await?;
        info!(
            "🧩️ Created {} for {} ({} weight, {} volume) split into {} lots",
            master.id,
            master.shipper_id,
            master.total_weight,
            master.total_volume,
            lots.len()
        );
        Ok((master, lots))
    }

    pub async fn create_freight_order(&self, order: NewFreightOrder) -> Result<FreightOrder, AuctionError> {
        validate_order_terms(order.weight, order.volume, order.max_bid_amount, order.required_delivery_date, Utc::now())?;
        let order = self.db.insert_freight_order(order).await?;
        info!("🧩️ Created {} for {} ({} weight)", order.id, order.shipper_id, order.weight);
        Ok(order)
    }

    /// Carves a new lot out of a master order's remaining capacity.
    ///
    /// The lot must be at least the order's minimum quantum and fit in the remaining capacity, otherwise
    /// [`AuctionError::InsufficientCapacity`] is returned. A lot created for a named carrier starts out awarded to
    /// that carrier and counts towards the order's 100% allocation ceiling immediately.
    pub async fn create_partial_order(
        &self,
        master_id: MasterOrderId,
        request: NewPartialOrder,
    ) -> Result<PartialOrder, AuctionError> {
        let _guard = self.locks.lock(LockKey::Master(master_id)).await;
        let master = self.fetch_master(master_id).await?;
        if master.status.is_terminal() {
            return Err(AuctionError::InvalidStateTransition(format!(
                "{master_id} is {} and cannot take new lots",
                master.status
            )));
        }
        if !request.percentage.is_positive() || request.percentage > Percentage::hundred() {
            return Err(AuctionError::ValidationError(format!(
                "Lot percentage must be in (0, 100] (got {})",
                request.percentage
            )));
        }
        self.ledger.check_quantum(&master, request.weight, request.volume)?;
        let (remaining_weight, remaining_volume) = self.ledger.reserve(&master, request.weight, request.volume)?;
        let lots = self.db.fetch_partial_orders(master_id).await?;
        let status =
            if request.carrier_id.is_some() { PartialOrderStatus::Awarded } else { PartialOrderStatus::Available };
        let record = NewLotRecord {
            master_order_id: master_id,
            weight: request.weight,
            volume: request.volume,
            percentage: request.percentage,
            status,
            assigned_carrier_id: request.carrier_id.clone(),
            assigned_bid_id: None,
        };
        if status.is_allocated() {
            let total = allocated_percentage(&lots) + record.percentage;
            if total > Percentage::hundred() {
                return Err(AuctionError::ComplianceViolation(format!(
                    "Over-commitment: a {} lot would bring {master_id} to {total} allocated",
                    record.percentage
                )));
            }
        }
        let mut projected = lots;
        projected.push(provisional_lot(&record));
        let new_status = derive_master_status(&master, &projected);
        let mut update = MasterOrderUpdate::new(master_id).with_remaining(remaining_weight, remaining_volume);
        if new_status != master.status {
            update = update.with_status(new_status);
        }
        let mut changes = ChangeSet::default().update_master(update).insert_lot(record);
        if let Some(carrier_id) = request.carrier_id {
            changes = changes.record_carrier_stats(CarrierStatsDelta { carrier_id, total_orders: 1, completed_orders: 0 });
        }
        let applied = self.db.apply_changes(changes).await?;
        let lot = applied
            .lots
            .into_iter()
            .next()
            .ok_or_else(|| AuctionError::DatabaseError(format!("The new lot of {master_id} was not returned")))?;
        debug!(
            "🧩️ Carved {} ({} weight, {}) out of {master_id}. {remaining_weight} weight left",
            lot.id, lot.weight, lot.percentage
        );
        self.publish_master_status(master_id, master.status, new_status).await;
        Ok(lot)
    }

    pub async fn compute_progress(&self, master_id: MasterOrderId) -> Result<ProgressSnapshot, AuctionError> {
        let master = self.fetch_master(master_id).await?;
        let lots = self.db.fetch_partial_orders(master_id).await?;
        Ok(compute_progress(&master, &lots))
    }

    /// Moves a lot along its delivery lifecycle (`AWARDED → IN_PROGRESS → DELIVERED → COMPLETED`), or cancels it.
    ///
    /// The lot's winning bid follows it. Cancelling a lot gives its capacity back to the master order and rejects the
    /// bids still held against it. The master order's status is re-derived afterwards.
    pub async fn update_partial_order_status(
        &self,
        lot_id: PartialOrderId,
        status: PartialOrderStatus,
    ) -> Result<PartialOrder, AuctionError> {
        let lot = self.fetch_lot(lot_id).await?;
        let _guard = self.locks.lock(LockKey::Master(lot.master_order_id)).await;
        // Reload under the lock
        let lot = self.fetch_lot(lot_id).await?;
        let master = self.fetch_master(lot.master_order_id).await?;
        let manual_target = matches!(
            status,
            PartialOrderStatus::InProgress |
                PartialOrderStatus::Delivered |
                PartialOrderStatus::Completed |
                PartialOrderStatus::Cancelled
        );
        if !manual_target || !lot.status.can_transition_to(status) {
            return Err(AuctionError::InvalidStateTransition(format!("{lot_id} cannot move from {} to {status}", lot.status)));
        }
        let lots = self.db.fetch_partial_orders(master.id).await?;
        if status == PartialOrderStatus::Cancelled {
            let (changes, releases) = self.lot_cancellation(&master, &[lot.clone()]).await?;
            let projected = with_lot_statuses(&lots, &[(lot_id, status)]);
            let new_status = derive_master_status(&master, &projected);
            let changes = changes.update_master(self.status_update(&master, new_status));
            self.db.apply_changes(changes).await?;
            info!("🧩️ {lot_id} of {} was cancelled", master.id);
            self.publish_quota_releases(releases).await;
            self.publish_lot_status(lot_id, lot.status, status).await;
            self.publish_master_status(master.id, master.status, new_status).await;
            return self.fetch_lot(lot_id).await;
        }

        let mut changes = ChangeSet::default().update_lot(LotUpdate::status(lot_id, status));
        let mut releases = Vec::new();
        if let Some(bid_id) = lot.assigned_bid_id {
            let bid_target = match status {
                PartialOrderStatus::InProgress => Some(BidStatus::InProgress),
                PartialOrderStatus::Delivered => Some(BidStatus::Delivered),
                _ => None,
            };
            if let (Some(target), Some(bid)) = (bid_target, self.db.fetch_bid(bid_id).await?) {
                if bid.status.can_transition_to(target) {
                    changes = changes.update_bid(bid.id, target);
                    if !target.holds_quota() {
                        releases.push(QuotaEvent::release(bid.carrier_id.clone(), bid.id, bid.weight));
                    }
                }
            }
        }
        if status == PartialOrderStatus::Delivered {
            if let Some(carrier_id) = lot.assigned_carrier_id.clone() {
                changes = changes.record_carrier_stats(CarrierStatsDelta { carrier_id, total_orders: 0, completed_orders: 1 });
            }
        }
        let projected = with_lot_statuses(&lots, &[(lot_id, status)]);
        let new_status = derive_master_status(&master, &projected);
        let changes = changes.update_master(self.status_update(&master, new_status));
        self.db.apply_changes(changes).await?;
        debug!("🧩️ {lot_id} moved from {} to {status}", lot.status);
        self.publish_quota_releases(releases).await;
        self.publish_lot_status(lot_id, lot.status, status).await;
        self.publish_master_status(master.id, master.status, new_status).await;
        self.fetch_lot(lot_id).await
    }

    /// Cancels a master order on the shipper's behalf. Returns the lots that were cancelled with it.
    pub async fn cancel_master_order(
        &self,
        master_id: MasterOrderId,
        reason: &str,
    ) -> Result<Vec<PartialOrderId>, AuctionError> {
        let _guard = self.locks.lock(LockKey::Master(master_id)).await;
        let master = self.fetch_master(master_id).await?;
        let lots = self.db.fetch_partial_orders(master_id).await?;
        self.cancel_master_locked(&master, &lots, reason, CancelScope::Outstanding).await
    }

    /// Cancels a master order and the lots `scope` selects. The caller must hold the master order's lock and pass
    /// freshly loaded records.
    pub(crate) async fn cancel_master_locked(
        &self,
        master: &MasterOrder,
        lots: &[PartialOrder],
        reason: &str,
        scope: CancelScope,
    ) -> Result<Vec<PartialOrderId>, AuctionError> {
        if master.status.is_terminal() {
            return Err(AuctionError::InvalidStateTransition(format!("{} is already {}", master.id, master.status)));
        }
        let to_cancel = lots.iter().filter(|l| scope.cancels(l.status)).cloned().collect::<Vec<_>>();
        let fill_fraction = compute_progress(master, lots).fill_fraction;
        let (mut changes, mut releases) = self.lot_cancellation(master, &to_cancel).await?;
        // Bids that can no longer win once the order is cancelled
        let mut kept_refs = lots
            .iter()
            .filter(|l| l.status == PartialOrderStatus::Bidding && !scope.cancels(l.status))
            .map(|l| OrderRef::PartialOrder(l.id))
            .collect::<Vec<_>>();
        kept_refs.push(OrderRef::MasterOrder(master.id));
        for order_ref in kept_refs {
            for bid in self.db.fetch_bids_for_order(order_ref).await? {
                if scope.rejects(bid.status) {
                    changes = changes.update_bid(bid.id, BidStatus::Rejected);
                    releases.push(QuotaEvent::release(bid.carrier_id.clone(), bid.id, bid.weight));
                }
            }
        }
        let changes = changes.update_master(self.status_update(master, MasterOrderStatus::Cancelled));
        self.db.apply_changes(changes).await?;
        let cancelled_lots = to_cancel.iter().map(|l| l.id).collect::<Vec<_>>();
        info!("🧩️ {} cancelled along with {} lots. Reason: {reason}", master.id, cancelled_lots.len());
        self.publish_quota_releases(releases).await;
        for lot in &to_cancel {
            self.publish_lot_status(lot.id, lot.status, PartialOrderStatus::Cancelled).await;
        }
        self.publish_master_status(master.id, master.status, MasterOrderStatus::Cancelled).await;
        let event = OrderCancelledEvent {
            master_order_id: master.id,
            reason: reason.to_string(),
            cancelled_lots: cancelled_lots.clone(),
            fill_fraction,
            timestamp: Utc::now(),
        };
        self.producers.publish_order_cancelled(event).await;
        Ok(cancelled_lots)
    }

    /// Cancels some lots of a master order and re-derives the order's status. The caller must hold the master
    /// order's lock.
    pub(crate) async fn cancel_lots_locked(
        &self,
        master: &MasterOrder,
        lots: &[PartialOrder],
        to_cancel: &[PartialOrder],
    ) -> Result<Vec<PartialOrderId>, AuctionError> {
        let (changes, releases) = self.lot_cancellation(master, to_cancel).await?;
        let cancelled = to_cancel.iter().map(|l| (l.id, PartialOrderStatus::Cancelled)).collect::<Vec<_>>();
        let projected = with_lot_statuses(lots, &cancelled);
        let new_status = derive_master_status(master, &projected);
        let changes = changes.update_master(self.status_update(master, new_status));
        self.db.apply_changes(changes).await?;
        self.publish_quota_releases(releases).await;
        for lot in to_cancel {
            self.publish_lot_status(lot.id, lot.status, PartialOrderStatus::Cancelled).await;
        }
        self.publish_master_status(master.id, master.status, new_status).await;
        Ok(to_cancel.iter().map(|l| l.id).collect())
    }

    /// Closes a master order regardless of the state of its lots.
    pub async fn force_complete_order(&self, master_id: MasterOrderId) -> Result<MasterOrder, AuctionError> {
        let _guard = self.locks.lock(LockKey::Master(master_id)).await;
        let master = self.fetch_master(master_id).await?;
        match master.status {
            MasterOrderStatus::Cancelled => {
                return Err(AuctionError::InvalidStateTransition(format!(
                    "{master_id} was cancelled and cannot be completed"
                )))
            },
            MasterOrderStatus::Completed => return Ok(master),
            _ => {},
        }
        let changes = ChangeSet::default().update_master(self.status_update(&master, MasterOrderStatus::Completed));
        self.db.apply_changes(changes).await?;
        warn!("🧩️ {master_id} was force-completed from {}", master.status);
        let event = OrderStatusChangedEvent::new(OrderRef::MasterOrder(master_id), master.status, MasterOrderStatus::Completed);
        self.producers.publish_order_status_changed(event).await;
        self.producers.publish_order_completed(OrderCompletedEvent::new(master_id, true)).await;
        self.fetch_master(master_id).await
    }

    /// Re-derives a master order's status from its lots and stores it if it changed. Returns the (possibly new)
    /// status.
    pub async fn refresh_master_status(&self, master_id: MasterOrderId) -> Result<MasterOrderStatus, AuctionError> {
        let _guard = self.locks.lock(LockKey::Master(master_id)).await;
        let master = self.fetch_master(master_id).await?;
        let lots = self.db.fetch_partial_orders(master_id).await?;
        let new_status = derive_master_status(&master, &lots);
        if new_status != master.status {
            let changes = ChangeSet::default().update_master(self.status_update(&master, new_status));
            self.db.apply_changes(changes).await?;
            self.publish_master_status(master_id, master.status, new_status).await;
        }
        Ok(new_status)
    }

    /// The changes that cancel the given lots: each lot is cancelled, its capacity goes back to the master order and
    /// the bids still holding quota against it are rejected.
    async fn lot_cancellation(
        &self,
        master: &MasterOrder,
        to_cancel: &[PartialOrder],
    ) -> Result<(ChangeSet, Vec<QuotaEvent>), AuctionError> {
        let weight = to_cancel.iter().map(|l| l.weight).sum::<Weight>();
        let volume = to_cancel.iter().map(|l| l.volume).sum::<Volume>();
        let (remaining_weight, remaining_volume) = self.ledger.release(master, weight, volume)?;
        let mut changes = ChangeSet::default()
            .update_master(MasterOrderUpdate::new(master.id).with_remaining(remaining_weight, remaining_volume));
        let mut releases = Vec::new();
        for lot in to_cancel {
            changes = changes.update_lot(LotUpdate::status(lot.id, PartialOrderStatus::Cancelled));
            for bid in self.db.fetch_bids_for_order(OrderRef::PartialOrder(lot.id)).await? {
                if matches!(bid.status, BidStatus::Pending | BidStatus::Accepted | BidStatus::Committed) {
                    changes = changes.update_bid(bid.id, BidStatus::Rejected);
                    releases.push(QuotaEvent::release(bid.carrier_id.clone(), bid.id, bid.weight));
                }
            }
        }
        Ok((changes, releases))
    }

    fn status_update(&self, master: &MasterOrder, new_status: MasterOrderStatus) -> MasterOrderUpdate {
        let update = MasterOrderUpdate::new(master.id);
        if new_status == master.status {
            update
        } else {
            update.with_status(new_status)
        }
    }

    pub(crate) async fn fetch_master(&self, id: MasterOrderId) -> Result<MasterOrder, AuctionError> {
        self.db.fetch_master_order(id).await?.ok_or_else(|| AuctionError::NotFound(id.to_string()))
    }

    async fn fetch_lot(&self, id: PartialOrderId) -> Result<PartialOrder, AuctionError> {
        self.db.fetch_partial_order(id).await?.ok_or_else(|| AuctionError::NotFound(id.to_string()))
    }

    pub(crate) async fn publish_master_status(&self, id: MasterOrderId, old: MasterOrderStatus, new: MasterOrderStatus) {
        if old == new {
            return;
        }
        trace!("🧩️ {id} moved from {old} to {new}");
        self.producers.publish_order_status_changed(OrderStatusChangedEvent::new(OrderRef::MasterOrder(id), old, new)).await;
        if new == MasterOrderStatus::Completed {
            self.producers.publish_order_completed(OrderCompletedEvent::new(id, false)).await;
        }
    }

    async fn publish_lot_status(&self, id: PartialOrderId, old: PartialOrderStatus, new: PartialOrderStatus) {
        if old != new {
            self.producers.publish_order_status_changed(OrderStatusChangedEvent::new(OrderRef::PartialOrder(id), old, new)).await;
        }
    }

    async fn publish_quota_releases(&self, releases: Vec<QuotaEvent>) {
        for event in releases {
            self.producers.publish_quota(event).await;
        }
    }
}
