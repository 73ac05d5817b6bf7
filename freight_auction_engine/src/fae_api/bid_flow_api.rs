use std::{fmt::Debug, time::Duration as StdDuration};

use chrono::{DateTime, Utc};
use fae_common::{Percentage, Volume, Weight};
use log::*;

use crate::{
    config::EngineConfig,
    db::traits::{
        AuctionDatabase,
        CarrierStatsDelta,
        ChangeSet,
        FreightOrderUpdate,
        LotUpdate,
        MasterOrderUpdate,
        NewBidRecord,
        NewComplianceRecord,
        NewLotRecord,
    },
    db_types::{
        Bid,
        BidId,
        BidStatus,
        BiddableOrder,
        FreightOrderStatus,
        MasterOrder,
        MasterOrderStatus,
        NewBid,
        OrderRef,
        PartialOrder,
        PartialOrderStatus,
    },
    events::{BidPlacedEvent, CarrierAssignedEvent, EventProducers, OrderStatusChangedEvent, QuotaEvent, ScoringRequestedEvent},
    fae_api::{
        auction_guard::{AuctionGuard, SnipingDecision},
        capacity_ledger::CapacityLedger,
        errors::AuctionError,
        oracles::{ComplianceOracle, ComplianceRequest, ComplianceVerdict},
        order_decomposer::{derive_master_status, provisional_lot, with_lot_statuses},
        order_locks::{LockKey, OrderLocks},
        order_objects::{AwardOutcome, BidAdmission},
        quota_guard::QuotaGuard,
        token_store::{TokenGrant, TrustTokenStore},
    },
};

/// `BidFlowApi` admits bids and awards auctions.
///
/// A bid is admitted only after every check passes, in this order:
/// 1. The bid's own terms (amount, delivery date) and the order's state.
/// 2. The compliance oracle, bounded by the configured timeout. No lock is held while waiting for it.
/// 3. Under the carrier's lock and then the order's lock: the one-pending-bid rule, the carrier's quota, LTL
///    atomicity and the anti-sniping clock.
///
/// The bid, any auction extension and the resulting order status changes are committed as a single change set.
#[derive(Clone)]
pub struct BidFlowApi<B, C> {
    db: B,
    producers: EventProducers,
    locks: OrderLocks,
    compliance: C,
    quota: QuotaGuard<B>,
    guard: AuctionGuard,
    ledger: CapacityLedger,
    tokens: TrustTokenStore,
    compliance_timeout: StdDuration,
}

impl<B, C> Debug for BidFlowApi<B, C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "BidFlowApi")
    }
}

impl<B: Clone, C> BidFlowApi<B, C> {
    pub fn new(
        db: B,
        producers: EventProducers,
        locks: OrderLocks,
        compliance: C,
        tokens: TrustTokenStore,
        config: &EngineConfig,
    ) -> Self {
        Self {
            quota: QuotaGuard::new(db.clone(), config.quota.clone()),
            db,
            producers,
            locks,
            compliance,
            guard: AuctionGuard::new(config.auction.clone()),
            ledger: CapacityLedger::new(config.decomposition.clone()),
            tokens,
            compliance_timeout: config.compliance_timeout,
        }
    }
}

impl<B, C> BidFlowApi<B, C> {
    pub fn db(&self) -> &B {
        &self.db
    }

    pub fn tokens(&self) -> &TrustTokenStore {
        &self.tokens
    }

    pub fn quota(&self) -> &QuotaGuard<B> {
        &self.quota
    }

    pub fn guard(&self) -> &AuctionGuard {
        &self.guard
    }
}

impl<B, C> BidFlowApi<B, C>
where
    B: AuctionDatabase,
    C: ComplianceOracle,
    AuctionError: From<B::Error>,
{
    /// Places a bid on a freight order, a lot or a whole (non-LTL) master order.
    ///
    /// On success the bid is stored as `PENDING` and a trust token is issued for it. Scoring happens asynchronously:
    /// a [`ScoringRequestedEvent`] is published and the returned bid carries no score yet.
    pub async fn place_bid(&self, bid: NewBid) -> Result<BidAdmission, AuctionError> {
        if !bid.amount.is_positive() {
            return Err(AuctionError::ValidationError(format!("Bid amount must be positive (got {})", bid.amount)));
        }
        let order = self.fetch_order(bid.order_ref).await?;
        check_bid_terms(&bid, &order)?;
        self.guard.validate_auction_start(&order)?;

        let request = ComplianceRequest::new(
            bid.carrier_id.clone(),
            bid.order_ref,
            order.cargo_category(),
            bid.amount,
            order.pickup_location(),
        );
        let verdict = self.check_compliance(&request).await?;

        let _carrier_guard = self.locks.lock(LockKey::Carrier(bid.carrier_id.clone())).await;
        let _order_guard = self.locks.lock(LockKey::for_order(&order)).await;
        // Reload under the lock. Another bid may have changed the order while the oracle was deciding.
        let order = self.fetch_order(bid.order_ref).await?;
        self.guard.validate_auction_start(&order)?;
        let existing = self.db.fetch_bids_for_order_and_carrier(bid.order_ref, &bid.carrier_id).await?;
        if existing.iter().any(|b| b.status == BidStatus::Pending) {
            return Err(AuctionError::ValidationError(format!(
                "{} already has a pending bid on {}",
                bid.carrier_id, bid.order_ref
            )));
        }
        let weight = order.load_weight();
        self.quota.check_carrier_quota(&bid.carrier_id, weight).await?.into_result()?;
        let siblings = match &order {
            BiddableOrder::Partial { lot, master } => {
                let siblings = self.db.fetch_partial_orders(master.id).await?;
                let mut candidate = lot.clone();
                candidate.status = PartialOrderStatus::Bidding;
                self.guard.check_ltl_atomicity(&candidate, &siblings)?;
                siblings
            },
            _ => Vec::new(),
        };
        let now = Utc::now();
        let decision = self.guard.check_anti_sniping(&order, now)?;

        let record = NewBidRecord {
            carrier_id: bid.carrier_id.clone(),
            order_ref: bid.order_ref,
            amount: bid.amount,
            weight,
            proposed_delivery_date: bid.proposed_delivery_date,
            notes: bid.notes.clone(),
            compliance: Some(NewComplianceRecord {
                compliance_status: verdict.compliance_status,
                security_level: verdict.security_level,
                trust_score: verdict.trust_score,
                violations: verdict.violations.clone(),
            }),
        };
        let (changes, status_changes) = admission_changes(&order, &siblings, decision);
        let changes = changes.insert_bid(record);
        let applied = self.db.apply_changes(changes).await?;
        let stored = applied
            .bid
            .ok_or_else(|| AuctionError::DatabaseError(format!("The new bid on {} was not returned", bid.order_ref)))?;
        info!("🏷️ {} placed {} on {} for {}", stored.carrier_id, stored.id, stored.order_ref, stored.amount);

        let placed = BidPlacedEvent {
            bid_id: stored.id,
            carrier_id: stored.carrier_id.clone(),
            order_ref: stored.order_ref,
            amount: stored.amount,
            timestamp: stored.created_at,
        };
        let scoring = ScoringRequestedEvent::new(&placed);
        self.producers.publish_bid_placed(placed).await;
        self.producers.publish_scoring_requested(scoring).await;
        self.producers.publish_quota(QuotaEvent::burn(stored.carrier_id.clone(), stored.id, stored.weight)).await;
        for event in status_changes {
            self.producers.publish_order_status_changed(event).await;
        }

        let grant = TokenGrant {
            carrier_id: stored.carrier_id.clone(),
            order_ref: stored.order_ref,
            bid_id: stored.id,
            compliance_status: verdict.compliance_status,
            security_level: verdict.security_level,
            trust_score: verdict.trust_score,
        };
        let token = match verdict.trust_token {
            Some(token) => self.tokens.adopt(token, grant).await,
            None => self.tokens.issue(grant).await,
        };
        let extended_until = match decision {
            SnipingDecision::Extend { new_close, .. } => Some(new_close),
            _ => None,
        };
        Ok(BidAdmission { bid: stored, trust_token: token.token, extended_until })
    }

    /// Moves a bid along its lifecycle. A freight order follows its winning bid into transit and completion.
    ///
    /// Accepting a pending bid awards the order to it, exactly as [`Self::award_order`] does. A pending bid can only
    /// skip ahead to `COMMITTED` or `IN_PROGRESS` if it is already the order's winning bid.
    pub async fn update_bid_status(&self, bid_id: BidId, status: BidStatus) -> Result<Bid, AuctionError> {
        let bid = self.fetch_bid(bid_id).await?;
        if bid.status == BidStatus::Pending && status == BidStatus::Accepted {
            return self.award_order(bid.order_ref, bid_id).await.map(|outcome| outcome.winning_bid);
        }
        let order = self.fetch_order(bid.order_ref).await?;
        let _guard = self.locks.lock(LockKey::for_order(&order)).await;
        let bid = self.fetch_bid(bid_id).await?;
        let order = self.fetch_order(bid.order_ref).await?;
        if !bid.status.can_transition_to(status) {
            return Err(AuctionError::InvalidStateTransition(format!("{bid_id} cannot move from {} to {status}", bid.status)));
        }
        if bid.status == BidStatus::Pending && status.is_active_load() && !is_winning_bid(&order, bid_id) {
            return Err(AuctionError::InvalidStateTransition(format!(
                "{bid_id} has not won {} and cannot move to {status}",
                bid.order_ref
            )));
        }
        let mut changes = ChangeSet::default().update_bid(bid_id, status);
        let mut status_changes = Vec::new();
        match &order {
            BiddableOrder::Freight(freight) if freight.awarded_bid_id == Some(bid_id) => {
                let target = match status {
                    BidStatus::InProgress => Some(FreightOrderStatus::InProgress),
                    BidStatus::Delivered => Some(FreightOrderStatus::Completed),
                    _ => None,
                };
                if let Some(target) = target.filter(|t| *t != freight.status) {
                    changes = changes.update_freight(FreightOrderUpdate::new(freight.id).with_status(target));
                    status_changes.push(OrderStatusChangedEvent::new(order.order_ref(), freight.status, target));
                }
                if status == BidStatus::Delivered {
                    changes = changes.record_carrier_stats(CarrierStatsDelta {
                        carrier_id: bid.carrier_id.clone(),
                        total_orders: 0,
                        completed_orders: 1,
                    });
                }
            },
            BiddableOrder::Partial { lot, master } if status == BidStatus::Rejected && lot.status == PartialOrderStatus::Bidding => {
                // The lot goes back on the market once its last pending bid is gone.
                let others = self.db.fetch_bids_for_order(bid.order_ref).await?;
                let still_pending = others.iter().any(|b| b.id != bid_id && b.status == BidStatus::Pending);
                if !still_pending {
                    let lots = self.db.fetch_partial_orders(master.id).await?;
                    let projected = with_lot_statuses(&lots, &[(lot.id, PartialOrderStatus::Available)]);
                    let new_status = derive_master_status(master, &projected);
                    changes = changes.update_lot(LotUpdate::status(lot.id, PartialOrderStatus::Available));
                    status_changes.push(OrderStatusChangedEvent::new(
                        order.order_ref(),
                        lot.status,
                        PartialOrderStatus::Available,
                    ));
                    if new_status != master.status {
                        changes = changes.update_master(MasterOrderUpdate::new(master.id).with_status(new_status));
                        status_changes.push(OrderStatusChangedEvent::new(
                            OrderRef::MasterOrder(master.id),
                            master.status,
                            new_status,
                        ));
                    }
                }
            },
            _ => {},
        }
        self.db.apply_changes(changes).await?;
        debug!("🏷️ {bid_id} moved from {} to {status}", bid.status);
        if bid.status.holds_quota() && !status.holds_quota() {
            self.producers.publish_quota(QuotaEvent::release(bid.carrier_id.clone(), bid_id, bid.weight)).await;
        }
        for event in status_changes {
            self.producers.publish_order_status_changed(event).await;
        }
        self.fetch_bid(bid_id).await
    }

    /// Awards an order to one of its pending bids. Every other pending bid on the order is rejected.
    ///
    /// Awarding a whole master order carves a lot covering its remaining capacity and assigns it to the winner.
    pub async fn award_order(&self, order_ref: OrderRef, bid_id: BidId) -> Result<AwardOutcome, AuctionError> {
        let order = self.fetch_order(order_ref).await?;
        let _guard = self.locks.lock(LockKey::for_order(&order)).await;
        let order = self.fetch_order(order_ref).await?;
        let bid = self.fetch_bid(bid_id).await?;
        if bid.order_ref != order_ref {
            return Err(AuctionError::ValidationError(format!("{bid_id} was placed on {}, not {order_ref}", bid.order_ref)));
        }
        if bid.status != BidStatus::Pending {
            return Err(AuctionError::InvalidStateTransition(format!("{bid_id} is {} and cannot win", bid.status)));
        }
        ensure_awardable(&order)?;
        let bids = self.db.fetch_bids_for_order(order_ref).await?;
        let losers = bids.iter().filter(|b| b.id != bid_id && b.status == BidStatus::Pending).collect::<Vec<_>>();

        let mut changes = ChangeSet::default().update_bid(bid_id, BidStatus::Accepted).record_carrier_stats(
            CarrierStatsDelta { carrier_id: bid.carrier_id.clone(), total_orders: 1, completed_orders: 0 },
        );
        for loser in &losers {
            changes = changes.update_bid(loser.id, BidStatus::Rejected);
        }
        let mut status_changes = Vec::new();
        match &order {
            BiddableOrder::Freight(freight) => {
                changes = changes.update_freight(
                    FreightOrderUpdate::new(freight.id).with_status(FreightOrderStatus::Awarded).with_awarded_bid(bid_id),
                );
                status_changes.push(OrderStatusChangedEvent::new(order_ref, freight.status, FreightOrderStatus::Awarded));
            },
            BiddableOrder::Partial { lot, master } => {
                let lots = self.db.fetch_partial_orders(master.id).await?;
                let mut candidate = lot.clone();
                candidate.status = PartialOrderStatus::Awarded;
                self.guard.check_ltl_atomicity(&candidate, &lots)?;
                let projected = with_lot_statuses(&lots, &[(lot.id, PartialOrderStatus::Awarded)]);
                let new_status = derive_master_status(master, &projected);
                changes = changes.update_lot(LotUpdate::assign(lot.id, bid.carrier_id.clone(), bid_id));
                status_changes.push(OrderStatusChangedEvent::new(order_ref, lot.status, PartialOrderStatus::Awarded));
                if new_status != master.status {
                    changes = changes.update_master(MasterOrderUpdate::new(master.id).with_status(new_status));
                    status_changes.push(OrderStatusChangedEvent::new(
                        OrderRef::MasterOrder(master.id),
                        master.status,
                        new_status,
                    ));
                }
            },
            BiddableOrder::Master(master) => {
                let (record, remaining) = self.whole_order_lot(master, &bid)?;
                let lots = self.db.fetch_partial_orders(master.id).await?;
                let candidate = provisional_lot(&record);
                self.guard.check_ltl_atomicity(&candidate, &lots)?;
                let mut projected = lots;
                projected.push(candidate);
                let new_status = derive_master_status(master, &projected);
                let mut update = MasterOrderUpdate::new(master.id).with_remaining(remaining.0, remaining.1);
                if new_status != master.status {
                    update = update.with_status(new_status);
                    status_changes.push(OrderStatusChangedEvent::new(order_ref, master.status, new_status));
                }
                changes = changes.update_master(update).insert_lot(record);
            },
        }
        let applied = self.db.apply_changes(changes).await?;
        let awarded_lot = applied.lots.into_iter().next();
        info!(
            "🏷️ {order_ref} awarded to {} ({bid_id} at {}). {} other bids rejected",
            bid.carrier_id,
            bid.amount,
            losers.len()
        );

        for loser in &losers {
            self.producers.publish_quota(QuotaEvent::release(loser.carrier_id.clone(), loser.id, loser.weight)).await;
        }
        for event in status_changes {
            self.producers.publish_order_status_changed(event).await;
        }
        let assigned = CarrierAssignedEvent {
            carrier_id: bid.carrier_id.clone(),
            order_ref,
            bid_id,
            amount: bid.amount,
            timestamp: Utc::now(),
        };
        self.producers.publish_carrier_assigned(assigned).await;
        let winning_bid = self.fetch_bid(bid_id).await?;
        Ok(AwardOutcome { winning_bid, rejected_bids: losers.iter().map(|b| b.id).collect(), awarded_lot })
    }

    /// Closes an order's auction once its close time has passed, awarding it to the best pending bid.
    ///
    /// Bids are ranked by match score (unscored bids last), then by the lower amount, then by placement order.
    /// Returns `None` if nobody bid.
    pub async fn close_auction(&self, order_ref: OrderRef) -> Result<Option<AwardOutcome>, AuctionError> {
        let order = self.fetch_order(order_ref).await?;
        self.guard.validate_auction_completion(&order, Utc::now())?;
        let bids = self.db.fetch_bids_for_order(order_ref).await?;
        let Some(winner) = best_pending_bid(&bids) else {
            info!("🏷️ The auction for {order_ref} closed without any pending bids");
            return Ok(None);
        };
        let winner = winner.id;
        self.award_order(order_ref, winner).await.map(Some)
    }

    async fn check_compliance(&self, request: &ComplianceRequest) -> Result<ComplianceVerdict, AuctionError> {
        let verdict = match tokio::time::timeout(self.compliance_timeout, self.compliance.validate_bid(request)).await {
            Ok(Ok(verdict)) => verdict,
            Ok(Err(e)) => {
                warn!("🏷️ Compliance check for {} on {} failed: {e}", request.carrier_id, request.order_ref);
                return Err(e.into());
            },
            Err(_) => {
                warn!(
                    "🏷️ Compliance check for {} on {} timed out after {}ms",
                    request.carrier_id,
                    request.order_ref,
                    self.compliance_timeout.as_millis()
                );
                return Err(AuctionError::ExternalServiceError(format!(
                    "The compliance oracle did not answer within {}ms",
                    self.compliance_timeout.as_millis()
                )));
            },
        };
        if !verdict.allowed {
            let reason = verdict.refusal_reason();
            info!("🏷️ Compliance oracle refused {} on {}: {reason}", request.carrier_id, request.order_ref);
            return Err(AuctionError::ComplianceViolation(reason));
        }
        trace!("🏷️ {} passed compliance with trust score {:.1}", request.carrier_id, verdict.trust_score);
        Ok(verdict)
    }

    /// The awarded lot for a whole-order win, and the master order's remaining capacity once it is carved.
    fn whole_order_lot(
        &self,
        master: &MasterOrder,
        bid: &Bid,
    ) -> Result<(NewLotRecord, (Weight, Volume)), AuctionError> {
        if !master.remaining_weight.is_positive() {
            return Err(AuctionError::InsufficientCapacity(format!("{} has no capacity left to award", master.id)));
        }
        let weight = master.remaining_weight;
        let volume = master.remaining_volume;
        let remaining = self.ledger.reserve(master, weight, volume)?;
        let record = NewLotRecord {
            master_order_id: master.id,
            weight,
            volume,
            percentage: Percentage::from_fraction(weight.ratio_of(master.total_weight)),
            status: PartialOrderStatus::Awarded,
            assigned_carrier_id: Some(bid.carrier_id.clone()),
            assigned_bid_id: Some(bid.id),
        };
        Ok((record, remaining))
    }

    async fn fetch_order(&self, order_ref: OrderRef) -> Result<BiddableOrder, AuctionError> {
        self.db.fetch_biddable_order(order_ref).await?.ok_or_else(|| AuctionError::NotFound(order_ref.to_string()))
    }

    async fn fetch_bid(&self, bid_id: BidId) -> Result<Bid, AuctionError> {
        self.db.fetch_bid(bid_id).await?.ok_or_else(|| AuctionError::NotFound(bid_id.to_string()))
    }
}

fn check_bid_terms(bid: &NewBid, order: &BiddableOrder) -> Result<(), AuctionError> {
    let max = order.max_bid_amount();
    if bid.amount > max {
        return Err(AuctionError::ValidationError(format!(
            "Bid amount {} exceeds the maximum of {max} for {}",
            bid.amount,
            order.order_ref()
        )));
    }
    let required = order.required_delivery_date();
    if bid.proposed_delivery_date > required {
        return Err(AuctionError::ValidationError(format!(
            "Proposed delivery {} is later than the required delivery date {required}",
            bid.proposed_delivery_date
        )));
    }
    Ok(())
}

fn is_winning_bid(order: &BiddableOrder, bid_id: BidId) -> bool {
    match order {
        BiddableOrder::Freight(freight) => freight.awarded_bid_id == Some(bid_id),
        BiddableOrder::Partial { lot, .. } => lot.assigned_bid_id == Some(bid_id),
        BiddableOrder::Master(_) => false,
    }
}

fn ensure_awardable(order: &BiddableOrder) -> Result<(), AuctionError> {
    let open = match order {
        BiddableOrder::Freight(o) => o.status.is_open_for_bids(),
        BiddableOrder::Master(o) => {
            !o.ltl_enabled && matches!(o.status, MasterOrderStatus::Open | MasterOrderStatus::PartiallyFilled)
        },
        BiddableOrder::Partial { lot, master } => {
            lot.status.is_open_for_bids() && !master.status.is_terminal()
        },
    };
    if open {
        Ok(())
    } else {
        Err(AuctionError::InvalidStateTransition(format!("{} can no longer be awarded", order.order_ref())))
    }
}

/// The changes an admitted bid makes to its order, besides the bid itself, and the status events they imply.
fn admission_changes(
    order: &BiddableOrder,
    siblings: &[PartialOrder],
    decision: SnipingDecision,
) -> (ChangeSet, Vec<OrderStatusChangedEvent>) {
    let extension = match decision {
        SnipingDecision::Extend { new_close, extension_count } => Some((new_close, extension_count)),
        _ => None,
    };
    let mut events = Vec::new();
    let changes = match order {
        BiddableOrder::Freight(freight) => {
            let mut update = FreightOrderUpdate::new(freight.id);
            if let Some((close, count)) = extension {
                update = update.with_extension(close, count);
            }
            if freight.status == FreightOrderStatus::Open {
                update = update.with_status(FreightOrderStatus::AuctionActive);
                events.push(OrderStatusChangedEvent::new(order.order_ref(), freight.status, FreightOrderStatus::AuctionActive));
            }
            ChangeSet::default().update_freight(update)
        },
        BiddableOrder::Master(master) => ChangeSet::default().update_master(extend_master(master, extension)),
        BiddableOrder::Partial { lot, master } => {
            let mut update = extend_master(master, extension);
            let mut changes = ChangeSet::default();
            if lot.status == PartialOrderStatus::Available {
                changes = changes.update_lot(LotUpdate::status(lot.id, PartialOrderStatus::Bidding));
                events.push(OrderStatusChangedEvent::new(order.order_ref(), lot.status, PartialOrderStatus::Bidding));
                let projected = with_lot_statuses(siblings, &[(lot.id, PartialOrderStatus::Bidding)]);
                let new_status = derive_master_status(master, &projected);
                if new_status != master.status {
                    update = update.with_status(new_status);
                    events.push(OrderStatusChangedEvent::new(OrderRef::MasterOrder(master.id), master.status, new_status));
                }
            }
            changes.update_master(update)
        },
    };
    (changes, events)
}

fn extend_master(master: &MasterOrder, extension: Option<(DateTime<Utc>, i64)>) -> MasterOrderUpdate {
    let update = MasterOrderUpdate::new(master.id);
    match extension {
        Some((close, count)) => update.with_extension(close, count),
        None => update,
    }
}

/// Highest match score first, unscored bids last. Ties go to the lower amount, then to the earlier bid.
pub fn best_pending_bid(bids: &[Bid]) -> Option<&Bid> {
    bids.iter().filter(|b| b.status == BidStatus::Pending).min_by(|a, b| {
        let score_a = a.match_score.unwrap_or(f64::NEG_INFINITY);
        let score_b = b.match_score.unwrap_or(f64::NEG_INFINITY);
        score_b
            .total_cmp(&score_a)
            .then_with(|| a.amount.cmp(&b.amount))
            .then_with(|| a.created_at.cmp(&b.created_at))
            .then_with(|| a.id.cmp(&b.id))
    })
}

#[cfg(test)]
mod test {
    use std::time::Duration as StdDuration;

    use fae_common::Money;

    use super::*;
    use crate::{
        db::{
            memory::MemoryDatabase,
            traits::{BidManagement, OrderManagement},
        },
        db_types::FreightOrderId,
        events::EventProducers,
        test_utils::{
            fixtures::{bid as new_bid, freight_order, master_order, TestEngine},
            mocks::MockComplianceOracle,
        },
    };

    fn bid(id: i64, amount: i64, score: Option<f64>, status: BidStatus) -> Bid {
        let now = Utc::now();
        Bid {
            id: BidId(id),
            carrier_id: format!("carrier-{id}").into(),
            order_ref: OrderRef::FreightOrder(FreightOrderId(1)),
            amount: Money::from(amount),
            weight: Weight::from(20),
            proposed_delivery_date: now,
            notes: None,
            status,
            match_score: score,
            score_breakdown: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn best_bid_ranking() {
        let bids = vec![
            bid(1, 1000, Some(70.0), BidStatus::Pending),
            bid(2, 900, Some(82.5), BidStatus::Pending),
            bid(3, 800, None, BidStatus::Pending),
            bid(4, 500, Some(99.0), BidStatus::Rejected),
        ];
        assert_eq!(best_pending_bid(&bids).map(|b| b.id), Some(BidId(2)));
    }

    #[test]
    fn ties_go_to_the_cheaper_bid() {
        let bids = vec![bid(1, 1000, Some(80.0), BidStatus::Pending), bid(2, 950, Some(80.0), BidStatus::Pending)];
        assert_eq!(best_pending_bid(&bids).map(|b| b.id), Some(BidId(2)));
        let unscored = vec![bid(1, 1000, None, BidStatus::Pending), bid(2, 950, None, BidStatus::Pending)];
        assert_eq!(best_pending_bid(&unscored).map(|b| b.id), Some(BidId(2)));
        assert!(best_pending_bid(&[bid(1, 1000, None, BidStatus::Accepted)]).is_none());
    }

    #[tokio::test]
    async fn accepting_a_pending_bid_awards_the_freight_order() {
        let engine = TestEngine::in_memory();
        let order = engine.orders.create_freight_order(freight_order(40, 10, 48)).await.unwrap();
        let alpha = engine.bids.place_bid(new_bid("alpha", order.id, 1000)).await.unwrap().bid;
        let bravo = engine.bids.place_bid(new_bid("bravo", order.id, 1100)).await.unwrap().bid;

        let err = engine.bids.update_bid_status(alpha.id, BidStatus::Committed).await.unwrap_err();
        assert!(matches!(err, AuctionError::InvalidStateTransition(_)), "{err}");
        let err = engine.bids.update_bid_status(alpha.id, BidStatus::InProgress).await.unwrap_err();
        assert!(matches!(err, AuctionError::InvalidStateTransition(_)), "{err}");

        let accepted = engine.bids.update_bid_status(alpha.id, BidStatus::Accepted).await.unwrap();
        assert_eq!(accepted.status, BidStatus::Accepted);
        let stored = engine.db.fetch_freight_order(order.id).await.unwrap().unwrap();
        assert_eq!(stored.status, FreightOrderStatus::Awarded);
        assert_eq!(stored.awarded_bid_id, Some(alpha.id));
        let bravo = engine.db.fetch_bid(bravo.id).await.unwrap().unwrap();
        assert_eq!(bravo.status, BidStatus::Rejected);

        let err = engine.bids.award_order(order.id.into(), bravo.id).await.unwrap_err();
        assert!(matches!(err, AuctionError::InvalidStateTransition(_)), "{err}");
        let holders = engine
            .db
            .fetch_bids_for_order(order.id.into())
            .await
            .unwrap()
            .into_iter()
            .filter(|b| b.status.is_active_load())
            .count();
        assert_eq!(holders, 1);

        let committed = engine.bids.update_bid_status(alpha.id, BidStatus::Committed).await.unwrap();
        assert_eq!(committed.status, BidStatus::Committed);
    }

    #[tokio::test]
    async fn accepting_a_pending_bid_awards_the_lot() {
        let engine = TestEngine::in_memory();
        let (_, lots) = engine.orders.create_master_order(master_order(1000, 100, 48).with_ltl(None)).await.unwrap();
        let lot = &lots[0];
        let alpha = engine.bids.place_bid(new_bid("alpha", lot.id, 800)).await.unwrap().bid;
        let bravo = engine.bids.place_bid(new_bid("bravo", lot.id, 850)).await.unwrap().bid;

        let err = engine.bids.update_bid_status(bravo.id, BidStatus::InProgress).await.unwrap_err();
        assert!(matches!(err, AuctionError::InvalidStateTransition(_)), "{err}");
        let unchanged = engine.db.fetch_partial_order(lot.id).await.unwrap().unwrap();
        assert_eq!(unchanged.status, PartialOrderStatus::Bidding);
        assert_eq!(unchanged.assigned_bid_id, None);

        engine.bids.update_bid_status(alpha.id, BidStatus::Accepted).await.unwrap();
        let awarded = engine.db.fetch_partial_order(lot.id).await.unwrap().unwrap();
        assert_eq!(awarded.status, PartialOrderStatus::Awarded);
        assert_eq!(awarded.assigned_carrier_id, Some("alpha".into()));
        assert_eq!(awarded.assigned_bid_id, Some(alpha.id));
        let bravo = engine.db.fetch_bid(bravo.id).await.unwrap().unwrap();
        assert_eq!(bravo.status, BidStatus::Rejected);
        let err = engine.bids.award_order(lot.id.into(), bravo.id).await.unwrap_err();
        assert!(matches!(err, AuctionError::InvalidStateTransition(_)), "{err}");
    }

    #[tokio::test]
    async fn compliance_timeouts_reject_the_bid_without_side_effects() {
        let config = EngineConfig { compliance_timeout: StdDuration::from_millis(10), ..Default::default() };
        let oracle = MockComplianceOracle::default().with_delay(StdDuration::from_millis(50));
        let engine = TestEngine::new(MemoryDatabase::new(), config, oracle, EventProducers::default());
        let (master, lots) = engine.orders.create_master_order(master_order(1000, 100, 48).with_ltl(None)).await.unwrap();
        let lot = &lots[0];

        let err = engine.bids.place_bid(new_bid("slowpoke", lot.id, 800)).await.unwrap_err();
        assert!(matches!(err, AuctionError::ExternalServiceError(_)), "{err}");
        assert_eq!(engine.oracle.calls(), 1);
        assert!(engine.db.fetch_bids_for_order(lot.id.into()).await.unwrap().is_empty());
        let lot = engine.db.fetch_partial_order(lot.id).await.unwrap().unwrap();
        assert_eq!(lot.status, PartialOrderStatus::Available);
        let master_now = engine.db.fetch_master_order(master.id).await.unwrap().unwrap();
        assert_eq!(master_now.status, master.status);
        assert_eq!(master_now.extension_count, master.extension_count);
        assert!(engine.tokens.active_tokens_for_carrier(&"slowpoke".into()).await.is_empty());
    }
}
