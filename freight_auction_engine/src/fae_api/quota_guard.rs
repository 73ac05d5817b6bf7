//! Per-carrier load quota.
//!
//! A carrier's load is the weight of its bids that are accepted, committed or in progress (active load) plus the
//! weight of its pending bids. A new bid is admitted only if the total stays within the carrier's ceiling.
use fae_common::Weight;
use log::*;
use serde::Serialize;

use crate::{
    config::QuotaPolicy,
    db::traits::BidManagement,
    db_types::{Bid, BidStatus, CarrierId},
    fae_api::errors::AuctionError,
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QuotaVerdict {
    pub carrier_id: CarrierId,
    pub ceiling: Weight,
    pub active_load: Weight,
    pub pending_load: Weight,
    pub additional_weight: Weight,
    /// `ceiling - (active + pending + additional)`. Negative when the request would exceed the quota.
    pub available_capacity: Weight,
    pub is_within_quota: bool,
    pub violations: Vec<String>,
}

impl QuotaVerdict {
    /// Computes the verdict from the carrier's quota-holding bids.
    pub fn evaluate(carrier_id: CarrierId, ceiling: Weight, bids: &[Bid], additional_weight: Weight) -> Self {
        let active_load = bids.iter().filter(|b| b.status.is_active_load()).map(|b| b.weight).sum::<Weight>();
        let pending_load = bids.iter().filter(|b| b.status == BidStatus::Pending).map(|b| b.weight).sum::<Weight>();
        let total = active_load + pending_load + additional_weight;
        let available_capacity = ceiling - total;
        let mut violations = Vec::new();
        if total > ceiling {
            violations.push(format!(
                "Total load {total} (active {active_load}, pending {pending_load}, requested {additional_weight}) \
                 exceeds the ceiling of {ceiling}"
            ));
        }
        Self {
            carrier_id,
            ceiling,
            active_load,
            pending_load,
            additional_weight,
            available_capacity,
            is_within_quota: violations.is_empty(),
            violations,
        }
    }

    pub fn into_result(self) -> Result<Self, AuctionError> {
        if self.is_within_quota {
            Ok(self)
        } else {
            Err(AuctionError::QuotaExceeded {
                carrier_id: self.carrier_id,
                available_capacity: self.available_capacity,
                violations: self.violations,
            })
        }
    }
}

#[derive(Clone)]
pub struct QuotaGuard<B> {
    db: B,
    policy: QuotaPolicy,
}

impl<B> QuotaGuard<B> {
    pub fn new(db: B, policy: QuotaPolicy) -> Self {
        Self { db, policy }
    }

    pub fn policy(&self) -> &QuotaPolicy {
        &self.policy
    }
}

impl<B> QuotaGuard<B>
where
    B: BidManagement,
    AuctionError: From<B::Error>,
{
    /// Works out whether the carrier can take on `additional_weight` more load.
    ///
    /// The verdict is returned whether or not the carrier is within quota. Use [`QuotaVerdict::into_result`] to turn
    /// a violation into an error.
    pub async fn check_carrier_quota(
        &self,
        carrier_id: &CarrierId,
        additional_weight: Weight,
    ) -> Result<QuotaVerdict, AuctionError> {
        let statuses = [BidStatus::Pending, BidStatus::Accepted, BidStatus::Committed, BidStatus::InProgress];
        let bids = self.db.fetch_bids_for_carrier(carrier_id, &statuses).await?;
        let ceiling = self.policy.ceiling_for(carrier_id);
        let verdict = QuotaVerdict::evaluate(carrier_id.clone(), ceiling, &bids, additional_weight);
        if verdict.is_within_quota {
            trace!("🏷️ {carrier_id} has {} quota left after this bid", verdict.available_capacity);
        } else {
            info!("🏷️ {carrier_id} is over quota: {}", verdict.violations.join("; "));
        }
        Ok(verdict)
    }
}

#[cfg(test)]
mod test {
    use chrono::Utc;
    use fae_common::Money;

    use super::*;
    use crate::db_types::{BidId, FreightOrderId, OrderRef};

    fn bid(id: i64, weight: i64, status: BidStatus) -> Bid {
        let now = Utc::now();
        Bid {
            id: BidId(id),
            carrier_id: "carrier".into(),
            order_ref: OrderRef::FreightOrder(FreightOrderId(id)),
            amount: Money::from(100),
            weight: Weight::from(weight),
            proposed_delivery_date: now,
            notes: None,
            status,
            match_score: None,
            score_breakdown: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn over_quota_reports_negative_capacity() {
        let bids = [bid(1, 100, BidStatus::Accepted), bid(2, 50, BidStatus::InProgress), bid(3, 40, BidStatus::Committed)];
        let verdict = QuotaVerdict::evaluate("carrier".into(), Weight::from(200), &bids, Weight::from(20));
        assert_eq!(verdict.active_load, Weight::from(190));
        assert!(!verdict.is_within_quota);
        assert_eq!(verdict.available_capacity, Weight::from(-10));
        assert_eq!(verdict.violations.len(), 1);
        match verdict.into_result() {
            Err(AuctionError::QuotaExceeded { available_capacity, .. }) => {
                assert_eq!(available_capacity, Weight::from(-10))
            },
            other => panic!("Expected QuotaExceeded, got {other:?}"),
        }
    }

    #[test]
    fn pending_bids_count_against_the_quota() {
        let bids = [bid(1, 150, BidStatus::Pending), bid(2, 30, BidStatus::Accepted)];
        let verdict = QuotaVerdict::evaluate("carrier".into(), Weight::from(200), &bids, Weight::from(20));
        assert_eq!(verdict.pending_load, Weight::from(150));
        assert!(verdict.is_within_quota);
        assert_eq!(verdict.available_capacity, Weight::ZERO);
        assert!(verdict.into_result().is_ok());
    }
}
