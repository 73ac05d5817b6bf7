//! Fairness rules checked on every bid before it is admitted.
//!
//! * Anti-sniping: a bid landing inside the sniping window before the auction closes pushes the close time back.
//! * LTL atomicity: the lots of a master order that are bid on or awarded never add up to more than 100%.
//!
//! Both checks are pure. The caller holds the master order's lock and commits any extension together with the bid.
use chrono::{DateTime, Utc};
use fae_common::Percentage;
use log::*;

use crate::{
    config::AuctionPolicy,
    db_types::{BiddableOrder, MasterOrderStatus, PartialOrder},
    fae_api::{errors::AuctionError, order_decomposer::allocated_percentage},
};

/// What the anti-sniping rule decided for a bid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnipingDecision {
    /// The bid arrived before the sniping window.
    Outside,
    /// The bid arrived inside the window. The auction now closes at `new_close`.
    Extend { new_close: DateTime<Utc>, extension_count: i64 },
    /// The bid arrived inside the window, but the order has used up its extensions.
    CapReached,
}

#[derive(Debug, Clone, Default)]
pub struct AuctionGuard {
    policy: AuctionPolicy,
}

impl AuctionGuard {
    pub fn new(policy: AuctionPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &AuctionPolicy {
        &self.policy
    }

    /// Decides whether a bid placed at `now` extends the auction. Bids after the close are rejected.
    pub fn check_anti_sniping(&self, order: &BiddableOrder, now: DateTime<Utc>) -> Result<SnipingDecision, AuctionError> {
        let close = order.required_delivery_date();
        let remaining = close - now;
        if remaining <= chrono::Duration::zero() {
            return Err(AuctionError::ValidationError(format!("The auction for {} closed at {close}", order.order_ref())));
        }
        if remaining > self.policy.sniping_window {
            return Ok(SnipingDecision::Outside);
        }
        let count = order.extension_count();
        if let Some(cap) = self.policy.max_extensions {
            if count >= i64::from(cap) {
                info!("🏷️ {} is inside the sniping window but has used all {cap} extensions", order.order_ref());
                return Ok(SnipingDecision::CapReached);
            }
        }
        let new_close = close + self.policy.extension;
        debug!(
            "🏷️ Bid on {} arrived {}s before close. Extending the auction to {new_close}",
            order.order_ref(),
            remaining.num_seconds()
        );
        Ok(SnipingDecision::Extend { new_close, extension_count: count + 1 })
    }

    /// Checks that allocating `candidate` keeps its master order's allocated lots at or below 100%.
    ///
    /// `siblings` are all the lots of the master order. The candidate counts once, whether or not it is already
    /// among the allocated lots.
    pub fn check_ltl_atomicity(&self, candidate: &PartialOrder, siblings: &[PartialOrder]) -> Result<(), AuctionError> {
        let others = siblings.iter().filter(|l| l.id != candidate.id).cloned().collect::<Vec<_>>();
        let allocated = allocated_percentage(&others);
        let total = allocated + candidate.percentage;
        if total > Percentage::hundred() {
            warn!(
                "🏷️ Allocating {} would commit {total} of {} ({allocated} already allocated)",
                candidate.id, candidate.master_order_id
            );
            return Err(AuctionError::ComplianceViolation(format!(
                "Over-commitment: {} would bring {} to {total} allocated",
                candidate.id, candidate.master_order_id
            )));
        }
        Ok(())
    }

    /// Checks that the order is in a state where it can receive bids.
    pub fn validate_auction_start(&self, order: &BiddableOrder) -> Result<(), AuctionError> {
        match order {
            BiddableOrder::Freight(o) => {
                if !o.status.is_open_for_bids() {
                    return Err(AuctionError::ValidationError(format!("{} is {} and takes no bids", o.id, o.status)));
                }
            },
            BiddableOrder::Master(o) => {
                if o.ltl_enabled {
                    return Err(AuctionError::ValidationError(format!(
                        "{} is split into lots. Bid on one of its lots instead",
                        o.id
                    )));
                }
                if !matches!(o.status, MasterOrderStatus::Open | MasterOrderStatus::PartiallyFilled) {
                    return Err(AuctionError::ValidationError(format!("{} is {} and takes no bids", o.id, o.status)));
                }
            },
            BiddableOrder::Partial { lot, master } => {
                if !matches!(master.status, MasterOrderStatus::Open | MasterOrderStatus::PartiallyFilled) {
                    return Err(AuctionError::ValidationError(format!(
                        "{} is {} and its lots take no bids",
                        master.id, master.status
                    )));
                }
                if !lot.status.is_open_for_bids() {
                    return Err(AuctionError::ValidationError(format!("{} is {} and takes no bids", lot.id, lot.status)));
                }
            },
        }
        Ok(())
    }

    /// Checks that the order's auction may be closed: its close time has passed.
    pub fn validate_auction_completion(&self, order: &BiddableOrder, now: DateTime<Utc>) -> Result<(), AuctionError> {
        let close = order.required_delivery_date();
        if now < close {
            return Err(AuctionError::ValidationError(format!(
                "The auction for {} runs until {close}",
                order.order_ref()
            )));
        }
        Ok(())
    }
}
