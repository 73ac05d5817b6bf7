use std::fmt::Debug;

use fae_common::{Decimal, Fraction, Weight};

use crate::{
    db::traits::{BidManagement, OrderManagement},
    db_types::{Bid, BidStatus, CarrierId, MasterOrderId, MasterOrderStatus, OrderRef, PartialOrderStatus},
    fae_api::{
        errors::AuctionError,
        order_decomposer::compute_progress,
        order_objects::{OrderStatistics, OrderWithBids, ProgressSnapshot},
    },
};

/// Read-only views for shipper- and carrier-facing screens.
pub struct AuctionQueryApi<B> {
    db: B,
}

impl<B> Debug for AuctionQueryApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "AuctionQueryApi")
    }
}

impl<B> AuctionQueryApi<B> {
    pub fn new(db: B) -> Self {
        Self { db }
    }
}

impl<B> AuctionQueryApi<B>
where
    B: OrderManagement + BidManagement,
    AuctionError: From<B::Error>,
{
    /// The order with its bids, best match score first. Unscored bids come last, oldest first.
    pub async fn order_with_bids(&self, order_ref: OrderRef) -> Result<OrderWithBids, AuctionError> {
        let order =
            self.db.fetch_biddable_order(order_ref).await?.ok_or_else(|| AuctionError::NotFound(order_ref.to_string()))?;
        let mut bids = self.db.fetch_bids_for_order(order_ref).await?;
        sort_by_score(&mut bids);
        Ok(OrderWithBids { order, bids })
    }

    /// The carrier's bids in any of the given statuses, or all of them if `statuses` is empty.
    pub async fn bids_for_carrier(&self, carrier_id: &CarrierId, statuses: &[BidStatus]) -> Result<Vec<Bid>, AuctionError> {
        Ok(self.db.fetch_bids_for_carrier(carrier_id, statuses).await?)
    }

    pub async fn progress(&self, master_id: MasterOrderId) -> Result<ProgressSnapshot, AuctionError> {
        let master =
            self.db.fetch_master_order(master_id).await?.ok_or_else(|| AuctionError::NotFound(master_id.to_string()))?;
        let lots = self.db.fetch_partial_orders(master_id).await?;
        Ok(compute_progress(&master, &lots))
    }

    pub async fn order_statistics(&self) -> Result<OrderStatistics, AuctionError> {
        let masters = self.db.fetch_master_orders(&[]).await?;
        let mut stats = OrderStatistics { total_orders: masters.len(), ..Default::default() };
        let mut fill_sum = Decimal::ZERO;
        let mut live = 0u32;
        for master in &masters {
            *stats.by_status.entry(master.status.to_string()).or_default() += 1;
            stats.total_weight += master.total_weight;
            let lots = self.db.fetch_partial_orders(master.id).await?;
            stats.committed_weight +=
                lots.iter().filter(|l| l.status.is_committed()).map(|l| l.weight).sum::<Weight>();
            if master.status != MasterOrderStatus::Cancelled {
                fill_sum += compute_progress(master, &lots).fill_fraction.value();
                live += 1;
            }
        }
        if live > 0 {
            stats.average_fill_fraction = Fraction::new(fill_sum / Decimal::from(live));
        }
        Ok(stats)
    }

    /// Lots of a master order that can still be bid on.
    pub async fn open_lots(&self, master_id: MasterOrderId) -> Result<Vec<crate::db_types::PartialOrder>, AuctionError> {
        let lots = self.db.fetch_partial_orders(master_id).await?;
        Ok(lots.into_iter().filter(|l| matches!(l.status, PartialOrderStatus::Available | PartialOrderStatus::Bidding)).collect())
    }
}

pub(crate) fn sort_by_score(bids: &mut [Bid]) {
    bids.sort_by(|a, b| {
        let score_a = a.match_score.unwrap_or(f64::NEG_INFINITY);
        let score_b = b.match_score.unwrap_or(f64::NEG_INFINITY);
        score_b.total_cmp(&score_a).then_with(|| a.created_at.cmp(&b.created_at)).then_with(|| a.id.cmp(&b.id))
    });
}

#[cfg(test)]
mod test {
    use chrono::Utc;
    use fae_common::Money;

    use super::*;
    use crate::db_types::{BidId, FreightOrderId};

    #[test]
    fn bids_sort_by_score_then_age() {
        let now = Utc::now();
        let bid = |id: i64, score: Option<f64>| Bid {
            id: BidId(id),
            carrier_id: "c".into(),
            order_ref: OrderRef::FreightOrder(FreightOrderId(1)),
            amount: Money::from(100),
            weight: Weight::from(1),
            proposed_delivery_date: now,
            notes: None,
            status: BidStatus::Pending,
            match_score: score,
            score_breakdown: None,
            created_at: now,
            updated_at: now,
        };
        let mut bids = vec![bid(1, None), bid(2, Some(40.0)), bid(3, Some(91.5)), bid(4, None)];
        sort_by_score(&mut bids);
        assert_eq!(bids.iter().map(|b| b.id.0).collect::<Vec<_>>(), vec![3, 2, 1, 4]);
    }
}
