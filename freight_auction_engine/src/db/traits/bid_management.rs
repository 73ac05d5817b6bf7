use fae_common::Money;

use crate::{
    db::traits::DatabaseBackend,
    db_types::{
        Bid,
        BidId,
        BidStatus,
        CargoCategory,
        CarrierId,
        ComplianceSnapshot,
        OrderKind,
        OrderRef,
        ScoreBreakdown,
    },
};

/// The `BidManagement` trait defines the behaviour for querying bids and recording their scores.
#[allow(async_fn_in_trait)]
pub trait BidManagement: DatabaseBackend {
    async fn fetch_bid(&self, id: BidId) -> Result<Option<Bid>, Self::Error>;

    /// Every bid against the given order, in placement order.
    async fn fetch_bids_for_order(&self, order: OrderRef) -> Result<Vec<Bid>, Self::Error>;

    async fn fetch_bids_for_order_and_carrier(
        &self,
        order: OrderRef,
        carrier_id: &CarrierId,
    ) -> Result<Vec<Bid>, Self::Error> {
        let bids = self.fetch_bids_for_order(order).await?;
        Ok(bids.into_iter().filter(|b| &b.carrier_id == carrier_id).collect())
    }

    /// The carrier's bids in any of the given statuses. An empty slice matches every status.
    async fn fetch_bids_for_carrier(&self, carrier_id: &CarrierId, statuses: &[BidStatus])
        -> Result<Vec<Bid>, Self::Error>;

    /// Amounts of non-rejected bids on orders of the same kind and cargo category, excluding `exclude`.
    async fn fetch_comparable_bid_amounts(
        &self,
        kind: OrderKind,
        category: CargoCategory,
        exclude: BidId,
    ) -> Result<Vec<Money>, Self::Error>;

    async fn fetch_compliance_snapshot(&self, bid_id: BidId) -> Result<Option<ComplianceSnapshot>, Self::Error>;

    /// Overwrites the bid's match score. Writing the same breakdown twice leaves the bid unchanged.
    async fn save_score(&self, bid_id: BidId, breakdown: &ScoreBreakdown) -> Result<(), Self::Error>;
}
