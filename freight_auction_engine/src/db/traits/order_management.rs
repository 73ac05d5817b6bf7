use chrono::{DateTime, Utc};

use crate::{
    db::traits::DatabaseBackend,
    db_types::{
        BiddableOrder,
        FreightOrder,
        FreightOrderId,
        MasterOrder,
        MasterOrderId,
        MasterOrderStatus,
        OrderRef,
        PartialOrder,
        PartialOrderId,
    },
};

/// The `OrderManagement` trait defines the behaviour for querying master orders, their lots and freight orders.
#[allow(async_fn_in_trait)]
pub trait OrderManagement: DatabaseBackend {
    async fn fetch_master_order(&self, id: MasterOrderId) -> Result<Option<MasterOrder>, Self::Error>;

    /// Fetches master orders in any of the given statuses, oldest first. An empty slice matches every status.
    async fn fetch_master_orders(&self, statuses: &[MasterOrderStatus]) -> Result<Vec<MasterOrder>, Self::Error>;

    /// Fetches master orders in any of the given statuses whose required delivery date falls in `[from, to]`.
    async fn fetch_master_orders_due_between(
        &self,
        statuses: &[MasterOrderStatus],
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<MasterOrder>, Self::Error> {
        let orders = self.fetch_master_orders(statuses).await?;
        Ok(orders
            .into_iter()
            .filter(|o| o.required_delivery_date >= from && o.required_delivery_date <= to)
            .collect())
    }

    async fn fetch_partial_order(&self, id: PartialOrderId) -> Result<Option<PartialOrder>, Self::Error>;

    /// All lots of a master order, cancelled ones included, in creation order.
    async fn fetch_partial_orders(&self, master_id: MasterOrderId) -> Result<Vec<PartialOrder>, Self::Error>;

    async fn fetch_freight_order(&self, id: FreightOrderId) -> Result<Option<FreightOrder>, Self::Error>;

    /// Loads the order a bid refers to. A lot is loaded together with its master order.
    async fn fetch_biddable_order(&self, order: OrderRef) -> Result<Option<BiddableOrder>, Self::Error> {
        let result = match order {
            OrderRef::FreightOrder(id) => self.fetch_freight_order(id).await?.map(BiddableOrder::Freight),
            OrderRef::MasterOrder(id) => self.fetch_master_order(id).await?.map(BiddableOrder::Master),
            OrderRef::PartialOrder(id) => match self.fetch_partial_order(id).await? {
                Some(lot) => {
                    self.fetch_master_order(lot.master_order_id).await?.map(|master| BiddableOrder::Partial { lot, master })
                },
                None => None,
            },
        };
        Ok(result)
    }
}
