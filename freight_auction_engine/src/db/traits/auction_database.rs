use crate::{
    db::traits::{AppliedChanges, BidManagement, CarrierManagement, ChangeSet, NewLotRecord, OrderManagement},
    db_types::{FreightOrder, MasterOrder, NewFreightOrder, NewMasterOrder, PartialOrder},
};

/// Connection-level behaviour shared by every backend trait. All the query traits use this trait's error type.
#[allow(async_fn_in_trait)]
pub trait DatabaseBackend: Clone + Send + Sync + 'static {
    type Error: std::error::Error + Send + Sync + 'static;

    /// The URL of the database
    fn url(&self) -> &str;

    /// Closes the database connection.
    async fn close(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }
}

/// This trait defines the highest level of behaviour for backends supporting the freight auction engine.
///
/// Every write goes through one of the methods below, and each of them is atomic. The engine serialises writers per
/// order before computing a [`ChangeSet`], so backends need not re-check business rules; they must only guarantee
/// that a change set is applied completely or not at all.
#[allow(async_fn_in_trait)]
pub trait AuctionDatabase: OrderManagement + BidManagement + CarrierManagement {
    /// Stores a new master order together with the lots it was split into at creation time. The remaining capacity
    /// is set to the total less the weight and volume of the supplied lots.
    async fn insert_master_order(
        &self,
        order: NewMasterOrder,
        lots: Vec<NewLotRecord>,
    ) -> Result<(MasterOrder, Vec<PartialOrder>), Self::Error>;

    async fn insert_freight_order(&self, order: NewFreightOrder) -> Result<FreightOrder, Self::Error>;

    /// Applies every change in the set in a single transaction.
    ///
    /// Close-time updates never move a close marker backwards. If any referenced record does not exist, nothing is
    /// changed and an error is returned.
    async fn apply_changes(&self, changes: ChangeSet) -> Result<AppliedChanges, Self::Error>;
}
