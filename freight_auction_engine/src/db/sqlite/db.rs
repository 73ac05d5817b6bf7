//! `SqliteDatabase` is a concrete implementation of a freight auction engine backend.
//!
//! Unsurprisingly, it uses SQLite as the backend and implements all the traits defined in the [`traits`] module.
//!
//! [`traits`]: crate::db::traits
use std::fmt::Debug;

use fae_common::{Money, Volume, Weight};
use log::*;
use sqlx::SqlitePool;

use super::{bids, carriers, db_url, new_pool, orders, SqliteDatabaseError};
use crate::{
    db::traits::{
        AppliedChanges,
        AuctionDatabase,
        BidManagement,
        CarrierManagement,
        ChangeSet,
        DatabaseBackend,
        NewLotRecord,
        OrderManagement,
    },
    db_types::{
        Bid,
        BidId,
        BidStatus,
        CargoCategory,
        CarrierId,
        CarrierProfile,
        ComplianceSnapshot,
        FreightOrder,
        FreightOrderId,
        MasterOrder,
        MasterOrderId,
        MasterOrderStatus,
        NewFreightOrder,
        NewMasterOrder,
        OrderKind,
        OrderRef,
        PartialOrder,
        PartialOrderId,
        ScoreBreakdown,
    },
};

#[derive(Clone)]
pub struct SqliteDatabase {
    url: String,
    pool: SqlitePool,
}

impl Debug for SqliteDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "SqliteDatabase ({:?})", self.pool)
    }
}

impl SqliteDatabase {
    /// Creates a new database API object, using the URL in `FAE_DATABASE_URL`.
    pub async fn new(max_connections: u32) -> Result<Self, SqliteDatabaseError> {
        let url = db_url();
        SqliteDatabase::new_with_url(url.as_str(), max_connections).await
    }

    pub async fn new_with_url(url: &str, max_connections: u32) -> Result<Self, SqliteDatabaseError> {
        trace!("🗃️ Creating new database connection pool with url {url}");
        let pool = new_pool(url, max_connections).await?;
        let url = url.to_string();
        Ok(Self { url, pool })
    }

    /// Brings the schema up to date. Safe to call on every start-up.
    pub async fn run_migrations(&self) -> Result<(), SqliteDatabaseError> {
        sqlx::migrate!("./src/db/sqlite/migrations").run(&self.pool).await?;
        info!("🗃️ Database migrations complete");
        Ok(())
    }

    /// Returns a reference to the database connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

impl DatabaseBackend for SqliteDatabase {
    type Error = SqliteDatabaseError;

    fn url(&self) -> &str {
        self.url.as_str()
    }

    async fn close(&mut self) -> Result<(), Self::Error> {
        self.pool.close().await;
        Ok(())
    }
}

impl OrderManagement for SqliteDatabase {
    async fn fetch_master_order(&self, id: MasterOrderId) -> Result<Option<MasterOrder>, Self::Error> {
        let mut conn = self.pool.acquire().await?;
        orders::fetch_master_order(id, &mut conn).await
    }

    async fn fetch_master_orders(&self, statuses: &[MasterOrderStatus]) -> Result<Vec<MasterOrder>, Self::Error> {
        let mut conn = self.pool.acquire().await?;
        orders::fetch_master_orders(statuses, &mut conn).await
    }

    async fn fetch_partial_order(&self, id: PartialOrderId) -> Result<Option<PartialOrder>, Self::Error> {
        let mut conn = self.pool.acquire().await?;
        orders::fetch_lot(id, &mut conn).await
    }

    async fn fetch_partial_orders(&self, master_id: MasterOrderId) -> Result<Vec<PartialOrder>, Self::Error> {
        let mut conn = self.pool.acquire().await?;
        orders::fetch_lots_for_master(master_id, &mut conn).await
    }

    async fn fetch_freight_order(&self, id: FreightOrderId) -> Result<Option<FreightOrder>, Self::Error> {
        let mut conn = self.pool.acquire().await?;
        orders::fetch_freight_order(id, &mut conn).await
    }
}

impl BidManagement for SqliteDatabase {
    async fn fetch_bid(&self, id: BidId) -> Result<Option<Bid>, Self::Error> {
        let mut conn = self.pool.acquire().await?;
        bids::fetch_bid(id, &mut conn).await
    }

    async fn fetch_bids_for_order(&self, order: OrderRef) -> Result<Vec<Bid>, Self::Error> {
        let mut conn = self.pool.acquire().await?;
        bids::fetch_bids_for_order(order, &mut conn).await
    }

    async fn fetch_bids_for_carrier(
        &self,
        carrier_id: &CarrierId,
        statuses: &[BidStatus],
    ) -> Result<Vec<Bid>, Self::Error> {
        let mut conn = self.pool.acquire().await?;
        bids::fetch_bids_for_carrier(carrier_id, statuses, &mut conn).await
    }

    async fn fetch_comparable_bid_amounts(
        &self,
        kind: OrderKind,
        category: CargoCategory,
        exclude: BidId,
    ) -> Result<Vec<Money>, Self::Error> {
        let mut conn = self.pool.acquire().await?;
        bids::fetch_comparable_bid_amounts(kind, category, exclude, &mut conn).await
    }

    async fn fetch_compliance_snapshot(&self, bid_id: BidId) -> Result<Option<ComplianceSnapshot>, Self::Error> {
        let mut conn = self.pool.acquire().await?;
        bids::fetch_compliance_snapshot(bid_id, &mut conn).await
    }

    async fn save_score(&self, bid_id: BidId, breakdown: &ScoreBreakdown) -> Result<(), Self::Error> {
        let mut conn = self.pool.acquire().await?;
        bids::save_score(bid_id, breakdown, &mut conn).await
    }
}

impl CarrierManagement for SqliteDatabase {
    async fn fetch_carrier_profile(&self, carrier_id: &CarrierId) -> Result<Option<CarrierProfile>, Self::Error> {
        let mut conn = self.pool.acquire().await?;
        carriers::fetch_carrier_profile(carrier_id, &mut conn).await
    }

    async fn upsert_carrier_profile(&self, profile: CarrierProfile) -> Result<(), Self::Error> {
        let mut conn = self.pool.acquire().await?;
        carriers::upsert_carrier_profile(&profile, &mut conn).await
    }
}

impl AuctionDatabase for SqliteDatabase {
    /// Stores the master order and its initial lots in a single transaction.
    async fn insert_master_order(
        &self,
        order: NewMasterOrder,
        lots: Vec<NewLotRecord>,
    ) -> Result<(MasterOrder, Vec<PartialOrder>), Self::Error> {
        let allocated_weight: Weight = lots.iter().map(|l| l.weight).sum();
        let allocated_volume: Volume = lots.iter().map(|l| l.volume).sum();
        let remaining_weight = order.total_weight - allocated_weight;
        let remaining_volume = order.total_volume - allocated_volume;
        let mut tx = self.pool.begin().await?;
        let master = orders::insert_master_order(&order, remaining_weight, remaining_volume, &mut tx).await?;
        let mut saved = Vec::with_capacity(lots.len());
        for mut record in lots {
            record.master_order_id = master.id;
            saved.push(orders::insert_lot(&record, &mut tx).await?);
        }
        tx.commit().await?;
        debug!("🗃️ Master order {} stored with {} lots", master.id, saved.len());
        Ok((master, saved))
    }

    async fn insert_freight_order(&self, order: NewFreightOrder) -> Result<FreightOrder, Self::Error> {
        let mut conn = self.pool.acquire().await?;
        orders::insert_freight_order(&order, &mut conn).await
    }

    /// Applies the change set in one transaction. An error from any statement drops the transaction, which rolls
    /// every earlier statement back.
    async fn apply_changes(&self, changes: ChangeSet) -> Result<AppliedChanges, Self::Error> {
        let mut tx = self.pool.begin().await?;
        let mut result = AppliedChanges::default();
        for update in &changes.master_updates {
            orders::update_master_order(update, &mut tx).await?;
        }
        for update in &changes.freight_updates {
            orders::update_freight_order(update, &mut tx).await?;
        }
        for record in &changes.new_lots {
            result.lots.push(orders::insert_lot(record, &mut tx).await?);
        }
        for update in &changes.lot_updates {
            orders::update_lot(update, &mut tx).await?;
        }
        if let Some(record) = &changes.new_bid {
            result.bid = Some(bids::insert_bid(record, &mut tx).await?);
        }
        for update in &changes.bid_updates {
            bids::update_bid_status(update.id, update.status, &mut tx).await?;
        }
        for delta in &changes.carrier_stats {
            carriers::apply_stats_delta(delta, &mut tx).await?;
        }
        tx.commit().await?;
        trace!("🗃️ Change set committed");
        Ok(result)
    }
}
