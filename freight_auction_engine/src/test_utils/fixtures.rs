//! A fully wired engine and builders for the orders and bids tests need most.
use chrono::{Duration, Utc};
use fae_common::{Money, Volume, Weight};

use crate::{
    config::EngineConfig,
    db::memory::MemoryDatabase,
    db_types::{CarrierId, NewBid, NewFreightOrder, NewMasterOrder, OrderRef},
    events::EventProducers,
    fae_api::{
        bid_flow_api::BidFlowApi,
        lifecycle_api::LifecycleApi,
        match_scorer::MatchScorer,
        oracles::MedianPriceOracle,
        order_flow_api::OrderFlowApi,
        order_locks::OrderLocks,
        query_api::AuctionQueryApi,
        token_store::TrustTokenStore,
    },
    test_utils::mocks::MockComplianceOracle,
};

pub const DEFAULT_MAX_BID: i64 = 1500;

/// Every engine API over one database, sharing one lock map and one token store.
pub struct TestEngine<B> {
    pub db: B,
    pub config: EngineConfig,
    pub oracle: MockComplianceOracle,
    pub locks: OrderLocks,
    pub tokens: TrustTokenStore,
    pub orders: OrderFlowApi<B>,
    pub bids: BidFlowApi<B, MockComplianceOracle>,
    pub lifecycle: LifecycleApi<B>,
    pub queries: AuctionQueryApi<B>,
    pub scorer: MatchScorer<B, MedianPriceOracle<B>>,
}

impl<B: Clone> TestEngine<B> {
    pub fn new(db: B, config: EngineConfig, oracle: MockComplianceOracle, producers: EventProducers) -> Self {
        let locks = OrderLocks::new();
        let tokens = TrustTokenStore::new(config.token_lifetime);
        let orders = OrderFlowApi::new(db.clone(), producers.clone(), locks.clone(), config.decomposition.clone());
        let bids = BidFlowApi::new(db.clone(), producers, locks.clone(), oracle.clone(), tokens.clone(), &config);
        let lifecycle = LifecycleApi::new(orders.clone(), tokens.clone(), config.lifecycle.clone());
        let queries = AuctionQueryApi::new(db.clone());
        let scorer = MatchScorer::new(db.clone(), MedianPriceOracle::new(db.clone()), config.scoring);
        Self { db, config, oracle, locks, tokens, orders, bids, lifecycle, queries, scorer }
    }
}

impl TestEngine<MemoryDatabase> {
    pub fn in_memory() -> Self {
        Self::new(MemoryDatabase::new(), EngineConfig::default(), MockComplianceOracle::default(), EventProducers::default())
    }
}

/// A master order worth up to [`DEFAULT_MAX_BID`], due `hours` from now. It is not split into lots.
pub fn master_order(total_weight: i64, total_volume: i64, hours: i64) -> NewMasterOrder {
    NewMasterOrder::new(
        "shipper".into(),
        Weight::from(total_weight),
        Volume::from(total_volume),
        Utc::now() + Duration::hours(hours),
        Money::from(DEFAULT_MAX_BID),
    )
}

pub fn freight_order(weight: i64, volume: i64, hours: i64) -> NewFreightOrder {
    NewFreightOrder::new(
        "shipper".into(),
        Weight::from(weight),
        Volume::from(volume),
        Utc::now() + Duration::hours(hours),
        Money::from(DEFAULT_MAX_BID),
    )
}

/// A bid promising delivery one minute from now, which is before any fixture order's delivery date.
pub fn bid<C: Into<CarrierId>, O: Into<OrderRef>>(carrier: C, order: O, amount: i64) -> NewBid {
    NewBid::new(carrier.into(), order.into(), Money::from(amount), Utc::now() + Duration::minutes(1))
}
