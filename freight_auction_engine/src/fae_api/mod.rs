//! # Freight auction engine public API
//!
//! The `fae_api` module exposes the programmatic API of the allocation engine. Like the database layer, it is modular:
//! every API is created from a database backend implementing the traits it needs, plus the shared pieces it
//! coordinates with.
//!
//! * [`order_flow_api`] creates freight and master orders, carves lots and drives the lot lifecycle.
//! * [`bid_flow_api`] admits bids through the compliance, quota and fairness checks, and awards auctions.
//! * [`match_scorer`] computes the weighted match score of a bid. It runs asynchronously after admission.
//! * [`lifecycle_api`] is the periodic sweep: under-fill warnings, deadline cancellations and completion roll-up.
//! * [`query_api`] holds the read-side views.
//!
//! The remaining submodules are the building blocks these APIs share.
//!
//! # API usage
//!
//! Every API that mutates orders must share one [`OrderLocks`](order_locks::OrderLocks) map, so that writers to the
//! same master order are serialised:
//!
//! ```rust,ignore
//! use freight_auction_engine::{BidFlowApi, EngineConfig, MemoryDatabase, OrderFlowApi, OrderLocks, TrustTokenStore};
//! let db = MemoryDatabase::new();
//! let config = EngineConfig::default();
//! let locks = OrderLocks::new();
//! let orders = OrderFlowApi::new(db.clone(), producers.clone(), locks.clone(), config.decomposition.clone());
//! let bids = BidFlowApi::new(db, producers, locks, oracle, TrustTokenStore::default(), &config);
//! let (master, lots) = orders.create_master_order(new_order).await?;
//! let admission = bids.place_bid(NewBid::new(carrier, lots[0].id.into(), amount, date)).await?;
//! ```

pub mod auction_guard;
pub mod bid_flow_api;
pub mod capacity_ledger;
pub mod errors;
pub mod lifecycle_api;
pub mod match_scorer;
pub mod oracles;
pub mod order_decomposer;
pub mod order_flow_api;
pub mod order_locks;
pub mod order_objects;
pub mod query_api;
pub mod quota_guard;
pub mod token_store;
