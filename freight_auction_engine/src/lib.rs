//! Freight Auction Engine
//!
//! The freight auction engine allocates freight capacity to carriers. Shippers post loads, carriers bid on them, and
//! the engine awards every piece of capacity exactly once.
//!
//! The library is divided into two main sections:
//! 1. Database management and control ([`mod@db`]). An in-memory backend and a SQLite backend are provided. Engine
//!    code never talks to a backend directly; it computes a [`ChangeSet`] under the relevant order lock and hands it to
//!    the backend to apply atomically. The data types stored by the backends are defined in [`db_types`].
//! 2. The public API ([`mod@fae_api`]). Master orders are split into less-than-truckload lots, every bid is gated by
//!    the compliance oracle, the carrier's quota and the auction fairness rules, and a periodic sweep cancels
//!    under-filled orders and rolls finished ones up to completion.
//!
//! The engine publishes events (bid placed, scoring requested, status changes, quota burns and releases, ...) through
//! a simple hook framework in [`events`], so that a host process can forward them to a message bus or score bids
//! asynchronously.
mod db;

pub mod config;
pub mod db_types;
pub mod events;
pub mod helpers;
mod fae_api;

#[cfg(any(feature = "test_utils", test))]
pub mod test_utils;

pub use config::{AuctionPolicy, DecompositionPolicy, EngineConfig, LifecyclePolicy, QuotaPolicy, ScoringWeights};
pub use db::memory::{MemoryDatabase, MemoryDatabaseError};
#[cfg(feature = "sqlite")]
pub use db::sqlite::{SqliteDatabase, SqliteDatabaseError};
pub use db::traits::{
    AppliedChanges,
    AuctionDatabase,
    BidManagement,
    BidStatusUpdate,
    CarrierManagement,
    CarrierStatsDelta,
    ChangeSet,
    DatabaseBackend,
    FreightOrderUpdate,
    LotUpdate,
    MasterOrderUpdate,
    NewBidRecord,
    NewComplianceRecord,
    NewLotRecord,
    OrderManagement,
};
pub use fae_api::{
    auction_guard::{AuctionGuard, SnipingDecision},
    bid_flow_api::{best_pending_bid, BidFlowApi},
    capacity_ledger::CapacityLedger,
    errors::AuctionError,
    lifecycle_api::{LifecycleApi, LOW_FILL_RATE_REASON},
    match_scorer,
    match_scorer::MatchScorer,
    oracles::{
        ComplianceOracle,
        ComplianceRequest,
        ComplianceVerdict,
        MarketAssessment,
        MarketPriceOracle,
        MedianPriceOracle,
        NoMarketData,
        OracleError,
    },
    order_decomposer,
    order_flow_api::{CancelScope, OrderFlowApi},
    order_locks::{LockKey, OrderLocks},
    order_objects,
    query_api::AuctionQueryApi,
    quota_guard::{QuotaGuard, QuotaVerdict},
    token_store::{TokenGrant, TokenValidity, TrustToken, TrustTokenStore},
};
