//! #  Database management and control.
//!
//! This module provides the interfaces that define the contracts of the freight auction engine's database
//! *backends*.
//!
//! * [`DatabaseBackend`] carries the backend's error type and connection housekeeping.
//! * [`AuctionDatabase`] defines the highest level of behaviour: creating orders and applying engine-computed
//!   [`ChangeSet`]s atomically.
//! * [`OrderManagement`] defines the behaviour for querying master orders, lots and freight orders.
//! * [`BidManagement`] defines the behaviour for querying bids, compliance snapshots and writing match scores.
//! * [`CarrierManagement`] stores carrier delivery history and positions.
mod auction_database;
mod bid_management;
mod carrier_management;
mod data_objects;
mod order_management;

pub use auction_database::{AuctionDatabase, DatabaseBackend};
pub use bid_management::BidManagement;
pub use carrier_management::CarrierManagement;
pub use data_objects::{
    AppliedChanges,
    BidStatusUpdate,
    CarrierStatsDelta,
    ChangeSet,
    FreightOrderUpdate,
    LotUpdate,
    MasterOrderUpdate,
    NewBidRecord,
    NewComplianceRecord,
    NewLotRecord,
};
pub use order_management::OrderManagement;
