use std::{
    collections::HashMap,
    fmt::Debug,
    future::Future,
    pin::Pin,
    sync::{Arc, Mutex},
};

use chrono::{DateTime, Utc};
use cucumber::World;
use freight_auction_engine::{
    db_types::{BidId, FreightOrderId, MasterOrderId, PartialOrderId, ScoreBreakdown},
    events::{EventHandlers, EventHooks, OrderCancelledEvent, OrderStatusChangedEvent, QuotaEvent, ScoringRequestedEvent},
    order_objects::BidAdmission,
    test_utils::{fixtures::TestEngine, mocks::MockComplianceOracle},
    AuctionError,
    EngineConfig,
    MemoryDatabase,
};
use log::*;
use tokio::task::JoinHandle;

#[derive(Default, Debug, World)]
pub struct AuctionWorld {
    pub system: Option<AuctionSystem>,
    pub masters: HashMap<String, MasterOrderId>,
    pub lots: HashMap<String, PartialOrderId>,
    pub freight: HashMap<String, FreightOrderId>,
    /// The close time each freight order was posted with.
    pub posted_close: HashMap<String, DateTime<Utc>>,
    /// Admitted bids, keyed by `carrier@order`.
    pub bids: HashMap<String, BidId>,
    pub last_bid: Option<Result<BidAdmission, AuctionError>>,
    pub concurrent_bids: Vec<Result<BidAdmission, AuctionError>>,
    pub last_score: Option<ScoreBreakdown>,
}

impl AuctionWorld {
    pub fn engine(&self) -> &TestEngine<MemoryDatabase> {
        &self.system.as_ref().expect("Engine not initialised").engine
    }

    pub fn events(&self) -> Option<&RecordedEvents> {
        self.system.as_ref().map(|s| &s.events)
    }

    pub fn master(&self, name: &str) -> MasterOrderId {
        *self.masters.get(name).unwrap_or_else(|| panic!("Unknown master order {name}"))
    }

    pub fn lot(&self, name: &str) -> PartialOrderId {
        *self.lots.get(name).unwrap_or_else(|| panic!("Unknown lot {name}"))
    }

    pub fn freight_order(&self, name: &str) -> FreightOrderId {
        *self.freight.get(name).unwrap_or_else(|| panic!("Unknown freight order {name}"))
    }

    pub fn bid_key(carrier: &str, order: &str) -> String {
        format!("{carrier}@{order}")
    }

    pub fn record_bid(&mut self, carrier: &str, order: &str, result: Result<BidAdmission, AuctionError>) {
        if let Ok(admission) = &result {
            self.bids.insert(Self::bid_key(carrier, order), admission.bid.id);
        }
        self.last_bid = Some(result);
    }

    /// Drops the engine so the event handlers wind down, then waits for them.
    pub async fn shutdown(&mut self) {
        if let Some(system) = self.system.take() {
            let AuctionSystem { engine, handlers, .. } = system;
            drop(engine);
            for handle in handlers {
                if let Err(e) = handle.await {
                    warn!("🚀️ Event handler did not shut down cleanly: {e}");
                }
            }
        }
    }
}

/// Events the scenarios make assertions about.
#[derive(Debug, Clone, Default)]
pub struct RecordedEvents {
    pub cancelled: Arc<Mutex<Vec<OrderCancelledEvent>>>,
    pub status_changes: Arc<Mutex<Vec<OrderStatusChangedEvent>>>,
    pub scoring_requests: Arc<Mutex<Vec<ScoringRequestedEvent>>>,
    pub quota: Arc<Mutex<Vec<QuotaEvent>>>,
}

impl RecordedEvents {
    fn hooks(&self) -> EventHooks {
        let mut hooks = EventHooks::default();
        let cancelled = Arc::clone(&self.cancelled);
        hooks.on_order_cancelled(move |ev| {
            let cancelled = Arc::clone(&cancelled);
            Box::pin(async move { cancelled.lock().unwrap().push(ev) }) as Pin<Box<dyn Future<Output = ()> + Send>>
        });
        let changes = Arc::clone(&self.status_changes);
        hooks.on_order_status_changed(move |ev| {
            let changes = Arc::clone(&changes);
            Box::pin(async move { changes.lock().unwrap().push(ev) }) as Pin<Box<dyn Future<Output = ()> + Send>>
        });
        let scoring = Arc::clone(&self.scoring_requests);
        hooks.on_scoring_requested(move |ev| {
            let scoring = Arc::clone(&scoring);
            Box::pin(async move { scoring.lock().unwrap().push(ev) }) as Pin<Box<dyn Future<Output = ()> + Send>>
        });
        let quota = Arc::clone(&self.quota);
        hooks.on_quota_changed(move |ev| {
            let quota = Arc::clone(&quota);
            Box::pin(async move { quota.lock().unwrap().push(ev) }) as Pin<Box<dyn Future<Output = ()> + Send>>
        });
        hooks
    }
}

pub struct AuctionSystem {
    pub engine: TestEngine<MemoryDatabase>,
    pub events: RecordedEvents,
    handlers: Vec<JoinHandle<()>>,
}

impl Debug for AuctionSystem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "AuctionSystem")
    }
}

impl AuctionSystem {
    pub fn new() -> Self {
        let events = RecordedEvents::default();
        let handlers = EventHandlers::new(64, events.hooks());
        let producers = handlers.producers();
        let handlers = handlers.start_handlers();
        let engine =
            TestEngine::new(MemoryDatabase::new(), EngineConfig::default(), MockComplianceOracle::default(), producers);
        debug!("🚀️ Created a fresh in-memory engine");
        Self { engine, events, handlers }
    }
}
