use std::time::Duration;

use fae_common::{Percentage, Volume, Weight};
use freight_auction_engine::{
    db_types::{NewPartialOrder, PartialOrderStatus},
    events::EventProducers,
    test_utils::{
        fixtures::{bid, freight_order, master_order, TestEngine},
        mocks::MockComplianceOracle,
    },
    AuctionError,
    EngineConfig,
    MemoryDatabase,
    OrderManagement,
};
use futures_util::future::join_all;
use log::*;
use tokio::runtime::Runtime;

const NUM_LOTS: i64 = 8;
const NUM_CARRIERS: i64 = 16;

fn slow_engine() -> TestEngine<MemoryDatabase> {
    let oracle = MockComplianceOracle::default().with_delay(Duration::from_millis(10));
    TestEngine::new(MemoryDatabase::new(), EngineConfig::default(), oracle, EventProducers::default())
}

#[test]
fn burst_of_lot_bids_never_over_commits() {
    let _ = env_logger::try_init();
    info!("🚀️ Starting lot bid burst test");
    let sys = Runtime::new().unwrap();
    sys.block_on(async move {
        let engine = slow_engine();
        let (master, _) = engine.orders.create_master_order(master_order(1000, 100, 48)).await.unwrap();
        let mut lots = Vec::new();
        for _ in 0..NUM_LOTS {
            let request = NewPartialOrder::new(Weight::from(100), Volume::from(10), Percentage::from(20));
            lots.push(engine.orders.create_partial_order(master.id, request).await.unwrap());
        }

        info!("🚀️ Firing {NUM_CARRIERS} bids at {NUM_LOTS} lots");
        let bids = (0..NUM_CARRIERS)
            .map(|i| {
                let lot = &lots[(i % NUM_LOTS) as usize];
                engine.bids.place_bid(bid(format!("carrier-{i}"), lot.id, 1000))
            })
            .collect::<Vec<_>>();
        let results = join_all(bids).await;

        for result in results.iter().filter_map(|r| r.as_ref().err()) {
            assert!(matches!(result, AuctionError::ComplianceViolation(_)), "unexpected rejection: {result}");
        }
        let stored = engine.db.fetch_partial_orders(master.id).await.unwrap();
        let bidding = stored.iter().filter(|l| l.status == PartialOrderStatus::Bidding).count();
        let allocated = stored.iter().filter(|l| l.status.is_allocated()).map(|l| l.percentage).sum::<Percentage>();
        assert_eq!(bidding, 5);
        assert_eq!(allocated, Percentage::hundred());

        let master = engine.db.fetch_master_order(master.id).await.unwrap().unwrap();
        let carved = stored.iter().map(|l| l.weight).sum::<Weight>();
        assert_eq!(master.remaining_weight + carved, master.total_weight);
        assert!(!master.remaining_weight.is_negative());
    });
    info!("🚀️ test complete");
}

#[test]
fn burst_of_bids_from_one_carrier_respects_quota() {
    let _ = env_logger::try_init();
    let sys = Runtime::new().unwrap();
    sys.block_on(async move {
        let engine = slow_engine();
        let mut orders = Vec::new();
        for _ in 0..5 {
            orders.push(engine.orders.create_freight_order(freight_order(60, 10, 48)).await.unwrap());
        }
        let bids = orders.iter().map(|o| engine.bids.place_bid(bid("greedy", o.id, 900))).collect::<Vec<_>>();
        let results = join_all(bids).await;

        let admitted = results.iter().filter(|r| r.is_ok()).count();
        assert_eq!(admitted, 3);
        for rejected in results.iter().filter_map(|r| r.as_ref().err()) {
            match rejected {
                AuctionError::QuotaExceeded { available_capacity, .. } => {
                    assert_eq!(*available_capacity, Weight::from(-40))
                },
                e => panic!("Expected a quota rejection, got {e}"),
            }
        }
        assert_eq!(engine.oracle.calls(), 5);
    });
}
