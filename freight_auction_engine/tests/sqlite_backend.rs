use chrono::Utc;
use fae_common::{Fraction, Weight};
use freight_auction_engine::{
    db_types::{
        BidStatus,
        CarrierProfile,
        GeoPoint,
        MasterOrderStatus,
        OrderRef,
        PartialOrderStatus,
    },
    events::EventProducers,
    order_objects::AutoCheckOutcome,
    test_utils::{
        fixtures::{bid, freight_order, master_order, TestEngine},
        mocks::MockComplianceOracle,
        prepare_env::{prepare_test_env, random_db_path},
    },
    AuctionError,
    BidManagement,
    CarrierManagement,
    DatabaseBackend,
    EngineConfig,
    OrderManagement,
    SqliteDatabase,
    LOW_FILL_RATE_REASON,
};
use log::*;
use sqlx::{migrate::MigrateDatabase, Sqlite};
use tokio::runtime::Runtime;

async fn setup() -> TestEngine<SqliteDatabase> {
    let url = random_db_path();
    prepare_test_env(&url).await;
    let db = SqliteDatabase::new_with_url(&url, 5).await.expect("Error creating database");
    TestEngine::new(db, EngineConfig::default(), MockComplianceOracle::default(), EventProducers::default())
}

async fn tear_down(engine: TestEngine<SqliteDatabase>) {
    let mut db = engine.db.clone();
    let url = db.url().to_string();
    drop(engine);
    if let Err(e) = db.close().await {
        error!("🚀️ Failed to close database: {e}");
    }
    Sqlite::drop_database(&url).await.unwrap();
}

#[test]
fn ltl_lot_award_is_persisted() {
    let rt = Runtime::new().unwrap();
    rt.block_on(async {
        let engine = setup().await;
        let (master, lots) =
            engine.orders.create_master_order(master_order(1000, 100, 48).with_ltl(None)).await.unwrap();
        assert_eq!(lots.len(), 5);
        assert_eq!(master.remaining_weight, Weight::ZERO);

        let lot = &lots[0];
        let admission = engine.bids.place_bid(bid("acme", lot.id, 800)).await.unwrap();
        assert_eq!(admission.bid.weight, lot.weight);
        let lot_now = engine.db.fetch_partial_order(lot.id).await.unwrap().unwrap();
        assert_eq!(lot_now.status, PartialOrderStatus::Bidding);

        let outcome = engine.bids.award_order(OrderRef::PartialOrder(lot.id), admission.bid.id).await.unwrap();
        assert_eq!(outcome.winning_bid.status, BidStatus::Accepted);
        let lot_now = engine.db.fetch_partial_order(lot.id).await.unwrap().unwrap();
        assert_eq!(lot_now.status, PartialOrderStatus::Awarded);
        assert_eq!(lot_now.assigned_carrier_id, Some("acme".into()));
        assert_eq!(lot_now.assigned_bid_id, Some(admission.bid.id));

        let progress = engine.queries.progress(master.id).await.unwrap();
        assert_eq!(progress.status, MasterOrderStatus::PartiallyFilled);
        assert_eq!(progress.committed.lots, 1);
        assert_eq!(progress.open.lots, 4);
        assert_eq!(progress.fill_fraction, "0.2".parse::<Fraction>().unwrap());

        let profile = engine.db.fetch_carrier_profile(&"acme".into()).await.unwrap().unwrap();
        assert_eq!(profile.total_orders, 1);
        assert_eq!(profile.completed_orders, 0);
        tear_down(engine).await;
    });
}

#[test]
fn scores_are_stored_and_ranked() {
    let rt = Runtime::new().unwrap();
    rt.block_on(async {
        let engine = setup().await;
        let pickup = GeoPoint::new(52.37, 4.90);
        let order = engine.orders.create_freight_order(freight_order(40, 10, 48).with_pickup(pickup)).await.unwrap();
        engine
            .db
            .upsert_carrier_profile(CarrierProfile::new("local".into()).with_history(10, 10).with_position(pickup))
            .await
            .unwrap();
        let local = engine.bids.place_bid(bid("local", order.id, 1000)).await.unwrap();
        let remote = engine.bids.place_bid(bid("remote", order.id, 1050)).await.unwrap();

        let local_score = engine.scorer.score_and_save(local.bid.id).await.unwrap();
        let remote_score = engine.scorer.score_and_save(remote.bid.id).await.unwrap();
        assert!(local_score.total_score > remote_score.total_score);
        assert_eq!(local_score.geo_score, 100.0);

        let stored = engine.db.fetch_bid(local.bid.id).await.unwrap().unwrap();
        assert_eq!(stored.match_score, Some(local_score.total_score));
        assert_eq!(stored.score_breakdown, Some(local_score.clone()));

        let view = engine.queries.order_with_bids(order.id.into()).await.unwrap();
        let ranked = view.bids.iter().map(|b| b.id).collect::<Vec<_>>();
        assert_eq!(ranked, vec![local.bid.id, remote.bid.id]);
        tear_down(engine).await;
    });
}

#[test]
fn under_filled_order_is_cancelled_by_the_auto_check() {
    let rt = Runtime::new().unwrap();
    rt.block_on(async {
        let engine = setup().await;
        let (master, lots) =
            engine.orders.create_master_order(master_order(1000, 100, 25).with_ltl(None)).await.unwrap();
        let admission = engine.bids.place_bid(bid("early", lots[0].id, 700)).await.unwrap();

        let outcome = engine.lifecycle.perform_auto_check(master.id, Utc::now()).await.unwrap();
        match outcome {
            AutoCheckOutcome::CancelledMaster { reason, cancelled_lots } => {
                assert_eq!(reason, LOW_FILL_RATE_REASON);
                assert_eq!(cancelled_lots, lots[1..].iter().map(|l| l.id).collect::<Vec<_>>());
            },
            other => panic!("Expected the order to be cancelled, got {other:?}"),
        }
        let master = engine.db.fetch_master_order(master.id).await.unwrap().unwrap();
        assert_eq!(master.status, MasterOrderStatus::Cancelled);
        // The lot under auction keeps its status, but its bid can no longer win
        let bidding = engine.db.fetch_partial_order(lots[0].id).await.unwrap().unwrap();
        assert_eq!(bidding.status, PartialOrderStatus::Bidding);
        let bid = engine.db.fetch_bid(admission.bid.id).await.unwrap().unwrap();
        assert_eq!(bid.status, BidStatus::Rejected);

        let again = engine.lifecycle.perform_auto_check(master.id, Utc::now()).await.unwrap();
        assert_eq!(again, AutoCheckOutcome::NoAction);
        tear_down(engine).await;
    });
}

#[test]
fn auctions_cannot_close_early_but_can_be_awarded() {
    let rt = Runtime::new().unwrap();
    rt.block_on(async {
        let engine = setup().await;
        let order = engine.orders.create_freight_order(freight_order(40, 10, 48)).await.unwrap();
        let cheap = engine.bids.place_bid(bid("cheap", order.id, 900)).await.unwrap();
        let dear = engine.bids.place_bid(bid("dear", order.id, 1300)).await.unwrap();
        engine.scorer.score_and_save(cheap.bid.id).await.unwrap();
        engine.scorer.score_and_save(dear.bid.id).await.unwrap();

        let err = engine.bids.close_auction(order.id.into()).await.unwrap_err();
        assert!(matches!(err, AuctionError::ValidationError(_)), "unexpected error: {err}");

        let outcome = engine.bids.award_order(order.id.into(), cheap.bid.id).await.unwrap();
        assert_eq!(outcome.rejected_bids, vec![dear.bid.id]);
        let order = engine.db.fetch_freight_order(order.id).await.unwrap().unwrap();
        assert_eq!(order.awarded_bid_id, Some(cheap.bid.id));
        let total = engine.db.fetch_bids_for_order(order.id.into()).await.unwrap();
        assert_eq!(total.iter().filter(|b| b.status == BidStatus::Rejected).count(), 1);
        tear_down(engine).await;
    });
}
