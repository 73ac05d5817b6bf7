use std::time::Duration as StdDuration;

use chrono::{Duration, Utc};
use cucumber::{then, when};
use fae_common::{Fraction, Percentage, Volume, Weight};
use freight_auction_engine::{
    db_types::{BidStatus, MasterOrderStatus, NewFreightOrder, NewPartialOrder, PartialOrderStatus},
    test_utils::fixtures::{bid, freight_order, master_order},
    AuctionError,
    BidManagement,
    OrderManagement,
};
use log::*;

use crate::cucumber::AuctionWorld;

fn error_kind(e: &AuctionError) -> &'static str {
    match e {
        AuctionError::ValidationError(_) => "ValidationError",
        AuctionError::ComplianceViolation(_) => "ComplianceViolation",
        AuctionError::QuotaExceeded { .. } => "QuotaExceeded",
        AuctionError::InsufficientCapacity(_) => "InsufficientCapacity",
        AuctionError::CapacityExceeded(_) => "CapacityExceeded",
        AuctionError::NotFound(_) => "NotFound",
        AuctionError::ExternalServiceError(_) => "ExternalServiceError",
        AuctionError::InvalidStateTransition(_) => "InvalidStateTransition",
        AuctionError::DatabaseError(_) => "DatabaseError",
    }
}

//--------------------------------------       Orders       ----------------------------------------------------------

#[when(expr = "the shipper posts master order {string} of {int} weight and {int} volume due in {int} hours")]
async fn post_master_order(world: &mut AuctionWorld, name: String, weight: i64, volume: i64, hours: i64) {
    let (master, _) =
        world.engine().orders.create_master_order(master_order(weight, volume, hours)).await.expect("master order");
    debug!("🚀️ Posted master order {name} as {}", master.id);
    world.masters.insert(name, master.id);
}

#[when(expr = "the shipper posts master order {string} of {int} weight and {int} volume due in {int} hours with \
                minimum load {word}")]
async fn post_master_order_with_min_load(
    world: &mut AuctionWorld,
    name: String,
    weight: i64,
    volume: i64,
    hours: i64,
    min_load: String,
) {
    let min_load = min_load.parse::<Fraction>().expect("minimum load fraction");
    let order = master_order(weight, volume, hours).with_min_load_fraction(min_load);
    let (master, _) = world.engine().orders.create_master_order(order).await.expect("master order");
    world.masters.insert(name, master.id);
}

#[when(expr = "lot {string} of {int} weight, {int} volume and {int}% is carved from {string}")]
async fn carve_lot(world: &mut AuctionWorld, lot: String, weight: i64, volume: i64, percent: i64, master: String) {
    let request = NewPartialOrder::new(Weight::from(weight), Volume::from(volume), Percentage::from(percent));
    let master_id = world.master(&master);
    let created = world.engine().orders.create_partial_order(master_id, request).await.expect("lot");
    world.lots.insert(lot, created.id);
}

#[when(expr = "lot {string} of {int} weight, {int} volume and {int}% is carved from {string} for carrier {string}")]
async fn carve_lot_for_carrier(
    world: &mut AuctionWorld,
    lot: String,
    weight: i64,
    volume: i64,
    percent: i64,
    master: String,
    carrier: String,
) {
    let request =
        NewPartialOrder::new(Weight::from(weight), Volume::from(volume), Percentage::from(percent)).for_carrier(carrier.into());
    let master_id = world.master(&master);
    let created = world.engine().orders.create_partial_order(master_id, request).await.expect("lot");
    assert_eq!(created.status, PartialOrderStatus::Awarded);
    world.lots.insert(lot, created.id);
}

#[when(expr = "the shipper cancels master order {string}")]
async fn shipper_cancels(world: &mut AuctionWorld, name: String) {
    let master_id = world.master(&name);
    world.engine().orders.cancel_master_order(master_id, "Shipper changed plans").await.expect("cancellation");
}

async fn post_freight(world: &mut AuctionWorld, name: String, order: NewFreightOrder) {
    let order = world.engine().orders.create_freight_order(order).await.expect("freight order");
    world.posted_close.insert(name.clone(), order.required_delivery_date);
    world.freight.insert(name, order.id);
}

#[when(expr = "the shipper posts freight order {string} of {int} weight due in {int} hours")]
async fn post_freight_order(world: &mut AuctionWorld, name: String, weight: i64, hours: i64) {
    post_freight(world, name, freight_order(weight, 10, hours)).await;
}

#[when(expr = "the shipper posts freight order {string} of {int} weight due in {int} minutes")]
async fn post_short_freight_order(world: &mut AuctionWorld, name: String, weight: i64, minutes: i64) {
    let mut order = freight_order(weight, 10, 1);
    order.required_delivery_date = Utc::now() + Duration::minutes(minutes);
    post_freight(world, name, order).await;
}

//--------------------------------------        Bids        ----------------------------------------------------------

#[when(expr = "carrier {string} bids {int} on lot {string}")]
async fn bid_on_lot(world: &mut AuctionWorld, carrier: String, amount: i64, lot: String) {
    let lot_id = world.lot(&lot);
    let result = world.engine().bids.place_bid(bid(carrier.as_str(), lot_id, amount)).await;
    if let Err(e) = &result {
        panic!("{carrier} could not bid on {lot}: {e}");
    }
    world.record_bid(&carrier, &lot, result);
}

#[when(expr = "carrier {string} bids {int} on freight order {string}")]
async fn bid_on_freight(world: &mut AuctionWorld, carrier: String, amount: i64, order: String) {
    let order_id = world.freight_order(&order);
    let result = world.engine().bids.place_bid(bid(carrier.as_str(), order_id, amount)).await;
    world.record_bid(&carrier, &order, result);
}

#[when(expr = "carriers {string} and {string} bid {int} on lots {string} and {string} at the same time")]
async fn concurrent_lot_bids(
    world: &mut AuctionWorld,
    first: String,
    second: String,
    amount: i64,
    first_lot: String,
    second_lot: String,
) {
    let bid_a = bid(first.as_str(), world.lot(&first_lot), amount);
    let bid_b = bid(second.as_str(), world.lot(&second_lot), amount);
    let engine = world.engine();
    let (a, b) = tokio::join!(engine.bids.place_bid(bid_a), engine.bids.place_bid(bid_b));
    world.concurrent_bids = vec![a, b];
}

#[when(expr = "carrier {string} has won freight orders weighing {int}, {int} and {int}")]
async fn carrier_wins_orders(world: &mut AuctionWorld, carrier: String, first: i64, second: i64, third: i64) {
    for (i, weight) in [first, second, third].into_iter().enumerate() {
        let name = format!("won-{i}");
        post_freight(world, name.clone(), freight_order(weight, 10, 48)).await;
        let order_id = world.freight_order(&name);
        let engine = world.engine();
        let admission = engine.bids.place_bid(bid(carrier.as_str(), order_id, 1000)).await.expect("winning bid");
        engine.bids.award_order(order_id.into(), admission.bid.id).await.expect("award");
    }
}

#[when(expr = "the bid by {string} on {string} is scored")]
async fn score_bid(world: &mut AuctionWorld, carrier: String, order: String) {
    let bid_id = *world.bids.get(&AuctionWorld::bid_key(&carrier, &order)).expect("no such bid");
    let breakdown = world.engine().scorer.score_and_save(bid_id).await.expect("score");
    world.last_score = Some(breakdown);
}

#[when("the lifecycle sweep runs")]
async fn run_sweep(world: &mut AuctionWorld) {
    let report = world.engine().lifecycle.sweep(Utc::now()).await;
    assert!(report.ran);
    assert_eq!(report.failures, 0);
}

//--------------------------------------     Assertions     ----------------------------------------------------------

#[then(expr = "master order {string} is {word}")]
async fn master_status(world: &mut AuctionWorld, name: String, status: String) {
    let expected = status.parse::<MasterOrderStatus>().expect("status");
    let progress = world.engine().queries.progress(world.master(&name)).await.expect("progress");
    assert_eq!(progress.status, expected);
}

#[then(expr = "lot {string} is {word}")]
async fn lot_status(world: &mut AuctionWorld, name: String, status: String) {
    let expected = status.parse::<PartialOrderStatus>().expect("status");
    let lot_id = world.lot(&name);
    let lot = world.engine().orders.db().fetch_partial_order(lot_id).await.expect("db").expect("lot");
    assert_eq!(lot.status, expected);
}

#[then(expr = "the bid by {string} on {string} is {word}")]
async fn bid_status(world: &mut AuctionWorld, carrier: String, order: String, status: String) {
    let expected = status.parse::<BidStatus>().expect("status");
    let bid_id = *world.bids.get(&AuctionWorld::bid_key(&carrier, &order)).expect("no such bid");
    let bid = world.engine().orders.db().fetch_bid(bid_id).await.expect("db").expect("bid");
    assert_eq!(bid.status, expected);
}

#[then(expr = "an order.cancelled event is published for {string} with reason {string}")]
async fn cancelled_event(world: &mut AuctionWorld, name: String, reason: String) {
    let master_id = world.master(&name);
    let events = world.events().expect("engine").clone();
    for _ in 0..50 {
        let found = events.cancelled.lock().unwrap().iter().find(|e| e.master_order_id == master_id).cloned();
        if let Some(event) = found {
            assert_eq!(event.reason, reason);
            return;
        }
        tokio::time::sleep(StdDuration::from_millis(20)).await;
    }
    panic!("No order.cancelled event was published for {name}");
}

#[then("the bid is admitted")]
async fn bid_admitted(world: &mut AuctionWorld) {
    match &world.last_bid {
        Some(Ok(_)) => {},
        other => panic!("Expected the bid to be admitted, got {other:?}"),
    }
}

#[then(expr = "the bid is rejected with {word}")]
async fn bid_rejected(world: &mut AuctionWorld, kind: String) {
    match &world.last_bid {
        Some(Err(e)) => assert_eq!(error_kind(e), kind, "unexpected error: {e}"),
        other => panic!("Expected the bid to be rejected, got {other:?}"),
    }
}

#[then(expr = "the reported available capacity is {int}")]
async fn available_capacity(world: &mut AuctionWorld, expected: i64) {
    match &world.last_bid {
        Some(Err(AuctionError::QuotaExceeded { available_capacity, .. })) => {
            assert_eq!(*available_capacity, Weight::from(expected))
        },
        other => panic!("Expected a quota rejection, got {other:?}"),
    }
}

#[then(expr = "freight order {string} closes {int} minutes later than posted")]
async fn close_extended(world: &mut AuctionWorld, name: String, minutes: i64) {
    let posted = *world.posted_close.get(&name).expect("posted close");
    let order_id = world.freight_order(&name);
    let order = world.engine().orders.db().fetch_freight_order(order_id).await.expect("db").expect("order");
    assert_eq!(order.required_delivery_date - posted, Duration::minutes(minutes));
    assert_eq!(order.extension_count, 1);
    match &world.last_bid {
        Some(Ok(admission)) => assert_eq!(admission.extended_until, Some(order.required_delivery_date)),
        other => panic!("Expected an admitted bid, got {other:?}"),
    }
}

#[then(expr = "the price score is {int}")]
async fn price_score(world: &mut AuctionWorld, expected: i64) {
    let score = world.last_score.as_ref().expect("no bid was scored");
    assert!((score.price_score - expected as f64).abs() < 1e-9, "price score was {}", score.price_score);
}

#[then(expr = "the reference price is {int}")]
async fn reference_price(world: &mut AuctionWorld, expected: i64) {
    let score = world.last_score.as_ref().expect("no bid was scored");
    assert_eq!(score.reference_price, expected.into());
}

#[then(expr = "exactly one of the concurrent bids is admitted and the other is rejected with {word}")]
async fn one_concurrent_bid_wins(world: &mut AuctionWorld, kind: String) {
    let admitted = world.concurrent_bids.iter().filter(|r| r.is_ok()).count();
    assert_eq!(admitted, 1, "results: {:?}", world.concurrent_bids);
    let rejected = world.concurrent_bids.iter().find_map(|r| r.as_ref().err()).expect("a rejected bid");
    assert_eq!(error_kind(rejected), kind);
}

#[then(expr = "no more than 100% of {string} is allocated")]
async fn allocation_ceiling(world: &mut AuctionWorld, name: String) {
    let master_id = world.master(&name);
    let lots = world.engine().orders.db().fetch_partial_orders(master_id).await.expect("lots");
    let allocated = lots.iter().filter(|l| l.status.is_allocated()).map(|l| l.percentage).sum::<Percentage>();
    assert!(allocated <= Percentage::hundred(), "{allocated} allocated");
}
