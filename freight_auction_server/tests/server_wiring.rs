use std::{path::PathBuf, time::Duration};

use actix_web::{dev::ServerHandle, test, web, App, HttpResponse, HttpServer};
use chrono::Utc;
use freight_auction_engine::{
    events::EventProducers,
    order_objects::SweepReport,
    test_utils::fixtures::{bid, freight_order, master_order},
    AuctionError,
    AuctionQueryApi,
    BidManagement,
    EngineConfig,
    MatchScorer,
    MedianPriceOracle,
    SqliteDatabase,
};
use freight_auction_server::{
    compliance_client::HttpComplianceOracle,
    config::ServerConfig,
    event_hooks::create_event_handlers,
    lifecycle_worker::{start_lifecycle_worker, stop_lifecycle_worker, SweepStatus},
    routes::{health, statistics},
    server::AuctionEngine,
};
use serde_json::{json, Value};
use tokio::sync::watch;

async fn allow() -> HttpResponse {
    HttpResponse::Ok().json(json!({ "allowed": true, "trustScore": 90.0 }))
}

async fn deny() -> HttpResponse {
    HttpResponse::Ok().json(json!({ "allowed": false, "reason": "Licence expired" }))
}

fn start_fake_oracle() -> (String, ServerHandle) {
    let server = HttpServer::new(|| {
        App::new().route("/allow", web::post().to(allow)).route("/deny", web::post().to(deny))
    })
    .workers(1)
    .bind(("127.0.0.1", 0))
    .expect("Could not bind fake oracle");
    let addr = server.addrs()[0];
    let server = server.run();
    let handle = server.handle();
    actix_web::rt::spawn(server);
    (format!("http://{addr}"), handle)
}

async fn temp_database() -> (SqliteDatabase, PathBuf) {
    let nanos = Utc::now().timestamp_nanos_opt().unwrap_or_default();
    let path = std::env::temp_dir().join(format!("fae_server_{}_{nanos}.db", std::process::id()));
    let url = format!("sqlite://{}?mode=rwc", path.display());
    let db = SqliteDatabase::new_with_url(&url, 5).await.expect("Error creating database");
    db.run_migrations().await.expect("Error running migrations");
    (db, path)
}

fn engine(db: &SqliteDatabase, url: String, producers: EventProducers) -> AuctionEngine {
    let oracle = HttpComplianceOracle::new(&url, None, Duration::from_secs(2)).unwrap();
    AuctionEngine::new(db.clone(), producers, oracle, &EngineConfig::default())
}

#[actix_web::test]
async fn admitted_bids_are_scored_by_the_event_hooks() {
    let _ = env_logger::try_init();
    let (base, oracle) = start_fake_oracle();
    let (db, path) = temp_database().await;
    let config = ServerConfig { log_events: true, ..Default::default() };
    let scorer = MatchScorer::new(db.clone(), MedianPriceOracle::new(db.clone()), config.engine_config().scoring);
    let handlers = create_event_handlers(scorer, &config);
    let producers = handlers.producers();
    let tasks = handlers.start_handlers();

    let engine = engine(&db, format!("{base}/allow"), producers);
    let order = engine.orders.create_freight_order(freight_order(40, 10, 48)).await.unwrap();
    let admission = engine.bids.place_bid(bid("acme", order.id, 1000)).await.unwrap();
    drop(engine);
    for task in tasks {
        task.await.unwrap();
    }

    let stored = db.fetch_bid(admission.bid.id).await.unwrap().unwrap();
    assert!(stored.match_score.is_some());
    assert!(stored.score_breakdown.is_some());
    oracle.stop(true).await;
    let _ = std::fs::remove_file(path);
}

#[actix_web::test]
async fn compliance_failures_reject_the_bid() {
    let (base, oracle) = start_fake_oracle();
    let (db, path) = temp_database().await;
    let refusing = engine(&db, format!("{base}/deny"), EventProducers::default());
    let order = refusing.orders.create_freight_order(freight_order(40, 10, 48)).await.unwrap();
    let err = refusing.bids.place_bid(bid("acme", order.id, 1000)).await.unwrap_err();
    assert!(matches!(err, AuctionError::ComplianceViolation(ref r) if r == "Licence expired"), "{err}");

    oracle.stop(true).await;
    let unreachable = engine(&db, "http://127.0.0.1:1/validate".into(), EventProducers::default());
    let err = unreachable.bids.place_bid(bid("acme", order.id, 1000)).await.unwrap_err();
    assert!(matches!(err, AuctionError::ExternalServiceError(_)), "{err}");
    assert!(db.fetch_bids_for_order(order.id.into()).await.unwrap().is_empty());
    let _ = std::fs::remove_file(path);
}

#[actix_web::test]
async fn operator_routes() {
    let (db, path) = temp_database().await;
    let status = SweepStatus::default();
    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(AuctionQueryApi::new(db.clone())))
            .app_data(web::Data::new(status.clone()))
            .service(health)
            .service(statistics),
    )
    .await;

    let req = test::TestRequest::get().uri("/health").to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert!(body["last_sweep"].is_null());

    status.record(SweepReport { ran: true, warnings: 2, ..Default::default() }).await;
    let req = test::TestRequest::get().uri("/health").to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["last_sweep"]["warnings"], 2);

    let engine = engine(&db, "http://127.0.0.1:1/validate".into(), EventProducers::default());
    engine.orders.create_master_order(master_order(150, 15, 48)).await.unwrap();
    let req = test::TestRequest::get().uri("/stats").to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["total_orders"], 1);
    assert_eq!(body["by_status"]["OPEN"], 1);
    let _ = std::fs::remove_file(path);
}

#[actix_web::test]
async fn lifecycle_worker_sweeps_until_shut_down() {
    let (db, path) = temp_database().await;
    let engine = engine(&db, "http://127.0.0.1:1/validate".into(), EventProducers::default());
    let status = SweepStatus::default();
    let (shutdown, signal) = watch::channel(false);
    let worker = start_lifecycle_worker(engine.lifecycle.clone(), Duration::from_millis(50), status.clone(), signal);

    let mut report = None;
    for _ in 0..50 {
        report = status.last().await;
        if report.is_some() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    let report = report.expect("No sweep was recorded");
    assert!(report.ran);
    assert_eq!(report.failures, 0);

    assert!(stop_lifecycle_worker(shutdown, worker).await);
    let _ = std::fs::remove_file(path);
}
