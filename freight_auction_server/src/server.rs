use std::time::Duration;

use actix_web::{dev::Server, http::KeepAlive, middleware::Logger, web, App, HttpServer};
use freight_auction_engine::{
    events::EventProducers,
    AuctionQueryApi,
    BidFlowApi,
    EngineConfig,
    LifecycleApi,
    MatchScorer,
    MedianPriceOracle,
    OrderFlowApi,
    OrderLocks,
    SqliteDatabase,
    TrustTokenStore,
};
use log::*;
use tokio::sync::watch;

use crate::{
    compliance_client::HttpComplianceOracle,
    config::ServerConfig,
    errors::ServerError,
    event_hooks::create_event_handlers,
    lifecycle_worker::{start_lifecycle_worker, stop_lifecycle_worker, SweepStatus},
    routes::{health, statistics},
};

/// The engine APIs, wired to the server's database, event producers and compliance oracle. This is the surface a
/// marketplace host embeds to post orders and submit bids.
#[derive(Clone)]
pub struct AuctionEngine {
    pub orders: OrderFlowApi<SqliteDatabase>,
    pub bids: BidFlowApi<SqliteDatabase, HttpComplianceOracle>,
    pub lifecycle: LifecycleApi<SqliteDatabase>,
    pub tokens: TrustTokenStore,
}

impl AuctionEngine {
    pub fn new(
        db: SqliteDatabase,
        producers: EventProducers,
        oracle: HttpComplianceOracle,
        config: &EngineConfig,
    ) -> Self {
        let locks = OrderLocks::new();
        let tokens = TrustTokenStore::new(config.token_lifetime);
        let orders = OrderFlowApi::new(db.clone(), producers.clone(), locks.clone(), config.decomposition.clone());
        let bids = BidFlowApi::new(db, producers, locks, oracle, tokens.clone(), config);
        let lifecycle = LifecycleApi::new(orders.clone(), tokens.clone(), config.lifecycle.clone());
        Self { orders, bids, lifecycle, tokens }
    }
}

pub async fn run_server(config: ServerConfig) -> Result<(), ServerError> {
    let db = SqliteDatabase::new_with_url(&config.database_url, 25).await?;
    db.run_migrations().await?;
    let engine_config = config.engine_config();

    let scorer = MatchScorer::new(db.clone(), MedianPriceOracle::new(db.clone()), engine_config.scoring);
    let handlers = create_event_handlers(scorer, &config);
    let producers = handlers.producers();
    let handler_tasks = handlers.start_handlers();

    let oracle = HttpComplianceOracle::new(
        &config.compliance_oracle_url,
        config.compliance_api_key.as_ref(),
        config.compliance_timeout,
    )?;
    info!("🛂️ Bids are checked against the compliance oracle at {}", oracle.url());
    let engine = AuctionEngine::new(db.clone(), producers, oracle, &engine_config);

    let status = SweepStatus::default();
    let (shutdown, shutdown_signal) = watch::channel(false);
    let worker = start_lifecycle_worker(engine.lifecycle.clone(), config.sweep_interval, status.clone(), shutdown_signal);

    // Actix stops the server on SIGINT/SIGTERM, which resolves this future.
    let srv = create_server_instance(&config, db, status)?;
    let result = srv.await.map_err(|e| ServerError::Unspecified(e.to_string()));

    info!("🚀️ Server stopped. Waiting for the lifecycle worker and event handlers to finish");
    stop_lifecycle_worker(shutdown, worker).await;
    // Handlers exit once every producer is gone.
    drop(engine);
    for task in handler_tasks {
        if let Err(e) = task.await {
            error!("📣️ An event handler did not shut down cleanly. {e}");
        }
    }
    result
}

pub fn create_server_instance(
    config: &ServerConfig,
    db: SqliteDatabase,
    status: SweepStatus,
) -> Result<Server, ServerError> {
    let srv = HttpServer::new(move || {
        let queries = AuctionQueryApi::new(db.clone());
        App::new()
            .wrap(Logger::new("%t (%D ms) %s %a %{Host}i %U").log_target("fae::access_log"))
            .app_data(web::Data::new(queries))
            .app_data(web::Data::new(status.clone()))
            .service(health)
            .service(statistics)
    })
    .keep_alive(KeepAlive::Timeout(Duration::from_secs(600)))
    .bind((config.host.as_str(), config.port))?
    .run();
    Ok(srv)
}
