//! Operator routes.
//!
//! Neither route takes parameters. `/health` never touches the database, so it keeps answering even if the pool is
//! exhausted.
use actix_web::{get, web, HttpResponse, Responder};
use freight_auction_engine::{order_objects::SweepReport, AuctionQueryApi, SqliteDatabase};
use log::*;
use serde::Serialize;

use crate::{errors::ServerError, lifecycle_worker::SweepStatus};

#[derive(Debug, Serialize)]
pub struct HealthReport {
    pub status: &'static str,
    /// `None` until the first sweep has finished.
    pub last_sweep: Option<SweepReport>,
}

#[get("/health")]
pub async fn health(status: web::Data<SweepStatus>) -> impl Responder {
    let last_sweep = status.last().await;
    HttpResponse::Ok().json(HealthReport { status: "👍️", last_sweep })
}

#[get("/stats")]
pub async fn statistics(api: web::Data<AuctionQueryApi<SqliteDatabase>>) -> Result<HttpResponse, ServerError> {
    trace!("📊️ GET order statistics");
    let stats = api.order_statistics().await?;
    Ok(HttpResponse::Ok().json(stats))
}
