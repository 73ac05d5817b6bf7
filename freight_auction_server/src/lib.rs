//! # Freight auction server
//! This crate hosts the freight auction engine. It is responsible for:
//! * Opening the SQLite database and running the migrations.
//! * Consulting the remote compliance oracle over HTTP for every bid.
//! * Scoring bids as soon as the engine asks for it, via the event hooks.
//! * Running the lifecycle sweep on a fixed interval.
//!
//! ## Configuration
//! The server is configured via environment variables. See [config](config/index.html) for more information.
//!
//! ## Routes
//! Orders and bids are submitted by the marketplace host through the engine API, not over HTTP. The server only
//! exposes operator routes:
//! * `/health`: Returns 200 OK, along with the report of the most recent lifecycle sweep.
//! * `/stats`: Aggregate order statistics.

pub mod cli;
pub mod compliance_client;
pub mod config;
pub mod errors;
pub mod event_hooks;
pub mod lifecycle_worker;
pub mod routes;
pub mod server;
