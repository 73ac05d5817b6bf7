use freight_auction_engine::{
    events::{EventHandlers, EventHooks, EventTopic},
    MatchScorer,
    MedianPriceOracle,
    SqliteDatabase,
};
use futures::future::BoxFuture;
use log::*;
use serde::Serialize;

use crate::config::ServerConfig;

pub type AuctionScorer = MatchScorer<SqliteDatabase, MedianPriceOracle<SqliteDatabase>>;

/// Assigns the server's event handlers.
///
/// 1. ScoringRequestedEvent - The bid is scored against the current market and its breakdown is stored, so that
///    bid listings come back best match first.
/// 2. If `FAE_LOG_EVENTS` is set, every event is also written to the `fae::events` log target as JSON, keyed by its
///    topic. This is the hand-off point for a message bus.
pub fn create_event_handlers(scorer: AuctionScorer, config: &ServerConfig) -> EventHandlers {
    let mut hooks = EventHooks::default();
    // --- On ScoringRequested Handler ---
    hooks.on_scoring_requested(move |ev| {
        let scorer = scorer.clone();
        Box::pin(async move {
            match scorer.score_and_save(ev.bid_id).await {
                Ok(score) => debug!("⚖️ {} on {} scored {:.2}", ev.bid_id, ev.order_ref, score.total_score),
                Err(e) => error!("⚖️ Could not score {}. {e}", ev.bid_id),
            }
        }) as BoxFuture<'static, ()>
    });
    if config.log_events {
        info!("📣️ Event logging is enabled");
        add_event_log_hooks(&mut hooks);
    }
    EventHandlers::new(config.event_buffer_size, hooks)
}

fn add_event_log_hooks(hooks: &mut EventHooks) {
    hooks
        .on_bid_placed(|ev| log_event(&ev))
        .on_scoring_requested(|ev| log_event(&ev))
        .on_order_status_changed(|ev| log_event(&ev))
        .on_order_completed(|ev| log_event(&ev))
        .on_order_cancelled(|ev| log_event(&ev))
        .on_carrier_assigned(|ev| log_event(&ev))
        .on_quota_changed(|ev| log_event(&ev))
        .on_under_fill_warning(|ev| log_event(&ev))
        .on_fill_reminder(|ev| log_event(&ev));
}

fn log_event<E: Serialize + EventTopic>(event: &E) -> BoxFuture<'static, ()> {
    match serde_json::to_string(event) {
        Ok(json) => info!(target: "fae::events", "📣️ {} {json}", event.topic()),
        Err(e) => warn!("📣️ Could not serialize a {} event. {e}", event.topic()),
    }
    no_op()
}

fn no_op() -> BoxFuture<'static, ()> {
    Box::pin(async {})
}
