use std::{future::Future, pin::Pin, sync::Arc};

use tokio::task::JoinHandle;

use crate::events::{
    BidPlacedEvent,
    CarrierAssignedEvent,
    EventHandler,
    EventProducer,
    FillReminderEvent,
    Handler,
    OrderCancelledEvent,
    OrderCompletedEvent,
    OrderStatusChangedEvent,
    QuotaEvent,
    ScoringRequestedEvent,
    UnderFillWarningEvent,
};

/// Generates the three hook containers for a list of event types:
///
/// * `EventHooks` collects the async closures registered per event,
/// * `EventHandlers` wraps each closure in its own channel-backed [`EventHandler`],
/// * `EventProducers` holds the sending halves. The engine APIs keep a clone and publish through it.
macro_rules! event_hooks {
    ($($event:ty => $hook:ident, $producers:ident, $publish:ident);+ $(;)?) => {
        #[derive(Default, Clone)]
        pub struct EventProducers {
            $(pub $producers: Vec<EventProducer<$event>>,)+
        }

        impl EventProducers {
            $(
                pub async fn $publish(&self, event: $event) {
                    for producer in &self.$producers {
                        producer.publish_event(event.clone()).await;
                    }
                }
            )+
        }

        pub struct EventHandlers {
            $($hook: Vec<EventHandler<$event>>,)+
        }

        impl EventHandlers {
            pub fn new(buffer_size: usize, hooks: EventHooks) -> Self {
                Self {
                    $($hook: hooks.$hook.into_iter().map(|f| EventHandler::new(buffer_size, f)).collect(),)+
                }
            }

            pub fn producers(&self) -> EventProducers {
                let mut result = EventProducers::default();
                $(
                    for handler in &self.$hook {
                        result.$producers.push(handler.subscribe());
                    }
                )+
                result
            }

            /// Spawns every handler. Each task ends once all producers for its event have been dropped.
            pub fn start_handlers(self) -> Vec<JoinHandle<()>> {
                let mut tasks = Vec::new();
                $(
                    for handler in self.$hook {
                        tasks.push(tokio::spawn(handler.start_handler()));
                    }
                )+
                tasks
            }
        }

        #[derive(Default, Clone)]
        pub struct EventHooks {
            $($hook: Vec<Handler<$event>>,)+
        }

        impl EventHooks {
            $(
                pub fn $hook<F>(&mut self, f: F) -> &mut Self
                where F: (Fn($event) -> Pin<Box<dyn Future<Output = ()> + Send>>) + Send + Sync + 'static {
                    self.$hook.push(Arc::new(f));
                    self
                }
            )+
        }
    };
}

event_hooks! {
    BidPlacedEvent => on_bid_placed, bid_placed_producer, publish_bid_placed;
    ScoringRequestedEvent => on_scoring_requested, scoring_requested_producer, publish_scoring_requested;
    OrderStatusChangedEvent => on_order_status_changed, order_status_changed_producer, publish_order_status_changed;
    OrderCompletedEvent => on_order_completed, order_completed_producer, publish_order_completed;
    OrderCancelledEvent => on_order_cancelled, order_cancelled_producer, publish_order_cancelled;
    CarrierAssignedEvent => on_carrier_assigned, carrier_assigned_producer, publish_carrier_assigned;
    QuotaEvent => on_quota_changed, quota_producer, publish_quota;
    UnderFillWarningEvent => on_under_fill_warning, under_fill_warning_producer, publish_under_fill_warning;
    FillReminderEvent => on_fill_reminder, fill_reminder_producer, publish_fill_reminder;
}
