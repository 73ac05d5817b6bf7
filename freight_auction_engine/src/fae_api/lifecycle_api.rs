//! The periodic lifecycle sweep.
//!
//! Each tick of [`LifecycleApi::sweep`]:
//! 1. warns about open orders that are still badly under-filled shortly before pickup,
//! 2. runs [`LifecycleApi::perform_auto_check`] on every open order,
//! 3. rolls filled and in-progress orders up to `COMPLETED` once all their lots are delivered,
//! 4. drops expired trust tokens and idle order locks.
//!
//! A tick that starts while the previous one is still running does nothing.
use std::{fmt::Debug, sync::Arc};

use chrono::{DateTime, Utc};
use futures_util::{stream, StreamExt};
use log::*;
use tokio::sync::Mutex;

use crate::{
    config::LifecyclePolicy,
    db::traits::AuctionDatabase,
    db_types::{MasterOrder, MasterOrderId, MasterOrderStatus, PartialOrderStatus},
    events::{FillReminderEvent, UnderFillWarningEvent},
    fae_api::{
        errors::AuctionError,
        order_decomposer::compute_progress,
        order_flow_api::{CancelScope, OrderFlowApi},
        order_locks::LockKey,
        order_objects::{AutoCheckOutcome, SweepReport},
        token_store::TrustTokenStore,
    },
};

pub const LOW_FILL_RATE_REASON: &str = "Low fill rate";
/// Orders checked at the same time during a sweep.
const SWEEP_CONCURRENCY: usize = 8;

#[derive(Clone)]
pub struct LifecycleApi<B> {
    orders: OrderFlowApi<B>,
    tokens: TrustTokenStore,
    policy: LifecyclePolicy,
    sweeping: Arc<Mutex<()>>,
}

impl<B> Debug for LifecycleApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "LifecycleApi")
    }
}

impl<B> LifecycleApi<B> {
    pub fn new(orders: OrderFlowApi<B>, tokens: TrustTokenStore, policy: LifecyclePolicy) -> Self {
        Self { orders, tokens, policy, sweeping: Arc::new(Mutex::new(())) }
    }

    pub fn policy(&self) -> &LifecyclePolicy {
        &self.policy
    }

    /// The time after which an under-filled order is cancelled.
    pub fn cancellation_deadline(&self, master: &MasterOrder) -> DateTime<Utc> {
        self.policy.pickup_time(master.required_delivery_date) - self.policy.cancellation_lead_time
    }
}

impl<B> LifecycleApi<B>
where
    B: AuctionDatabase,
    AuctionError: From<B::Error>,
{
    /// Decides the fate of one master order at time `now`. Exactly one action is taken:
    ///
    /// * Past the cancellation deadline and below the order's minimum load: the order and its AVAILABLE lots are
    ///   cancelled with the reason [`LOW_FILL_RATE_REASON`]. Awarded and bidding lots are left as they are.
    /// * Past the deadline with lots still unclaimed: only those lots are cancelled.
    /// * Within the reminder window before the deadline and below the minimum load: a reminder is published.
    /// * Otherwise nothing happens.
    pub async fn perform_auto_check(
        &self,
        master_id: MasterOrderId,
        now: DateTime<Utc>,
    ) -> Result<AutoCheckOutcome, AuctionError> {
        let _guard = self.orders.locks().lock(LockKey::Master(master_id)).await;
        let master = self.orders.fetch_master(master_id).await?;
        if !matches!(master.status, MasterOrderStatus::Open | MasterOrderStatus::PartiallyFilled) {
            return Ok(AutoCheckOutcome::NoAction);
        }
        let lots = self.orders.db().fetch_partial_orders(master_id).await?;
        let fill = compute_progress(&master, &lots).fill_fraction;
        let under_filled = fill < master.min_load_fraction;
        let deadline = self.cancellation_deadline(&master);

        if now > deadline && under_filled {
            warn!(
                "🕰️ {master_id} is only {} filled against a minimum of {} and missed its deadline. Cancelling it.",
                fill.as_percentage(),
                master.min_load_fraction.as_percentage()
            );
            let cancelled_lots =
                self.orders.cancel_master_locked(&master, &lots, LOW_FILL_RATE_REASON, CancelScope::Unclaimed).await?;
            return Ok(AutoCheckOutcome::CancelledMaster { reason: LOW_FILL_RATE_REASON.to_string(), cancelled_lots });
        }
        if now > deadline {
            let expired = lots
                .iter()
                .filter(|l| l.status == PartialOrderStatus::Available && l.created_at < deadline)
                .cloned()
                .collect::<Vec<_>>();
            if !expired.is_empty() {
                info!("🕰️ {} lots of {master_id} went unclaimed past the deadline. Cancelling them.", expired.len());
                let cancelled = self.orders.cancel_lots_locked(&master, &lots, &expired).await?;
                return Ok(AutoCheckOutcome::CancelledLots(cancelled));
            }
        }
        if now > deadline - self.policy.reminder_window && now <= deadline && under_filled {
            debug!("🕰️ Reminding the shipper of {master_id}: {} filled, deadline {deadline}", fill.as_percentage());
            let event = FillReminderEvent {
                master_order_id: master_id,
                fill_fraction: fill,
                min_load_fraction: master.min_load_fraction,
                cancellation_deadline: deadline,
                timestamp: now,
            };
            self.orders.producers().publish_fill_reminder(event).await;
            return Ok(AutoCheckOutcome::ReminderSent);
        }
        Ok(AutoCheckOutcome::NoAction)
    }

    /// Runs one lifecycle tick. Failures on individual orders are logged and counted, never propagated.
    pub async fn sweep(&self, now: DateTime<Utc>) -> SweepReport {
        let Ok(_running) = self.sweeping.try_lock() else {
            debug!("🕰️ The previous sweep is still running. Skipping this tick.");
            return SweepReport::default();
        };
        let mut report = SweepReport { started_at: Some(now), ran: true, ..Default::default() };
        let open_statuses = [MasterOrderStatus::Open, MasterOrderStatus::PartiallyFilled];
        match self.orders.db().fetch_master_orders(&open_statuses).await {
            Ok(open) => {
                report.warnings = self.send_under_fill_warnings(&open, now).await;
                let outcomes = stream::iter(open.iter().map(|m| m.id).collect::<Vec<_>>())
                    .map(|id| async move { (id, self.perform_auto_check(id, now).await) })
                    .buffer_unordered(SWEEP_CONCURRENCY)
                    .collect::<Vec<_>>()
                    .await;
                for (id, outcome) in outcomes {
                    match outcome {
                        Ok(AutoCheckOutcome::CancelledMaster { cancelled_lots, .. }) => {
                            report.cancelled_masters.push(id);
                            report.cancelled_lots.extend(cancelled_lots);
                        },
                        Ok(AutoCheckOutcome::CancelledLots(lots)) => report.cancelled_lots.extend(lots),
                        Ok(AutoCheckOutcome::ReminderSent) => report.reminders += 1,
                        Ok(AutoCheckOutcome::NoAction) => {},
                        Err(e) => {
                            error!("🕰️ Auto-check of {id} failed: {e}");
                            report.failures += 1;
                        },
                    }
                }
            },
            Err(e) => {
                error!("🕰️ Could not load open master orders: {e}");
                report.failures += 1;
            },
        }

        let rolling = [MasterOrderStatus::Filled, MasterOrderStatus::InProgress];
        match self.orders.db().fetch_master_orders(&rolling).await {
            Ok(orders) => {
                for master in orders {
                    match self.orders.refresh_master_status(master.id).await {
                        Ok(MasterOrderStatus::Completed) => report.completed.push(master.id),
                        Ok(_) => {},
                        Err(e) => {
                            error!("🕰️ Could not refresh the status of {}: {e}", master.id);
                            report.failures += 1;
                        },
                    }
                }
            },
            Err(e) => {
                error!("🕰️ Could not load filled master orders: {e}");
                report.failures += 1;
            },
        }

        report.expired_tokens = self.tokens.expire_sweep(now).await;
        report.pruned_locks = self.orders.locks().prune();
        info!(
            "🕰️ Sweep done. {} warnings, {} orders and {} lots cancelled, {} reminders, {} completed, {} failures",
            report.warnings,
            report.cancelled_masters.len(),
            report.cancelled_lots.len(),
            report.reminders,
            report.completed.len(),
            report.failures
        );
        report
    }

    async fn send_under_fill_warnings(&self, open: &[MasterOrder], now: DateTime<Utc>) -> usize {
        let mut sent = 0;
        for master in open {
            let pickup_time = self.policy.pickup_time(master.required_delivery_date);
            if now < pickup_time - self.policy.warning_window || now > pickup_time {
                continue;
            }
            let lots = match self.orders.db().fetch_partial_orders(master.id).await {
                Ok(lots) => lots,
                Err(e) => {
                    warn!("🕰️ Could not load the lots of {}: {e}", master.id);
                    continue;
                },
            };
            let fill = compute_progress(master, &lots).fill_fraction;
            if fill < self.policy.warning_fill_threshold {
                debug!("🕰️ {} is only {} filled with pickup at {pickup_time}", master.id, fill.as_percentage());
                let event =
                    UnderFillWarningEvent { master_order_id: master.id, fill_fraction: fill, pickup_time, timestamp: now };
                self.orders.producers().publish_under_fill_warning(event).await;
                sent += 1;
            }
        }
        sent
    }
}
