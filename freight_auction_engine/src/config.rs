//! Policy constants for the allocation engine.
//!
//! Every knob has a default matching the marketplace's standard rules. The server crate overrides them from the
//! environment.
use std::{collections::HashMap, time::Duration as StdDuration};

use chrono::Duration;
use fae_common::{Decimal, Fraction, Weight};

use crate::db_types::CarrierId;

pub const DEFAULT_LOT_SIZE_FRACTION: Decimal = Decimal::from_parts(2, 0, 0, false, 1);
pub const DEFAULT_QUANTUM_FRACTION: Decimal = Decimal::from_parts(1, 0, 0, false, 1);
pub const DEFAULT_QUOTA_CEILING: i64 = 200;
pub const DEFAULT_COMPLIANCE_TIMEOUT: StdDuration = StdDuration::from_secs(5);
pub const DEFAULT_PICKUP_LEAD_HOURS: i64 = 24;

#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub decomposition: DecompositionPolicy,
    pub quota: QuotaPolicy,
    pub auction: AuctionPolicy,
    pub lifecycle: LifecyclePolicy,
    pub scoring: ScoringWeights,
    /// Upper bound on a compliance oracle call. A timeout rejects the bid.
    pub compliance_timeout: StdDuration,
    /// Base lifetime of an issued trust token, before the trust-score multiplier.
    pub token_lifetime: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            decomposition: DecompositionPolicy::default(),
            quota: QuotaPolicy::default(),
            auction: AuctionPolicy::default(),
            lifecycle: LifecyclePolicy::default(),
            scoring: ScoringWeights::default(),
            compliance_timeout: DEFAULT_COMPLIANCE_TIMEOUT,
            token_lifetime: Duration::hours(24),
        }
    }
}

#[derive(Debug, Clone)]
pub struct DecompositionPolicy {
    /// Size of each auto-split lot as a fraction of the total weight.
    pub lot_size_fraction: Decimal,
    /// Lots are never smaller than this, except for the remainder lot.
    pub min_lot_weight: Weight,
    /// The quantum is this fraction of the total volume...
    pub quantum_fraction: Decimal,
    /// ...but never less than this.
    pub min_quantum: Decimal,
}

impl Default for DecompositionPolicy {
    fn default() -> Self {
        Self {
            lot_size_fraction: DEFAULT_LOT_SIZE_FRACTION,
            min_lot_weight: Weight::from(1),
            quantum_fraction: DEFAULT_QUANTUM_FRACTION,
            min_quantum: Decimal::ONE,
        }
    }
}

#[derive(Debug, Clone)]
pub struct QuotaPolicy {
    pub default_ceiling: Weight,
    pub overrides: HashMap<CarrierId, Weight>,
}

impl QuotaPolicy {
    pub fn ceiling_for(&self, carrier_id: &CarrierId) -> Weight {
        self.overrides.get(carrier_id).copied().unwrap_or(self.default_ceiling)
    }

    pub fn with_override(mut self, carrier_id: CarrierId, ceiling: Weight) -> Self {
        self.overrides.insert(carrier_id, ceiling);
        self
    }
}

impl Default for QuotaPolicy {
    fn default() -> Self {
        Self { default_ceiling: Weight::from(DEFAULT_QUOTA_CEILING), overrides: HashMap::new() }
    }
}

#[derive(Debug, Clone)]
pub struct AuctionPolicy {
    /// Bids landing this close to the auction close extend the clock.
    pub sniping_window: Duration,
    pub extension: Duration,
    /// `None` lets every qualifying bid extend the clock.
    pub max_extensions: Option<u32>,
}

impl Default for AuctionPolicy {
    fn default() -> Self {
        Self { sniping_window: Duration::minutes(5), extension: Duration::minutes(5), max_extensions: None }
    }
}

#[derive(Debug, Clone)]
pub struct LifecyclePolicy {
    /// Pickup happens this long before the required delivery date.
    pub pickup_lead_time: Duration,
    /// Orders still under-filled this long before pickup are cancelled.
    pub cancellation_lead_time: Duration,
    /// Reminders go out during this window before the cancellation deadline.
    pub reminder_window: Duration,
    /// Under-fill warnings go out during this window before pickup.
    pub warning_window: Duration,
    pub warning_fill_threshold: Fraction,
}

impl LifecyclePolicy {
    pub fn pickup_time(&self, required_delivery_date: chrono::DateTime<chrono::Utc>) -> chrono::DateTime<chrono::Utc> {
        required_delivery_date - self.pickup_lead_time
    }
}

impl Default for LifecyclePolicy {
    fn default() -> Self {
        Self {
            pickup_lead_time: Duration::hours(DEFAULT_PICKUP_LEAD_HOURS),
            cancellation_lead_time: Duration::hours(2),
            reminder_window: Duration::hours(1),
            warning_window: Duration::hours(2),
            warning_fill_threshold: Fraction::new(Decimal::from_parts(5, 0, 0, false, 1)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoringWeights {
    pub price: f64,
    pub trust: f64,
    pub delivery: f64,
    pub geo: f64,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self { price: 0.40, trust: 0.30, delivery: 0.20, geo: 0.10 }
    }
}
