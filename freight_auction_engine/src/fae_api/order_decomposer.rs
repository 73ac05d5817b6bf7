//! Splitting master orders into lots, and folding lot states back into the master order.
//!
//! Everything here is a pure function of loaded records. [`OrderFlowApi`](crate::OrderFlowApi) and
//! [`BidFlowApi`](crate::BidFlowApi) call into it while holding the master order's lock.
use chrono::{DateTime, Utc};
use fae_common::{Decimal, Fraction, Money, Percentage, Volume, Weight};

use crate::{
    config::DecompositionPolicy,
    db::traits::NewLotRecord,
    db_types::{
        MasterOrder,
        MasterOrderId,
        MasterOrderStatus,
        NewMasterOrder,
        PartialOrder,
        PartialOrderId,
        PartialOrderStatus,
    },
    fae_api::{
        errors::AuctionError,
        order_objects::{CapacityBucket, ProgressSnapshot},
    },
};

/// Upper bound on the number of lots an order is split into at creation time.
pub const MAX_LOTS_PER_ORDER: usize = 100;

/// Checks the terms shared by master and freight orders.
pub fn validate_order_terms(
    weight: Weight,
    volume: Volume,
    max_bid_amount: Money,
    required_delivery_date: DateTime<Utc>,
    now: DateTime<Utc>,
) -> Result<(), AuctionError> {
    if !max_bid_amount.is_positive() {
        return Err(AuctionError::ValidationError(format!("Maximum bid amount must be positive (got {max_bid_amount})")));
    }
    if required_delivery_date <= now {
        return Err(AuctionError::ValidationError(format!(
            "Required delivery date {required_delivery_date} is not in the future"
        )));
    }
    if !weight.is_positive() || !volume.is_positive() {
        return Err(AuctionError::ValidationError(format!(
            "Weight and volume must be positive (got {weight} and {volume})"
        )));
    }
    Ok(())
}

pub fn validate_master_order(order: &NewMasterOrder, now: DateTime<Utc>) -> Result<(), AuctionError> {
    validate_order_terms(order.total_weight, order.total_volume, order.max_bid_amount, order.required_delivery_date, now)?;
    let fraction = order.min_load_fraction.value();
    if fraction <= Decimal::ZERO || fraction > Decimal::ONE {
        return Err(AuctionError::ValidationError(format!(
            "Minimum load fraction must be in (0, 1] (got {})",
            order.min_load_fraction
        )));
    }
    if let Some(size) = order.partial_order_size {
        if !size.is_positive() {
            return Err(AuctionError::ValidationError(format!("Lot size must be positive (got {size})")));
        }
    }
    Ok(())
}

/// Plans the lots an LTL master order is split into when it is created.
///
/// Lots are `lot_size_fraction` of the total weight (or the order's own lot size), never below the configured
/// minimum. Whatever is left after the full-size lots becomes one remainder lot. The last lot absorbs rounding, so
/// lot weights, volumes and percentages add up to the order's totals exactly. Orders without LTL are not split.
pub fn plan_lots(order: &NewMasterOrder, policy: &DecompositionPolicy) -> Result<Vec<NewLotRecord>, AuctionError> {
    if !order.ltl_enabled {
        return Ok(Vec::new());
    }
    let total = order.total_weight;
    let lot_weight = order
        .partial_order_size
        .unwrap_or_else(|| total.scale(policy.lot_size_fraction))
        .max(policy.min_lot_weight)
        .min(total);
    let full_lots = (total.value() / lot_weight.value()).floor();
    let remainder = total - lot_weight.scale(full_lots);
    let mut weights = Vec::new();
    let mut n = Decimal::ZERO;
    while n < full_lots {
        weights.push(lot_weight);
        n += Decimal::ONE;
        if weights.len() > MAX_LOTS_PER_ORDER {
            return Err(AuctionError::ValidationError(format!(
                "A lot size of {lot_weight} would split the order into more than {MAX_LOTS_PER_ORDER} lots"
            )));
        }
    }
    if remainder.is_positive() {
        weights.push(remainder);
    }
    if weights.len() > MAX_LOTS_PER_ORDER {
        return Err(AuctionError::ValidationError(format!(
            "A lot size of {lot_weight} would split the order into more than {MAX_LOTS_PER_ORDER} lots"
        )));
    }

    let mut lots = Vec::with_capacity(weights.len());
    let mut volume_left = order.total_volume;
    let mut percent_left = Percentage::hundred();
    let last = weights.len().saturating_sub(1);
    for (i, weight) in weights.into_iter().enumerate() {
        let share = weight.ratio_of(total);
        let (volume, percentage) = if i == last {
            (volume_left, percent_left)
        } else {
            (order.total_volume.scale(share), Percentage::from_fraction(share))
        };
        volume_left -= volume;
        percent_left -= percentage;
        lots.push(NewLotRecord {
            master_order_id: MasterOrderId(0),
            weight,
            volume,
            percentage,
            status: PartialOrderStatus::Available,
            assigned_carrier_id: None,
            assigned_bid_id: None,
        });
    }
    Ok(lots)
}

/// Derives a master order's status from its lots.
///
/// Cancelled lots are ignored. Cancelled and completed orders keep their status.
pub fn derive_master_status(master: &MasterOrder, lots: &[PartialOrder]) -> MasterOrderStatus {
    if master.status.is_terminal() {
        return master.status;
    }
    let live = lots.iter().filter(|l| l.status != PartialOrderStatus::Cancelled).collect::<Vec<_>>();
    if live.is_empty() {
        return MasterOrderStatus::Open;
    }
    if live.iter().all(|l| l.status.is_delivered()) {
        return MasterOrderStatus::Completed;
    }
    if live.iter().any(|l| l.status == PartialOrderStatus::InProgress) {
        return MasterOrderStatus::InProgress;
    }
    let committed: Weight = live.iter().filter(|l| l.status.is_committed()).map(|l| l.weight).sum();
    if live.iter().all(|l| l.status.is_committed()) && committed >= master.total_weight {
        return MasterOrderStatus::Filled;
    }
    if live.iter().any(|l| l.status != PartialOrderStatus::Available) {
        return MasterOrderStatus::PartiallyFilled;
    }
    MasterOrderStatus::Open
}

/// Sorts the lots into committed, pending and open buckets and computes the fill fraction.
pub fn compute_progress(master: &MasterOrder, lots: &[PartialOrder]) -> ProgressSnapshot {
    let mut committed = CapacityBucket::default();
    let mut pending = CapacityBucket::default();
    let mut open = CapacityBucket::default();
    for lot in lots {
        match lot.status {
            PartialOrderStatus::Available => open.add(lot),
            PartialOrderStatus::Bidding => pending.add(lot),
            PartialOrderStatus::Cancelled => {},
            _ => committed.add(lot),
        }
    }
    let fill_fraction = Fraction::new((committed.weight + pending.weight).ratio_of(master.total_weight));
    ProgressSnapshot {
        master_order_id: master.id,
        status: master.status,
        committed,
        pending,
        open,
        unallocated_weight: master.remaining_weight,
        unallocated_volume: master.remaining_volume,
        fill_fraction,
    }
}

/// A stand-in for a lot that has not been stored yet, for deriving the status the master order will have.
pub(crate) fn provisional_lot(record: &NewLotRecord) -> PartialOrder {
    let now = Utc::now();
    PartialOrder {
        id: PartialOrderId(0),
        master_order_id: record.master_order_id,
        weight: record.weight,
        volume: record.volume,
        percentage: record.percentage,
        assigned_carrier_id: record.assigned_carrier_id.clone(),
        assigned_bid_id: record.assigned_bid_id,
        status: record.status,
        created_at: now,
        updated_at: now,
    }
}

/// The lots as they will be once the given status changes are applied.
pub(crate) fn with_lot_statuses(lots: &[PartialOrder], changes: &[(PartialOrderId, PartialOrderStatus)]) -> Vec<PartialOrder> {
    lots.iter()
        .cloned()
        .map(|mut lot| {
            if let Some((_, status)) = changes.iter().find(|(id, _)| *id == lot.id) {
                lot.status = *status;
            }
            lot
        })
        .collect()
}

/// The sum of the percentages of the allocated lots of a master order.
pub fn allocated_percentage(lots: &[PartialOrder]) -> Percentage {
    lots.iter().filter(|l| l.status.is_allocated()).map(|l| l.percentage).sum()
}

#[cfg(test)]
mod test {
    use chrono::Duration;

    use super::*;
    use crate::db_types::CargoCategory;

    fn new_order(total: i64, volume: i64) -> NewMasterOrder {
        NewMasterOrder::new(
            "shipper".into(),
            Weight::from(total),
            Volume::from(volume),
            Utc::now() + Duration::days(3),
            Money::from(1500),
        )
        .with_ltl(None)
    }

    fn master_with(total: i64, status: MasterOrderStatus) -> MasterOrder {
        let now = Utc::now();
        MasterOrder {
            id: MasterOrderId(1),
            shipper_id: "shipper".into(),
            total_weight: Weight::from(total),
            total_volume: Volume::from(100),
            remaining_weight: Weight::ZERO,
            remaining_volume: Volume::ZERO,
            required_delivery_date: now + Duration::days(2),
            max_bid_amount: Money::from(1500),
            cargo_category: CargoCategory::General,
            ltl_enabled: true,
            min_load_fraction: Fraction::new(Decimal::new(8, 1)),
            pickup_latitude: None,
            pickup_longitude: None,
            extension_count: 0,
            status,
            created_at: now,
            updated_at: now,
        }
    }

    fn lot(id: i64, weight: i64, status: PartialOrderStatus) -> PartialOrder {
        let now = Utc::now();
        PartialOrder {
            id: PartialOrderId(id),
            master_order_id: MasterOrderId(1),
            weight: Weight::from(weight),
            volume: Volume::from(weight / 10),
            percentage: Percentage::from(weight / 10),
            assigned_carrier_id: None,
            assigned_bid_id: None,
            status,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn splits_into_fifths() {
        let policy = DecompositionPolicy::default();
        let lots = plan_lots(&new_order(1000, 50), &policy).unwrap();
        assert_eq!(lots.len(), 5);
        assert!(lots.iter().all(|l| l.weight == Weight::from(200)));
        assert!(lots.iter().all(|l| l.percentage == Percentage::from(20)));
        assert!(lots.iter().all(|l| l.status == PartialOrderStatus::Available));
        assert_eq!(lots.iter().map(|l| l.volume).sum::<Volume>(), Volume::from(50));
    }

    #[test]
    fn remainder_lot_takes_the_rest() {
        let policy = DecompositionPolicy::default();
        let order = new_order(1000, 70).with_ltl(Some(Weight::from(300)));
        let lots = plan_lots(&order, &policy).unwrap();
        let weights = lots.iter().map(|l| l.weight).collect::<Vec<_>>();
        assert_eq!(weights, vec![Weight::from(300), Weight::from(300), Weight::from(300), Weight::from(100)]);
        assert_eq!(lots[3].percentage, Percentage::from(10));
        assert_eq!(lots.iter().map(|l| l.volume).sum::<Volume>(), Volume::from(70));
        assert_eq!(lots.iter().map(|l| l.percentage).sum::<Percentage>(), Percentage::hundred());
    }

    #[test]
    fn tiny_orders_get_one_lot() {
        let policy = DecompositionPolicy::default();
        let lots = plan_lots(&new_order(3, 1), &policy).unwrap();
        // 20% of 3 is below the one-unit minimum, so lots are one unit each
        assert_eq!(lots.len(), 3);
        let lots = plan_lots(&new_order(1, 1), &policy).unwrap();
        assert_eq!(lots.len(), 1);
        assert_eq!(lots[0].percentage, Percentage::hundred());
    }

    #[test]
    fn too_many_lots_is_rejected() {
        let policy = DecompositionPolicy::default();
        let order = new_order(1000, 70).with_ltl(Some(Weight::from(1)));
        assert!(matches!(plan_lots(&order, &policy), Err(AuctionError::ValidationError(_))));
    }

    #[test]
    fn non_ltl_orders_are_not_split() {
        let policy = DecompositionPolicy::default();
        let order = NewMasterOrder::new(
            "shipper".into(),
            Weight::from(1000),
            Volume::from(50),
            Utc::now() + Duration::days(1),
            Money::from(10),
        );
        assert!(plan_lots(&order, &policy).unwrap().is_empty());
    }

    #[test]
    fn master_order_validation() {
        let now = Utc::now();
        let mut order = new_order(1000, 50);
        assert!(validate_master_order(&order, now).is_ok());
        order.max_bid_amount = Money::ZERO;
        assert!(matches!(validate_master_order(&order, now), Err(AuctionError::ValidationError(_))));
        let mut order = new_order(1000, 50);
        order.required_delivery_date = now - Duration::minutes(1);
        assert!(matches!(validate_master_order(&order, now), Err(AuctionError::ValidationError(_))));
    }

    #[test]
    fn status_derivation() {
        use PartialOrderStatus::*;
        let open = master_with(1000, MasterOrderStatus::Open);
        assert_eq!(derive_master_status(&open, &[]), MasterOrderStatus::Open);
        assert_eq!(derive_master_status(&open, &[lot(1, 500, Available), lot(2, 500, Available)]), MasterOrderStatus::Open);
        assert_eq!(
            derive_master_status(&open, &[lot(1, 500, Bidding), lot(2, 500, Available)]),
            MasterOrderStatus::PartiallyFilled
        );
        assert_eq!(derive_master_status(&open, &[lot(1, 500, Awarded), lot(2, 500, Awarded)]), MasterOrderStatus::Filled);
        assert_eq!(
            derive_master_status(&open, &[lot(1, 500, Awarded), lot(2, 300, Awarded), lot(3, 200, Cancelled)]),
            MasterOrderStatus::PartiallyFilled
        );
        assert_eq!(
            derive_master_status(&open, &[lot(1, 500, InProgress), lot(2, 500, Delivered)]),
            MasterOrderStatus::InProgress
        );
        assert_eq!(
            derive_master_status(&open, &[lot(1, 500, Delivered), lot(2, 500, Completed), lot(3, 1, Cancelled)]),
            MasterOrderStatus::Completed
        );
        let cancelled = master_with(1000, MasterOrderStatus::Cancelled);
        assert_eq!(derive_master_status(&cancelled, &[lot(1, 1000, Delivered)]), MasterOrderStatus::Cancelled);
    }

    #[test]
    fn progress_buckets() {
        use PartialOrderStatus::*;
        let master = master_with(1000, MasterOrderStatus::PartiallyFilled);
        let lots = [lot(1, 200, Awarded), lot(2, 200, Bidding), lot(3, 200, Available), lot(4, 400, Cancelled)];
        let progress = compute_progress(&master, &lots);
        assert_eq!(progress.committed.weight, Weight::from(200));
        assert_eq!(progress.pending.lots, 1);
        assert_eq!(progress.open.volume, Volume::from(20));
        assert_eq!(progress.fill_fraction, Fraction::new(Decimal::new(4, 1)));
        assert_eq!(allocated_percentage(&lots), Percentage::from(40));
    }
}
