//! Remaining-capacity bookkeeping for master orders.
//!
//! The ledger is pure: it inspects a loaded [`MasterOrder`] and returns the new remaining figures, which the caller
//! persists in the same change set as the lot that consumed or released them. Callers must hold the master order's
//! lock between loading the order and applying the change set.
use fae_common::{Volume, Weight};
use log::*;

use crate::{config::DecompositionPolicy, db_types::MasterOrder, fae_api::errors::AuctionError};

#[derive(Debug, Clone)]
pub struct CapacityLedger {
    policy: DecompositionPolicy,
}

impl CapacityLedger {
    pub fn new(policy: DecompositionPolicy) -> Self {
        Self { policy }
    }

    /// The smallest volume a new lot may have: a fixed share of the order's total volume, with a floor.
    pub fn minimum_quantum(&self, master: &MasterOrder) -> Volume {
        let share = master.total_volume.scale(self.policy.quantum_fraction);
        share.max(Volume::new(self.policy.min_quantum))
    }

    /// Checks that a lot of the given size may be carved out of the master order's remaining capacity.
    pub fn check_quantum(&self, master: &MasterOrder, weight: Weight, volume: Volume) -> Result<(), AuctionError> {
        if !weight.is_positive() || !volume.is_positive() {
            return Err(AuctionError::ValidationError(format!(
                "Lot weight and volume must be positive (got {weight} and {volume})"
            )));
        }
        let quantum = self.minimum_quantum(master);
        if master.remaining_volume < quantum {
            debug!("🧩️ {} has {} volume left, below its quantum of {quantum}", master.id, master.remaining_volume);
            return Err(AuctionError::InsufficientCapacity(format!(
                "{} has {} volume remaining, less than the minimum quantum of {quantum}",
                master.id, master.remaining_volume
            )));
        }
        if volume < quantum {
            return Err(AuctionError::InsufficientCapacity(format!(
                "Requested volume {volume} is below the minimum quantum of {quantum} for {}",
                master.id
            )));
        }
        if weight > master.remaining_weight || volume > master.remaining_volume {
            return Err(AuctionError::InsufficientCapacity(format!(
                "Requested {weight} weight / {volume} volume, but {} only has {} / {} remaining",
                master.id, master.remaining_weight, master.remaining_volume
            )));
        }
        Ok(())
    }

    /// Returns the remaining capacity after taking `weight` and `volume` out of the order. Fails rather than going
    /// negative.
    pub fn reserve(&self, master: &MasterOrder, weight: Weight, volume: Volume) -> Result<(Weight, Volume), AuctionError> {
        let remaining_weight = master.remaining_weight - weight;
        let remaining_volume = master.remaining_volume - volume;
        if remaining_weight.is_negative() || remaining_volume.is_negative() {
            warn!(
                "🧩️ Refusing to reserve {weight} / {volume} on {}: only {} / {} left",
                master.id, master.remaining_weight, master.remaining_volume
            );
            return Err(AuctionError::CapacityExceeded(format!(
                "Reserving {weight} weight / {volume} volume would take {} below zero",
                master.id
            )));
        }
        trace!("🧩️ {} reserved on {}. {remaining_weight} weight left", weight, master.id);
        Ok((remaining_weight, remaining_volume))
    }

    /// Returns the remaining capacity after giving a cancelled lot's capacity back to the order.
    pub fn release(&self, master: &MasterOrder, weight: Weight, volume: Volume) -> Result<(Weight, Volume), AuctionError> {
        let remaining_weight = master.remaining_weight + weight;
        let remaining_volume = master.remaining_volume + volume;
        if remaining_weight > master.total_weight || remaining_volume > master.total_volume {
            return Err(AuctionError::CapacityExceeded(format!(
                "Releasing {weight} weight / {volume} volume would give {} more capacity than it has",
                master.id
            )));
        }
        Ok((remaining_weight, remaining_volume))
    }
}

impl Default for CapacityLedger {
    fn default() -> Self {
        Self::new(DecompositionPolicy::default())
    }
}
