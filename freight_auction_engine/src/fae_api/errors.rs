use fae_common::Weight;
use thiserror::Error;

#[cfg(feature = "sqlite")]
use crate::db::sqlite::SqliteDatabaseError;
use crate::{db::memory::MemoryDatabaseError, db_types::CarrierId};

/// Every way an engine operation can fail. Each variant is a synchronous rejection: nothing is retried and, unless
/// stated otherwise, no state has been changed when it is returned.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AuctionError {
    /// Malformed or out-of-range input, rejected before any side effect.
    #[error("Validation error: {0}")]
    ValidationError(String),
    /// The compliance oracle refused the bid, or the bid would over-commit a master order's lots.
    #[error("Compliance violation: {0}")]
    ComplianceViolation(String),
    #[error("Carrier {carrier_id} would exceed its quota (available capacity {available_capacity}): {}", .violations.join("; "))]
    QuotaExceeded { carrier_id: CarrierId, available_capacity: Weight, violations: Vec<String> },
    #[error("Insufficient capacity: {0}")]
    InsufficientCapacity(String),
    #[error("Capacity exceeded: {0}")]
    CapacityExceeded(String),
    #[error("{0} does not exist")]
    NotFound(String),
    /// The compliance oracle failed or timed out. The bid is rejected.
    #[error("External service error: {0}")]
    ExternalServiceError(String),
    #[error("Invalid state transition: {0}")]
    InvalidStateTransition(String),
    #[error("Database error: {0}")]
    DatabaseError(String),
}

impl AuctionError {
    /// True for the business-rule rejections of a bid, as opposed to infrastructure failures.
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            Self::ValidationError(_) | Self::ComplianceViolation(_) | Self::QuotaExceeded { .. } | Self::NotFound(_)
        )
    }
}

impl From<MemoryDatabaseError> for AuctionError {
    fn from(e: MemoryDatabaseError) -> Self {
        match e {
            MemoryDatabaseError::NotFound(what) => Self::NotFound(what),
            e => Self::DatabaseError(e.to_string()),
        }
    }
}

#[cfg(feature = "sqlite")]
impl From<SqliteDatabaseError> for AuctionError {
    fn from(e: SqliteDatabaseError) -> Self {
        match e {
            SqliteDatabaseError::NotFound(what) => Self::NotFound(what),
            e => Self::DatabaseError(e.to_string()),
        }
    }
}
