use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum MemoryDatabaseError {
    #[error("{0} does not exist")]
    NotFound(String),
    #[error("Inconsistent record: {0}")]
    Inconsistent(String),
}
