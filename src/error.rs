use thiserror::Error;

use crate::storage::StoreError;

/// Errors surfaced to callers of the replication engine.
///
/// Unreachable peers never show up here: they are absorbed by liveness
/// marking and the fallback paths.
#[derive(Error, Debug)]
pub enum DynamoError {
    #[error("Local store error: {0}")]
    Store(#[from] StoreError),

    #[error("Configuration error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, DynamoError>;
