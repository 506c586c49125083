use thiserror::Error;

use interact_store::StoreError;

/// Errors raised by the rules engine. Per-rule failures are recovered at
/// the orchestrator boundary; only validation and listing failures reach
/// the external caller.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("missing user_email")]
    MissingUserEmail,

    #[error("points award must be positive, got {0}")]
    InvalidAmount(i64),

    #[error("failed to list active rules: {0}")]
    Listing(#[source] StoreError),

    #[error(transparent)]
    Store(#[from] StoreError),
}
