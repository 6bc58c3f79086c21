//! Store error kinds (spec.md §7).

use fistfight_types::BattleId;

pub type Result<T> = std::result::Result<T, StoreError>;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("battle {0} state is corrupted")]
    StateCorrupted(BattleId),

    #[error("transient store error: {0}")]
    TransportTransient(#[source] redis::RedisError),

    #[error("store error: {0}")]
    Redis(#[source] redis::RedisError),

    #[error("failed to encode state for battle {0}: {1}")]
    EncodeFailed(BattleId, serde_json::Error),
}

impl From<redis::RedisError> for StoreError {
    fn from(err: redis::RedisError) -> Self {
        if err.is_connection_dropped() || err.is_timeout() || err.is_connection_refusal() {
            StoreError::TransportTransient(err)
        } else {
            StoreError::Redis(err)
        }
    }
}
