//! Service-level error kinds (spec.md §7).
//!
//! These are the errors `SubmitAction` (and the realtime protocol wrapping
//! it) surface to a client; `Display` renders the exact user-visible
//! strings spec.md §7 specifies.

use fistfight_types::BattleId;

pub type Result<T> = std::result::Result<T, ServiceError>;

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("Battle {0} not found")]
    BattleNotFound(BattleId),

    #[error("User is not a participant in this battle")]
    NotParticipant,

    #[error("User not authenticated")]
    NotAuthenticated,

    #[error("Battle has ended")]
    BattleEnded,

    #[error("Battle {0} state is corrupted")]
    StateCorrupted(BattleId),

    #[error("validation failed: {0}")]
    ValidationFailed(String),

    #[error(transparent)]
    Store(fistfight_store::StoreError),
}

impl From<fistfight_store::StoreError> for ServiceError {
    fn from(err: fistfight_store::StoreError) -> Self {
        match err {
            fistfight_store::StoreError::StateCorrupted(battle_id) => ServiceError::StateCorrupted(battle_id),
            other => ServiceError::Store(other),
        }
    }
}

impl ServiceError {
    /// True for the subset of errors §7 says `SubmitAction` must surface
    /// to the client as typed, user-facing failures (as opposed to
    /// transient/internal failures the caller should just log).
    pub fn is_user_visible(&self) -> bool {
        matches!(
            self,
            ServiceError::BattleNotFound(_)
                | ServiceError::NotParticipant
                | ServiceError::NotAuthenticated
                | ServiceError::BattleEnded
                | ServiceError::StateCorrupted(_)
        )
    }
}
