//! The Command Consumer's idempotency anchor (spec.md §4.12,
//! SPEC_FULL.md §C) — a `SETNX`-backed stand-in for the `battles` table
//! unique-constraint insert the distilled spec describes.

use async_trait::async_trait;
use fistfight_types::BattleId;

use crate::error::Result;

#[async_trait]
pub trait CommandIdempotency: Send + Sync {
    /// Returns `true` the first time this `battle_id` is seen, `false` on
    /// every redelivery.
    async fn try_mark_command_created(&self, battle_id: &BattleId) -> Result<bool>;
}
