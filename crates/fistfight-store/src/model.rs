//! Small result types returned by store operations (spec.md §4.5).

/// Outcome of `TryInitializeBattle`. Not used for flow decisions by
/// callers — the Lifecycle Service always continues to `TryOpenTurn`
/// regardless of which variant comes back (spec.md §4.8 step 4).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitOutcome {
    Created,
    AlreadyExists,
}

/// Outcome of `StoreAction`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreActionOutcome {
    Accepted,
    AlreadySubmitted,
}

/// Outcome of `EndBattleAndMarkResolved` — the single signal that drives
/// exactly-once publication (spec.md §4.11).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndOutcome {
    EndedNow,
    AlreadyEnded,
    NotCommitted,
}

/// A battle claimed by `ClaimDueBattles`, ready for `ResolveTurn`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClaimedBattle {
    pub battle_id: fistfight_types::BattleId,
    pub turn_index: u64,
}
